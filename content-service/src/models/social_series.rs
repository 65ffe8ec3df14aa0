//! Platform-specific social media series.

use super::UnknownVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    LinkedIn,
    Twitter,
    Facebook,
    Instagram,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::LinkedIn,
        Platform::Twitter,
        Platform::Facebook,
        Platform::Instagram,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LinkedIn => "linkedin",
            Self::Twitter => "twitter",
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::LinkedIn => "LinkedIn",
            Self::Twitter => "Twitter/X",
            Self::Facebook => "Facebook",
            Self::Instagram => "Instagram",
        }
    }

    /// Number of posts (or carousel slides) in a generated series.
    pub fn series_length(&self) -> usize {
        match self {
            Self::LinkedIn => 5,
            Self::Twitter => 7,
            Self::Facebook => 5,
            Self::Instagram => 6,
        }
    }

    /// Hard per-post character limit, including hashtags.
    pub fn max_chars(&self) -> usize {
        match self {
            Self::LinkedIn => 3000,
            Self::Twitter => 280,
            Self::Facebook => 2000,
            Self::Instagram => 2200,
        }
    }

    pub fn max_hashtags(&self) -> usize {
        match self {
            Self::LinkedIn => 5,
            Self::Twitter => 2,
            Self::Facebook => 3,
            Self::Instagram => 15,
        }
    }

    /// Instagram series are carousels: each post is a slide with a title.
    pub fn uses_slides(&self) -> bool {
        matches!(self, Self::Instagram)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Platform {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linkedin" => Ok(Self::LinkedIn),
            "twitter" | "x" => Ok(Self::Twitter),
            "facebook" => Ok(Self::Facebook),
            "instagram" => Ok(Self::Instagram),
            _ => Err(UnknownVariant {
                kind: "platform",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Platform {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStatus {
    Draft,
    Scheduled,
    Published,
    Failed,
}

impl SeriesStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SeriesStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SeriesStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            _ => Err(UnknownVariant {
                kind: "series status",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for SeriesStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One post (or slide) in a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub sequence: u32,
    pub content: String,
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slide_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

impl SocialPost {
    /// Body with hashtags appended, as it would be posted.
    pub fn rendered(&self) -> String {
        if self.hashtags.is_empty() {
            return self.content.clone();
        }
        let tags: Vec<String> = self
            .hashtags
            .iter()
            .map(|t| format!("#{}", t.trim_start_matches('#')))
            .collect();
        format!("{} {}", self.content, tags.join(" "))
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SocialSeries {
    pub id: Uuid,
    #[sqlx(try_from = "String")]
    pub platform: Platform,
    pub title: String,
    pub source_post_id: Option<Uuid>,
    pub posts: Json<Vec<SocialPost>>,
    #[sqlx(try_from = "String")]
    pub status: SeriesStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSocialSeries {
    pub platform: Platform,
    pub title: String,
    pub source_post_id: Option<Uuid>,
    pub posts: Vec<SocialPost>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parses_aliases() {
        assert_eq!("X".parse::<Platform>().unwrap(), Platform::Twitter);
        assert_eq!("LinkedIn".parse::<Platform>().unwrap(), Platform::LinkedIn);
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn rendered_post_appends_normalised_hashtags() {
        let post = SocialPost {
            sequence: 1,
            content: "Estimated taxes are due.".into(),
            hashtags: vec!["#tax".into(), "smallbiz".into()],
            slide_title: None,
            image_prompt: None,
        };
        assert_eq!(post.rendered(), "Estimated taxes are due. #tax #smallbiz");
    }

    #[test]
    fn only_instagram_uses_slides() {
        assert!(Platform::Instagram.uses_slides());
        assert!(!Platform::Twitter.uses_slides());
    }
}
