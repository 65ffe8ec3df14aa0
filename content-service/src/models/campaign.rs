//! Campaign model: a bundle of artifacts generated from one article.

use super::{Newsletter, SocialSeries, UnknownVariant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Campaign lifecycle.
///
/// ```text
/// draft → generating → ready → publishing → published
///              │                    │
///              └──────→ failed ←────┘
///                         │
///                         └→ generating (regenerate)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Generating,
    Ready,
    Publishing,
    Published,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Generating => "generating",
            Self::Ready => "ready",
            Self::Publishing => "publishing",
            Self::Published => "published",
            Self::Failed => "failed",
        }
    }

    pub fn can_transition_to(self, next: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, next),
            (Draft, Generating)
                | (Generating, Ready)
                | (Generating, Failed)
                | (Ready, Publishing)
                | (Publishing, Published)
                | (Publishing, Failed)
                | (Failed, Generating)
        )
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "generating" => Ok(Self::Generating),
            "ready" => Ok(Self::Ready),
            "publishing" => Ok(Self::Publishing),
            "published" => Ok(Self::Published),
            "failed" => Ok(Self::Failed),
            _ => Err(UnknownVariant {
                kind: "campaign status",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for CampaignStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Downloadable guide generated alongside a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfGuide {
    pub title: String,
    #[serde(default)]
    pub introduction: String,
    pub sections: Vec<GuideSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideSection {
    pub heading: String,
    pub body: String,
    #[serde(default)]
    pub checklist: Vec<String>,
}

/// Short-form video script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoScript {
    pub title: String,
    pub hook: String,
    pub scenes: Vec<VideoScene>,
    pub call_to_action: String,
    #[serde(default)]
    pub total_duration_seconds: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoScene {
    pub visual: String,
    pub narration: String,
    pub duration_seconds: u32,
}

impl VideoScript {
    /// Recompute the total from the scenes; model-reported totals are ignored.
    pub fn with_computed_duration(mut self) -> Self {
        self.total_duration_seconds = self.scenes.iter().map(|s| s.duration_seconds).sum();
        self
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub topic: String,
    pub source_post_id: Option<Uuid>,
    #[sqlx(try_from = "String")]
    pub status: CampaignStatus,
    pub keywords: Vec<String>,
    pub newsletter_id: Option<Uuid>,
    pub pdf_guide: Option<Json<PdfGuide>>,
    pub video_script: Option<Json<VideoScript>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub topic: String,
    pub source_post_id: Option<Uuid>,
    pub keywords: Vec<String>,
}

/// Campaign with its linked artifacts resolved.
#[derive(Debug, Clone, Serialize)]
pub struct CampaignDetail {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub newsletter: Option<Newsletter>,
    pub social_series: Vec<SocialSeries>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use CampaignStatus::*;

    #[test]
    fn happy_path_transitions_are_allowed() {
        assert!(Draft.can_transition_to(Generating));
        assert!(Generating.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Publishing));
        assert!(Publishing.can_transition_to(Published));
    }

    #[test]
    fn failures_and_regeneration() {
        assert!(Generating.can_transition_to(Failed));
        assert!(Publishing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Generating));
    }

    #[test]
    fn shortcuts_are_rejected() {
        assert!(!Draft.can_transition_to(Ready));
        assert!(!Draft.can_transition_to(Published));
        assert!(!Ready.can_transition_to(Published));
        assert!(!Published.can_transition_to(Generating));
        assert!(!Published.can_transition_to(Failed));
        assert!(!Ready.can_transition_to(Ready));
    }

    #[test]
    fn video_duration_is_sum_of_scenes() {
        let script = VideoScript {
            title: "Deadlines".into(),
            hook: "Miss one and pay".into(),
            scenes: vec![
                VideoScene {
                    visual: "Calendar".into(),
                    narration: "April 15".into(),
                    duration_seconds: 8,
                },
                VideoScene {
                    visual: "Desk".into(),
                    narration: "Extensions".into(),
                    duration_seconds: 12,
                },
            ],
            call_to_action: "Book a call".into(),
            total_duration_seconds: 999,
        }
        .with_computed_duration();

        assert_eq!(script.total_duration_seconds, 20);
    }
}
