//! Blog post model and publication lifecycle.

use super::{Category, Tag, UnknownVariant};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

/// Publication status of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
    Archived,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            _ => Err(UnknownVariant {
                kind: "post status",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for PostStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Explicit status changes. Content edits never change status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    Publish,
    Unpublish,
    Archive,
}

impl PostAction {
    /// Resulting `(status, published_at)`.
    ///
    /// A post is published exactly when it carries a `published_at`.
    /// Re-publishing keeps the original timestamp.
    pub fn apply(
        self,
        status: PostStatus,
        published_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> (PostStatus, Option<DateTime<Utc>>) {
        match self {
            PostAction::Publish => {
                let stamp = match (status, published_at) {
                    (PostStatus::Published, Some(at)) => at,
                    _ => now,
                };
                (PostStatus::Published, Some(stamp))
            }
            PostAction::Unpublish => (PostStatus::Draft, None),
            PostAction::Archive => (PostStatus::Archived, None),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PostAction::Publish => "publish",
            PostAction::Unpublish => "unpublish",
            PostAction::Archive => "archive",
        }
    }
}

/// Blog post row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image_url: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub focus_keyword: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: PostStatus,
    pub author_name: Option<String>,
    pub reading_time_minutes: i32,
    pub quality_score: Option<i32>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn is_published(&self) -> bool {
        self.status == PostStatus::Published && self.published_at.is_some()
    }
}

/// Post with its taxonomy, as served to readers and the editor.
#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub categories: Vec<Category>,
    pub tags: Vec<Tag>,
}

/// Input for creating a post. Always created as a draft.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub featured_image_url: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub focus_keyword: Option<String>,
    pub author_name: Option<String>,
    pub quality_score: Option<i32>,
}

/// Partial update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub content: Option<String>,
    pub featured_image_url: Option<String>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub focus_keyword: Option<String>,
    pub author_name: Option<String>,
    pub quality_score: Option<i32>,
}

/// Listing filters.
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub status: Option<PostStatus>,
    pub category_slug: Option<String>,
    pub tag_slug: Option<String>,
    pub search: Option<String>,
}
