//! Newsletter model and delivery status.

use super::UnknownVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsletterStatus {
    Draft,
    Sending,
    Sent,
    Failed,
}

impl NewsletterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// Only unsent or previously failed newsletters may be (re)sent.
    pub fn can_send(self) -> bool {
        matches!(self, Self::Draft | Self::Failed)
    }

    /// Content is frozen once delivery has started.
    pub fn is_editable(self) -> bool {
        matches!(self, Self::Draft | Self::Failed)
    }
}

impl std::fmt::Display for NewsletterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NewsletterStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "sending" => Ok(Self::Sending),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            _ => Err(UnknownVariant {
                kind: "newsletter status",
                value: s.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for NewsletterStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Newsletter {
    pub id: Uuid,
    pub subject: String,
    pub preview_text: Option<String>,
    pub content_html: String,
    pub content_text: String,
    #[sqlx(try_from = "String")]
    pub status: NewsletterStatus,
    pub recipient_count: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub sent_at: Option<DateTime<Utc>>,
    pub campaign_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewNewsletter {
    pub subject: String,
    pub preview_text: Option<String>,
    pub content_html: String,
    pub content_text: String,
    pub campaign_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default)]
pub struct NewsletterUpdate {
    pub subject: Option<String>,
    pub preview_text: Option<String>,
    pub content_html: Option<String>,
    pub content_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_draft_and_failed_can_send() {
        assert!(NewsletterStatus::Draft.can_send());
        assert!(NewsletterStatus::Failed.can_send());
        assert!(!NewsletterStatus::Sending.can_send());
        assert!(!NewsletterStatus::Sent.can_send());
    }
}
