//! Campaigns, newsletters, subscribers and social series.

use crate::models::{NewNewsletter, NewsletterStatus, NewsletterUpdate, Platform, SubscriberStatus};
use crate::services::campaign::CampaignRequest;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_keywords(keywords: &[String]) -> Result<(), ValidationError> {
    if keywords.len() > 20 || keywords.iter().any(|k| k.len() > 100) {
        return Err(ValidationError::new("keywords"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCampaignRequest {
    #[validate(length(min = 1, max = 200))]
    pub topic: Option<String>,
    pub source_post_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_keywords"))]
    pub keywords: Vec<String>,
}

impl From<CreateCampaignRequest> for CampaignRequest {
    fn from(req: CreateCampaignRequest) -> Self {
        CampaignRequest {
            topic: req.topic,
            source_post_id: req.source_post_id,
            title: req.title,
            content: req.content,
            keywords: req.keywords,
        }
    }
}

/// Optional body for regenerate; needed only when the campaign has no source post.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct RegenerateCampaignRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_keywords"))]
    pub keywords: Vec<String>,
}

impl From<RegenerateCampaignRequest> for CampaignRequest {
    fn from(req: RegenerateCampaignRequest) -> Self {
        CampaignRequest {
            title: req.title,
            content: req.content,
            keywords: req.keywords,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNewsletterRequest {
    #[validate(length(min = 1, max = 150))]
    pub subject: String,
    #[validate(length(max = 200))]
    pub preview_text: Option<String>,
    #[validate(length(min = 1))]
    pub content_html: String,
    #[validate(length(min = 1))]
    pub content_text: String,
}

impl From<CreateNewsletterRequest> for NewNewsletter {
    fn from(req: CreateNewsletterRequest) -> Self {
        NewNewsletter {
            subject: req.subject,
            preview_text: req.preview_text,
            content_html: req.content_html,
            content_text: req.content_text,
            campaign_id: None,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateNewsletterRequest {
    #[validate(length(min = 1, max = 150))]
    pub subject: Option<String>,
    #[validate(length(max = 200))]
    pub preview_text: Option<String>,
    #[validate(length(min = 1))]
    pub content_html: Option<String>,
    #[validate(length(min = 1))]
    pub content_text: Option<String>,
}

impl From<UpdateNewsletterRequest> for NewsletterUpdate {
    fn from(req: UpdateNewsletterRequest) -> Self {
        NewsletterUpdate {
            subject: req.subject,
            preview_text: req.preview_text,
            content_html: req.content_html,
            content_text: req.content_text,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NewsletterListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<NewsletterStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TestSendRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubscribeRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(max = 100))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UnsubscribeRequest {
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriberListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<SubscriberStatus>,
}

#[derive(Debug, Deserialize)]
pub struct SetSubscriberStatusRequest {
    pub status: SubscriberStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct SeriesListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub platform: Option<Platform>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_many_keywords_fail_validation() {
        let keywords: Vec<String> = (0..21).map(|i| format!("kw{i}")).collect();
        let req = CreateCampaignRequest {
            topic: None,
            source_post_id: Some(Uuid::new_v4()),
            title: None,
            content: None,
            keywords,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn subscribe_requires_valid_email() {
        let req: SubscribeRequest = serde_json::from_str(r#"{"email": "not-an-email"}"#).unwrap();
        assert!(req.validate().is_err());

        let req: SubscribeRequest =
            serde_json::from_str(r#"{"email": "owner@example.com", "name": "Pat"}"#).unwrap();
        assert!(req.validate().is_ok());
    }

    #[test]
    fn subscriber_status_parses_lowercase() {
        let req: SetSubscriberStatusRequest =
            serde_json::from_str(r#"{"status": "bounced"}"#).unwrap();
        assert_eq!(req.status, SubscriberStatus::Bounced);
    }
}
