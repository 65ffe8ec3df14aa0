//! Bodies for the `/api/ai` endpoints.

use crate::config::SiteConfig;
use crate::models::Platform;
use crate::services::generator::SourceContent;
use crate::services::quality::EnhanceOptions;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct BlogPostRequest {
    #[validate(length(min = 3, max = 200))]
    pub topic: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub keywords: Vec<String>,
}

/// Source article for newsletter and social generation.
#[derive(Debug, Deserialize, Validate)]
pub struct SourceRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub keywords: Vec<String>,
}

impl From<SourceRequest> for SourceContent {
    fn from(req: SourceRequest) -> Self {
        SourceContent {
            post_id: None,
            title: req.title,
            content: req.content,
            keywords: req.keywords,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SocialSeriesRequest {
    #[serde(flatten)]
    #[validate(nested)]
    pub source: SourceRequest,
    pub platform: Platform,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SeoRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
    #[validate(length(max = 100))]
    pub focus_keyword: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ScoreRequest {
    pub content: String,
    #[validate(length(max = 100))]
    pub focus_keyword: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EnhanceRequest {
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    pub topic: Option<String>,
    pub focus_keyword: Option<String>,
    #[serde(default)]
    pub add_key_takeaways: bool,
}

impl EnhanceRequest {
    /// Firm identity always comes from configuration.
    pub fn options(&self, site: &SiteConfig) -> EnhanceOptions {
        EnhanceOptions {
            topic: self.topic.clone(),
            firm_name: site.firm_name.clone(),
            consultation_url: site.consultation_url.clone(),
            contact_phone: site.contact_phone.clone(),
            focus_keyword: self.focus_keyword.clone(),
            add_key_takeaways: self.add_key_takeaways,
        }
    }
}
