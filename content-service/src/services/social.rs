//! Social publishing through per-platform automation webhooks.

use crate::config::SocialConfig;
use crate::models::{Platform, SocialSeries};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use service_core::error::AppError;
use service_core::observability::TracedClientExt;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Publishing not configured for {0}")]
    NotConfigured(Platform),

    #[error("Webhook rejected the series: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

impl From<PublishError> for AppError {
    fn from(err: PublishError) -> Self {
        match err {
            PublishError::NotConfigured(_) => AppError::BadRequest(anyhow::anyhow!(err.to_string())),
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishReceipt {
    pub series_id: Uuid,
    pub platform: Platform,
    pub published_at: DateTime<Utc>,
}

#[async_trait]
pub trait SocialPublisher: Send + Sync {
    async fn publish(&self, series: &SocialSeries) -> Result<PublishReceipt, PublishError>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    series_id: Uuid,
    platform: Platform,
    title: &'a str,
    posts: Vec<WebhookPost>,
}

#[derive(Serialize)]
struct WebhookPost {
    sequence: u32,
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    slide_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_prompt: Option<String>,
}

/// POSTs each series to the automation webhook configured for its platform.
pub struct WebhookSocialPublisher {
    enabled: bool,
    urls: HashMap<Platform, String>,
    client: reqwest::Client,
}

impl WebhookSocialPublisher {
    pub fn new(config: &SocialConfig) -> Self {
        let urls = [
            (Platform::LinkedIn, &config.linkedin_webhook_url),
            (Platform::Twitter, &config.twitter_webhook_url),
            (Platform::Facebook, &config.facebook_webhook_url),
            (Platform::Instagram, &config.instagram_webhook_url),
        ]
        .into_iter()
        .filter_map(|(platform, url)| url.clone().map(|u| (platform, u)))
        .collect();

        Self {
            enabled: config.enabled,
            urls,
            client: reqwest::Client::new(),
        }
    }

    fn url_for(&self, platform: Platform) -> Result<&str, PublishError> {
        if !self.enabled {
            return Err(PublishError::NotConfigured(platform));
        }
        self.urls
            .get(&platform)
            .map(String::as_str)
            .ok_or(PublishError::NotConfigured(platform))
    }
}

#[async_trait]
impl SocialPublisher for WebhookSocialPublisher {
    async fn publish(&self, series: &SocialSeries) -> Result<PublishReceipt, PublishError> {
        let url = self.url_for(series.platform)?;

        let payload = WebhookPayload {
            series_id: series.id,
            platform: series.platform,
            title: &series.title,
            posts: series
                .posts
                .iter()
                .map(|p| WebhookPost {
                    sequence: p.sequence,
                    text: p.rendered(),
                    slide_title: p.slide_title.clone(),
                    image_prompt: p.image_prompt.clone(),
                })
                .collect(),
        };

        let response = self
            .client
            .traced_post(url)
            .json(&payload)
            .send(None)
            .await
            .map_err(|e| PublishError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected(format!("{}: {}", status, body)));
        }

        tracing::info!(series_id = %series.id, platform = %series.platform, "Series sent to webhook");

        Ok(PublishReceipt {
            series_id: series.id,
            platform: series.platform,
            published_at: Utc::now(),
        })
    }
}

/// Records published series; platforms listed in `failing` return `NotConfigured`.
#[derive(Default)]
pub struct MockSocialPublisher {
    failing: Vec<Platform>,
    published: Mutex<Vec<Uuid>>,
}

impl MockSocialPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(platforms: &[Platform]) -> Self {
        Self {
            failing: platforms.to_vec(),
            published: Mutex::new(Vec::new()),
        }
    }

    pub fn published(&self) -> Vec<Uuid> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SocialPublisher for MockSocialPublisher {
    async fn publish(&self, series: &SocialSeries) -> Result<PublishReceipt, PublishError> {
        if self.failing.contains(&series.platform) {
            return Err(PublishError::NotConfigured(series.platform));
        }
        if let Ok(mut published) = self.published.lock() {
            published.push(series.id);
        }
        Ok(PublishReceipt {
            series_id: series.id,
            platform: series.platform,
            published_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SeriesStatus, SocialPost};
    use sqlx::types::Json;

    fn series(platform: Platform) -> SocialSeries {
        SocialSeries {
            id: Uuid::new_v4(),
            platform,
            title: "Payroll tips".into(),
            source_post_id: None,
            posts: Json(vec![SocialPost {
                sequence: 1,
                content: "Run payroll on time.".into(),
                hashtags: vec!["Payroll".into()],
                slide_title: None,
                image_prompt: None,
            }]),
            status: SeriesStatus::Draft,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn config(enabled: bool) -> SocialConfig {
        SocialConfig {
            enabled,
            linkedin_webhook_url: Some("https://hooks.example/linkedin".into()),
            twitter_webhook_url: None,
            facebook_webhook_url: None,
            instagram_webhook_url: None,
        }
    }

    #[tokio::test]
    async fn platform_without_url_is_not_configured() {
        let publisher = WebhookSocialPublisher::new(&config(true));
        let err = publisher.publish(&series(Platform::Twitter)).await.unwrap_err();
        assert!(matches!(err, PublishError::NotConfigured(Platform::Twitter)));
    }

    #[test]
    fn disabled_publisher_refuses_every_platform() {
        let publisher = WebhookSocialPublisher::new(&config(false));
        assert!(publisher.url_for(Platform::LinkedIn).is_err());
        assert!(WebhookSocialPublisher::new(&config(true))
            .url_for(Platform::LinkedIn)
            .is_ok());
    }

    #[tokio::test]
    async fn mock_records_successes_only() {
        let publisher = MockSocialPublisher::failing_for(&[Platform::Facebook]);
        let ok = series(Platform::LinkedIn);
        publisher.publish(&ok).await.unwrap();
        assert!(publisher.publish(&series(Platform::Facebook)).await.is_err());
        assert_eq!(publisher.published(), vec![ok.id]);
    }
}
