//! Campaign orchestration: fan-out generation and multi-channel publishing.

use crate::models::{
    CampaignDetail, CampaignStatus, NewCampaign, NewNewsletter, NewSocialSeries, NewsletterStatus,
    PdfGuide, Platform, PostAction, SeriesStatus, VideoScript,
};
use crate::services::database::Database;
use crate::services::generator::{
    ContentGenerator, GeneratedNewsletter, GeneratedSeries, GenerationError, SourceContent,
};
use crate::services::metrics::CAMPAIGNS_TOTAL;
use crate::services::newsletter::NewsletterService;
use crate::services::social::SocialPublisher;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Where the campaign's source material comes from: an existing post, or
/// title and content supplied directly.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignRequest {
    pub topic: Option<String>,
    pub source_post_id: Option<Uuid>,
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Everything one generation run produces.
#[derive(Debug, Clone)]
pub struct CampaignArtifacts {
    pub newsletter: GeneratedNewsletter,
    pub series: Vec<GeneratedSeries>,
    pub guide: PdfGuide,
    pub script: VideoScript,
}

/// Per-channel outcome of a publish run.
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub campaign_id: Uuid,
    pub status: CampaignStatus,
    pub blog: bool,
    pub newsletter: bool,
    pub social: HashMap<Platform, bool>,
    pub errors: Vec<String>,
}

impl PublishReport {
    fn new(campaign_id: Uuid) -> Self {
        Self {
            campaign_id,
            status: CampaignStatus::Publishing,
            blog: false,
            newsletter: false,
            social: HashMap::new(),
            errors: Vec::new(),
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.blog && self.newsletter && self.social.values().all(|ok| *ok)
    }
}

/// Generate every campaign artifact concurrently. The first failure wins.
pub async fn generate_artifacts(
    generator: &ContentGenerator,
    source: &SourceContent,
) -> Result<CampaignArtifacts, GenerationError> {
    let (newsletter, linkedin, twitter, facebook, instagram, guide, script) = futures::try_join!(
        generator.generate_newsletter(source),
        generator.generate_social_series(source, Platform::LinkedIn),
        generator.generate_social_series(source, Platform::Twitter),
        generator.generate_social_series(source, Platform::Facebook),
        generator.generate_social_series(source, Platform::Instagram),
        generator.generate_pdf_guide(source),
        generator.generate_video_script(source),
    )?;

    Ok(CampaignArtifacts {
        newsletter,
        series: vec![linkedin, twitter, facebook, instagram],
        guide,
        script,
    })
}

#[derive(Clone)]
pub struct CampaignService {
    db: Database,
    generator: ContentGenerator,
    newsletters: NewsletterService,
    publisher: Arc<dyn SocialPublisher>,
}

impl CampaignService {
    pub fn new(
        db: Database,
        generator: ContentGenerator,
        newsletters: NewsletterService,
        publisher: Arc<dyn SocialPublisher>,
    ) -> Self {
        Self {
            db,
            generator,
            newsletters,
            publisher,
        }
    }

    async fn resolve_source(&self, request: &CampaignRequest) -> Result<SourceContent, AppError> {
        if let Some(post_id) = request.source_post_id {
            let post = self
                .db
                .get_post(post_id)
                .await?
                .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Post {} not found", post_id)))?;

            let mut keywords = request.keywords.clone();
            if keywords.is_empty() {
                keywords.extend(post.focus_keyword.clone());
            }

            return Ok(SourceContent {
                post_id: Some(post.id),
                title: post.title,
                content: post.content,
                keywords,
            });
        }

        match (request.title.as_deref(), request.content.as_deref()) {
            (Some(title), Some(content)) if !title.trim().is_empty() && !content.trim().is_empty() => {
                Ok(SourceContent {
                    post_id: None,
                    title: title.trim().to_string(),
                    content: content.to_string(),
                    keywords: request.keywords.clone(),
                })
            }
            _ => Err(AppError::BadRequest(anyhow::anyhow!(
                "Either source_post_id or both title and content are required"
            ))),
        }
    }

    /// Create a campaign and generate all of its artifacts.
    #[instrument(skip(self, request))]
    pub async fn generate(&self, request: &CampaignRequest) -> Result<CampaignDetail, AppError> {
        let source = self.resolve_source(request).await?;
        let topic = request
            .topic
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(&source.title)
            .to_string();

        let campaign = self
            .db
            .create_campaign(&NewCampaign {
                topic,
                source_post_id: source.post_id,
                keywords: source.keywords.clone(),
            })
            .await?;

        self.run_generation(campaign.id, &source).await
    }

    /// Re-run generation for a failed campaign.
    ///
    /// Campaigns built from direct content keep no copy of it, so `request`
    /// must supply title and content again when there is no source post.
    #[instrument(skip(self, request))]
    pub async fn regenerate(
        &self,
        id: Uuid,
        request: &CampaignRequest,
    ) -> Result<CampaignDetail, AppError> {
        let campaign = self
            .db
            .get_campaign(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Campaign {} not found", id)))?;

        if campaign.status != CampaignStatus::Failed {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Only failed campaigns can be regenerated (status is {})",
                campaign.status
            )));
        }

        let source = self
            .resolve_source(&CampaignRequest {
                source_post_id: campaign.source_post_id,
                keywords: if request.keywords.is_empty() {
                    campaign.keywords.clone()
                } else {
                    request.keywords.clone()
                },
                ..request.clone()
            })
            .await?;

        self.run_generation(id, &source).await
    }

    async fn run_generation(
        &self,
        id: Uuid,
        source: &SourceContent,
    ) -> Result<CampaignDetail, AppError> {
        self.db
            .transition_campaign(id, CampaignStatus::Generating, None)
            .await?;

        match self.generate_and_store(id, source).await {
            Ok(()) => {
                self.db
                    .transition_campaign(id, CampaignStatus::Ready, None)
                    .await?;
                CAMPAIGNS_TOTAL.with_label_values(&["generated"]).inc();
                info!(campaign_id = %id, "Campaign generated");
                self.db.campaign_detail(id).await
            }
            Err(e) => {
                CAMPAIGNS_TOTAL.with_label_values(&["generation_failed"]).inc();
                error!(campaign_id = %id, error = %e, "Campaign generation failed");
                if let Err(mark_err) = self
                    .db
                    .transition_campaign(id, CampaignStatus::Failed, Some(&e.to_string()))
                    .await
                {
                    error!(campaign_id = %id, error = %mark_err, "Failed to mark campaign failed");
                }
                Err(e)
            }
        }
    }

    /// Rows written before a later step fails are left in place.
    async fn generate_and_store(&self, id: Uuid, source: &SourceContent) -> Result<(), AppError> {
        let artifacts = generate_artifacts(&self.generator, source).await?;

        let newsletter = self
            .db
            .create_newsletter(&NewNewsletter {
                subject: artifacts.newsletter.subject,
                preview_text: Some(artifacts.newsletter.preview_text)
                    .filter(|p| !p.trim().is_empty()),
                content_html: artifacts.newsletter.content_html,
                content_text: artifacts.newsletter.content_text,
                campaign_id: Some(id),
            })
            .await?;

        let mut series_ids = Vec::with_capacity(artifacts.series.len());
        for series in artifacts.series {
            let row = self
                .db
                .create_social_series(&NewSocialSeries {
                    platform: series.platform,
                    title: series.title,
                    source_post_id: source.post_id,
                    posts: series.posts,
                })
                .await?;
            series_ids.push(row.id);
        }

        self.db
            .link_campaign_artifacts(id, newsletter.id, &series_ids, &artifacts.guide, &artifacts.script)
            .await
    }

    /// Publish every channel of a ready campaign.
    ///
    /// Channels are independent: a failing channel is recorded in the report
    /// and the others still run. Nothing is rolled back.
    #[instrument(skip(self))]
    pub async fn publish(&self, id: Uuid) -> Result<PublishReport, AppError> {
        let detail = self.db.campaign_detail(id).await?;
        if detail.campaign.status != CampaignStatus::Ready {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Campaign must be ready to publish (status is {})",
                detail.campaign.status
            )));
        }

        self.db
            .transition_campaign(id, CampaignStatus::Publishing, None)
            .await?;

        let mut report = PublishReport::new(id);

        match detail.campaign.source_post_id {
            Some(post_id) => match self.db.change_post_status(post_id, PostAction::Publish).await {
                Ok(_) => report.blog = true,
                Err(e) => report.errors.push(format!("blog: {}", e)),
            },
            None => report.blog = true,
        }

        match &detail.newsletter {
            Some(newsletter) => match self.newsletters.send(newsletter.id).await {
                Ok(delivery) if delivery.newsletter.status == NewsletterStatus::Sent => {
                    report.newsletter = true
                }
                Ok(delivery) => report.errors.push(format!(
                    "newsletter: {} of {} deliveries failed",
                    delivery.outcome.failed, delivery.outcome.recipients
                )),
                Err(e) => report.errors.push(format!("newsletter: {}", e)),
            },
            None => report.errors.push("newsletter: campaign has no newsletter".to_string()),
        }

        for series in &detail.social_series {
            let published = match self.publisher.publish(series).await {
                Ok(receipt) => {
                    info!(series_id = %receipt.series_id, platform = %receipt.platform, "Series published");
                    true
                }
                Err(e) => {
                    warn!(series_id = %series.id, platform = %series.platform, error = %e, "Series publish failed");
                    report.errors.push(format!("{}: {}", series.platform, e));
                    false
                }
            };

            let status = if published {
                SeriesStatus::Published
            } else {
                SeriesStatus::Failed
            };
            if let Err(e) = self.db.set_series_status(series.id, status).await {
                warn!(series_id = %series.id, error = %e, "Failed to record series status");
            }
            report.social.insert(series.platform, published);
        }

        if report.all_succeeded() {
            self.db
                .transition_campaign(id, CampaignStatus::Published, None)
                .await?;
            report.status = CampaignStatus::Published;
            CAMPAIGNS_TOTAL.with_label_values(&["published"]).inc();
            info!(campaign_id = %id, "Campaign published");
        } else {
            let message = report.errors.join("; ");
            self.db
                .transition_campaign(id, CampaignStatus::Failed, Some(&message))
                .await?;
            report.status = CampaignStatus::Failed;
            CAMPAIGNS_TOTAL.with_label_values(&["publish_failed"]).inc();
            warn!(campaign_id = %id, errors = %message, "Campaign publish incomplete");
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::services::providers::{MockTextProvider, ProviderError};

    fn site() -> SiteConfig {
        SiteConfig {
            base_url: "https://firm.example".into(),
            firm_name: "Ledger & Co".into(),
            consultation_url: "https://firm.example/contact".into(),
            contact_phone: Some("555-0100".into()),
        }
    }

    fn generator(provider: MockTextProvider) -> ContentGenerator {
        ContentGenerator::new(Arc::new(provider), site(), 0.7, 2048)
    }

    fn source() -> SourceContent {
        SourceContent {
            post_id: None,
            title: "Year-end payroll checklist".into(),
            content: "Close the books, reconcile payroll and file W-2s on time.".into(),
            keywords: vec!["payroll".into()],
        }
    }

    #[tokio::test]
    async fn fan_out_produces_every_artifact() {
        let provider = Arc::new(MockTextProvider::new(true));
        let generator = ContentGenerator::new(provider.clone(), site(), 0.7, 2048);

        let artifacts = generate_artifacts(&generator, &source()).await.unwrap();

        // newsletter + four series + guide + script
        assert_eq!(provider.call_count(), 7);
        let platforms: Vec<Platform> = artifacts.series.iter().map(|s| s.platform).collect();
        assert_eq!(platforms, Platform::ALL.to_vec());
        for series in &artifacts.series {
            assert_eq!(series.posts.len(), series.platform.series_length());
        }
        assert!(!artifacts.guide.sections.is_empty());
        assert_eq!(artifacts.script.total_duration_seconds, 60);
        assert!(!artifacts.newsletter.subject.is_empty());
    }

    #[tokio::test]
    async fn one_failing_channel_fails_the_fan_in() {
        let err = generate_artifacts(
            &generator(MockTextProvider::failing_on("Platform: instagram")),
            &source(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            GenerationError::Provider(ProviderError::ApiError(_))
        ));
    }

    #[test]
    fn report_requires_every_channel() {
        let mut report = PublishReport::new(Uuid::new_v4());
        report.blog = true;
        report.newsletter = true;
        report.social.insert(Platform::LinkedIn, true);
        assert!(report.all_succeeded());

        report.social.insert(Platform::Twitter, false);
        assert!(!report.all_succeeded());
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let request: CampaignRequest =
            serde_json::from_str(r#"{"source_post_id": "7f0c8a8e-2f9e-4a55-9d0a-1f6f0d8c3b11"}"#)
                .unwrap();
        assert!(request.keywords.is_empty());
        assert!(request.title.is_none());
    }
}
