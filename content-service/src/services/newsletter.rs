//! Newsletter delivery to active subscribers.

use crate::config::SiteConfig;
use crate::models::{Newsletter, NewsletterStatus};
use crate::services::database::Database;
use crate::services::generator::UNSUBSCRIBE_PLACEHOLDER;
use crate::services::mailer::{EmailMessage, EmailProvider};
use crate::services::metrics::NEWSLETTER_DELIVERIES_TOTAL;
use chrono::Utc;
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Counts from one delivery run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryOutcome {
    pub recipients: i32,
    pub sent: i32,
    pub failed: i32,
}

impl DeliveryOutcome {
    /// `sent` when anything got through or there was nobody to send to.
    pub fn final_status(&self) -> NewsletterStatus {
        if self.sent > 0 || self.recipients == 0 {
            NewsletterStatus::Sent
        } else {
            NewsletterStatus::Failed
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeliveryReport {
    pub newsletter: Newsletter,
    pub outcome: DeliveryOutcome,
}

/// Public unsubscribe link for `email`.
pub fn unsubscribe_url(site: &SiteConfig, email: &str) -> String {
    let base = format!("{}/newsletter/unsubscribe", site.base_url.trim_end_matches('/'));
    match reqwest::Url::parse_with_params(&base, &[("email", email)]) {
        Ok(url) => url.to_string(),
        Err(_) => base,
    }
}

/// Build the message for one recipient with the unsubscribe link filled in.
pub fn personalize(newsletter: &Newsletter, to: &str, site: &SiteConfig) -> EmailMessage {
    let link = unsubscribe_url(site, to);
    EmailMessage {
        to: to.to_string(),
        subject: newsletter.subject.clone(),
        body_text: newsletter.content_text.replace(UNSUBSCRIBE_PLACEHOLDER, &link),
        body_html: newsletter.content_html.replace(UNSUBSCRIBE_PLACEHOLDER, &link),
        unsubscribe_url: Some(link),
    }
}

#[derive(Clone)]
pub struct NewsletterService {
    db: Database,
    mailer: Arc<dyn EmailProvider>,
    site: SiteConfig,
}

impl NewsletterService {
    pub fn new(db: Database, mailer: Arc<dyn EmailProvider>, site: SiteConfig) -> Self {
        Self { db, mailer, site }
    }

    /// Send to every active subscriber, one message each.
    #[instrument(skip(self))]
    pub async fn send(&self, id: Uuid) -> Result<DeliveryReport, AppError> {
        let newsletter = self.db.claim_newsletter_for_sending(id).await?;

        let subscribers = match self.db.active_subscribers().await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                error!(newsletter_id = %id, error = %e, "Failed to load subscribers");
                self.mark_failed(id, &DeliveryOutcome::default()).await;
                return Err(e);
            }
        };

        let mut outcome = DeliveryOutcome {
            recipients: subscribers.len() as i32,
            ..Default::default()
        };

        for subscriber in &subscribers {
            let message = personalize(&newsletter, &subscriber.email, &self.site);
            match self.mailer.send(&message).await {
                Ok(()) => {
                    outcome.sent += 1;
                    NEWSLETTER_DELIVERIES_TOTAL.with_label_values(&["sent"]).inc();
                }
                Err(e) => {
                    outcome.failed += 1;
                    NEWSLETTER_DELIVERIES_TOTAL.with_label_values(&["failed"]).inc();
                    warn!(subscriber_id = %subscriber.id, error = %e, "Newsletter delivery failed");
                }
            }
        }

        let status = outcome.final_status();
        let sent_at = (status == NewsletterStatus::Sent).then(Utc::now);

        let newsletter = match self
            .db
            .finish_newsletter_delivery(
                id,
                status,
                outcome.recipients,
                outcome.sent,
                outcome.failed,
                sent_at,
            )
            .await
        {
            Ok(newsletter) => newsletter,
            Err(e) => {
                error!(newsletter_id = %id, error = %e, "Failed to record delivery outcome");
                self.mark_failed(id, &outcome).await;
                return Err(e);
            }
        };

        info!(
            newsletter_id = %id,
            recipients = outcome.recipients,
            sent = outcome.sent,
            failed = outcome.failed,
            status = %status,
            "Newsletter delivery finished"
        );

        Ok(DeliveryReport {
            newsletter,
            outcome,
        })
    }

    /// Best effort: a newsletter must not stay in `sending` after a run ends.
    async fn mark_failed(&self, id: Uuid, outcome: &DeliveryOutcome) {
        if let Err(e) = self
            .db
            .finish_newsletter_delivery(
                id,
                NewsletterStatus::Failed,
                outcome.recipients,
                outcome.sent,
                outcome.failed,
                None,
            )
            .await
        {
            error!(newsletter_id = %id, error = %e, "Failed to mark newsletter as failed");
        }
    }

    /// Send a single preview copy. Status and counters are untouched.
    #[instrument(skip(self, to))]
    pub async fn send_test(&self, id: Uuid, to: &str) -> Result<(), AppError> {
        let newsletter = self
            .db
            .get_newsletter(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Newsletter {} not found", id)))?;

        let mut message = personalize(&newsletter, to, &self.site);
        message.subject = format!("[TEST] {}", message.subject);

        self.mailer.send(&message).await?;
        info!(newsletter_id = %id, "Test newsletter sent");
        Ok(())
    }
}
