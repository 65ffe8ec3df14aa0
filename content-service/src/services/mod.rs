pub mod campaign;
pub mod database;
pub mod generator;
pub mod mailer;
pub mod metrics;
pub mod newsletter;
pub mod providers;
pub mod quality;
pub mod social;

pub use campaign::{CampaignRequest, CampaignService, PublishReport};
pub use database::Database;
pub use generator::{ContentGenerator, GenerationError, SourceContent};
pub use mailer::{EmailProvider, MockEmailProvider, SmtpProvider};
pub use newsletter::NewsletterService;
pub use social::{MockSocialPublisher, SocialPublisher, WebhookSocialPublisher};
