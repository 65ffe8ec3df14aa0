//! Domain models for content-service.

mod campaign;
mod category;
mod newsletter;
mod post;
mod social_series;
mod subscriber;
mod tag;

pub use campaign::{
    Campaign, CampaignDetail, CampaignStatus, GuideSection, NewCampaign, PdfGuide, VideoScene,
    VideoScript,
};
pub use category::{
    build_category_tree, visible_category_tree, would_create_cycle, Category, CategoryNode,
    CategoryUpdate, NewCategory,
};
pub use newsletter::{NewNewsletter, Newsletter, NewsletterStatus, NewsletterUpdate};
pub use post::{NewPost, Post, PostAction, PostDetail, PostFilter, PostStatus, PostUpdate};
pub use social_series::{NewSocialSeries, Platform, SeriesStatus, SocialPost, SocialSeries};
pub use subscriber::{normalize_email, Subscriber, SubscriberStatus};
pub use tag::Tag;

/// Error returned when a stored enum value is not recognised.
#[derive(Debug, thiserror::Error)]
#[error("Unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
