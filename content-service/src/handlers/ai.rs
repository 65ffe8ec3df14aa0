//! AI generation endpoints. `score` and `enhance` never call a provider.

use crate::dtos::ai::{
    BlogPostRequest, EnhanceRequest, ScoreRequest, SeoRequest, SocialSeriesRequest, SourceRequest,
};
use crate::services::generator::{
    GeneratedNewsletter, GeneratedPost, GeneratedSeries, SeoMetadata, SourceContent,
};
use crate::services::quality::{auto_enhance, score_content, Enhancement, QualityReport};
use crate::startup::AppState;
use axum::{extract::State, Json};
use service_core::error::AppError;
use validator::Validate;

pub async fn generate_blog_post(
    State(state): State<AppState>,
    Json(req): Json<BlogPostRequest>,
) -> Result<Json<GeneratedPost>, AppError> {
    req.validate()?;
    Ok(Json(
        state
            .generator
            .generate_blog_post(req.topic.trim(), &req.keywords)
            .await?,
    ))
}

pub async fn generate_newsletter(
    State(state): State<AppState>,
    Json(req): Json<SourceRequest>,
) -> Result<Json<GeneratedNewsletter>, AppError> {
    req.validate()?;
    let source = SourceContent::from(req);
    Ok(Json(state.generator.generate_newsletter(&source).await?))
}

pub async fn generate_social_series(
    State(state): State<AppState>,
    Json(req): Json<SocialSeriesRequest>,
) -> Result<Json<GeneratedSeries>, AppError> {
    req.validate()?;
    let platform = req.platform;
    let source = SourceContent::from(req.source);
    Ok(Json(
        state
            .generator
            .generate_social_series(&source, platform)
            .await?,
    ))
}

pub async fn generate_seo(
    State(state): State<AppState>,
    Json(req): Json<SeoRequest>,
) -> Result<Json<SeoMetadata>, AppError> {
    req.validate()?;
    Ok(Json(
        state
            .generator
            .generate_seo_metadata(&req.title, &req.content, req.focus_keyword.as_deref())
            .await?,
    ))
}

pub async fn score(Json(req): Json<ScoreRequest>) -> Result<Json<QualityReport>, AppError> {
    req.validate()?;
    Ok(Json(score_content(&req.content, req.focus_keyword.as_deref())))
}

pub async fn enhance(
    State(state): State<AppState>,
    Json(req): Json<EnhanceRequest>,
) -> Result<Json<Enhancement>, AppError> {
    req.validate()?;
    let options = req.options(&state.site);
    Ok(Json(auto_enhance(&req.content, &options)))
}
