use crate::dtos::campaigns::{
    CreateNewsletterRequest, NewsletterListQuery, TestSendRequest, UpdateNewsletterRequest,
};
use crate::dtos::{Paginated, Pagination};
use crate::models::{NewNewsletter, Newsletter, NewsletterUpdate};
use crate::services::newsletter::DeliveryReport;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use service_core::middleware::tracing::RequestId;
use uuid::Uuid;
use validator::Validate;

pub async fn list_newsletters(
    State(state): State<AppState>,
    Query(query): Query<NewsletterListQuery>,
) -> Result<Json<Paginated<Newsletter>>, AppError> {
    let pagination = Pagination {
        page: query.page,
        page_size: query.page_size,
    };
    let (limit, offset) = pagination.limit_offset();
    let (newsletters, total) = state
        .db
        .list_newsletters(query.status, limit, offset)
        .await?;
    Ok(Json(Paginated::new(newsletters, total, &pagination)))
}

pub async fn create_newsletter(
    State(state): State<AppState>,
    Json(req): Json<CreateNewsletterRequest>,
) -> Result<(StatusCode, Json<Newsletter>), AppError> {
    req.validate()?;
    let newsletter = state.db.create_newsletter(&NewNewsletter::from(req)).await?;
    Ok((StatusCode::CREATED, Json(newsletter)))
}

pub async fn get_newsletter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Newsletter>, AppError> {
    state
        .db
        .get_newsletter(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Newsletter {} not found", id)))
}

/// Rejected with 409 once sending has started.
pub async fn update_newsletter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateNewsletterRequest>,
) -> Result<Json<Newsletter>, AppError> {
    req.validate()?;
    let update = NewsletterUpdate::from(req);
    Ok(Json(state.db.update_newsletter(id, &update).await?))
}

pub async fn send_newsletter(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(id): Path<Uuid>,
) -> Result<Json<DeliveryReport>, AppError> {
    tracing::info!(request_id = %request_id.as_str(), newsletter_id = %id, "Newsletter send requested");
    Ok(Json(state.newsletters.send(id).await?))
}

pub async fn send_test_newsletter(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TestSendRequest>,
) -> Result<StatusCode, AppError> {
    req.validate()?;
    state.newsletters.send_test(id, &req.email).await?;
    Ok(StatusCode::NO_CONTENT)
}
