//! Newsletter sign-up (public) and subscriber administration.

use crate::dtos::campaigns::{
    SetSubscriberStatusRequest, SubscribeRequest, SubscriberListQuery, UnsubscribeRequest,
};
use crate::dtos::{Paginated, Pagination};
use crate::models::{normalize_email, Subscriber, SubscriberStatus};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

/// POST /api/newsletter/subscribe
///
/// Responds the same way for new, returning and bounced addresses.
pub async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<Value>, AppError> {
    req.validate()?;
    let email = normalize_email(&req.email);
    let name = req.name.as_deref().map(str::trim).filter(|n| !n.is_empty());
    state.db.subscribe(&email, name).await?;
    Ok(Json(json!({ "subscribed": true })))
}

/// POST /api/newsletter/unsubscribe
///
/// Unknown addresses get the same response as known ones.
pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(req): Json<UnsubscribeRequest>,
) -> Result<Json<Value>, AppError> {
    req.validate()?;
    let email = normalize_email(&req.email);
    if state.db.unsubscribe(&email).await?.is_none() {
        tracing::debug!("Unsubscribe request for an unknown or bounced address");
    }
    Ok(Json(json!({ "unsubscribed": true })))
}

/// GET /api/admin/subscribers
pub async fn list_subscribers(
    State(state): State<AppState>,
    Query(query): Query<SubscriberListQuery>,
) -> Result<Json<Paginated<Subscriber>>, AppError> {
    let pagination = Pagination {
        page: query.page,
        page_size: query.page_size,
    };
    let (limit, offset) = pagination.limit_offset();
    let (subscribers, total) = state
        .db
        .list_subscribers(query.status, limit, offset)
        .await?;
    Ok(Json(Paginated::new(subscribers, total, &pagination)))
}

/// PUT /api/admin/subscribers/:id/status
///
/// The only way a bounced address becomes active again.
pub async fn set_subscriber_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetSubscriberStatusRequest>,
) -> Result<Json<Subscriber>, AppError> {
    let subscriber = state.db.set_subscriber_status(id, req.status).await?;
    if req.status == SubscriberStatus::Active {
        tracing::info!(subscriber_id = %id, "Subscriber re-activated by admin");
    }
    Ok(Json(subscriber))
}
