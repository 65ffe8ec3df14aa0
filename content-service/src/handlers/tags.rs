use crate::dtos::content::CreateTagRequest;
use crate::models::Tag;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, AppError> {
    Ok(Json(state.db.list_tags().await?))
}

/// Returns the existing tag when one with the same slug exists.
pub async fn create_tag(
    State(state): State<AppState>,
    Json(req): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<Tag>), AppError> {
    req.validate()?;
    Ok((StatusCode::CREATED, Json(state.db.create_tag(&req.name).await?)))
}

pub async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_tag(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
