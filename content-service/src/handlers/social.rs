use crate::dtos::campaigns::SeriesListQuery;
use crate::dtos::{Paginated, Pagination};
use crate::models::{SeriesStatus, SocialSeries};
use crate::services::social::PublishReceipt;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;

fn series_not_found(id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Social series {} not found", id))
}

pub async fn list_series(
    State(state): State<AppState>,
    Query(query): Query<SeriesListQuery>,
) -> Result<Json<Paginated<SocialSeries>>, AppError> {
    let pagination = Pagination {
        page: query.page,
        page_size: query.page_size,
    };
    let (limit, offset) = pagination.limit_offset();
    let (series, total) = state
        .db
        .list_social_series(query.platform, limit, offset)
        .await?;
    Ok(Json(Paginated::new(series, total, &pagination)))
}

pub async fn get_series(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SocialSeries>, AppError> {
    state
        .db
        .get_social_series(id)
        .await?
        .map(Json)
        .ok_or_else(|| series_not_found(id))
}

/// POST /api/admin/social-series/:id/publish
pub async fn publish_series(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PublishReceipt>, AppError> {
    let series = state
        .db
        .get_social_series(id)
        .await?
        .ok_or_else(|| series_not_found(id))?;

    match state.publisher.publish(&series).await {
        Ok(receipt) => {
            state.db.set_series_status(id, SeriesStatus::Published).await?;
            Ok(Json(receipt))
        }
        Err(e) => {
            tracing::warn!(series_id = %id, error = %e, "Series publish failed");
            state.db.set_series_status(id, SeriesStatus::Failed).await?;
            Err(e.into())
        }
    }
}
