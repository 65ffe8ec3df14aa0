//! Campaign generation and publishing.

use crate::dtos::campaigns::{CreateCampaignRequest, RegenerateCampaignRequest};
use crate::dtos::{Paginated, Pagination};
use crate::models::{Campaign, CampaignDetail};
use crate::services::campaign::{CampaignRequest, PublishReport};
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

/// GET /api/admin/campaigns
pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Paginated<Campaign>>, AppError> {
    let (limit, offset) = pagination.limit_offset();
    let (campaigns, total) = state.db.list_campaigns(limit, offset).await?;
    Ok(Json(Paginated::new(campaigns, total, &pagination)))
}

/// POST /api/admin/campaigns
///
/// Generates every artifact before responding.
pub async fn create_campaign(
    State(state): State<AppState>,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<CampaignDetail>), AppError> {
    req.validate()?;
    let detail = state.campaigns.generate(&CampaignRequest::from(req)).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// GET /api/admin/campaigns/:id
pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CampaignDetail>, AppError> {
    Ok(Json(state.db.campaign_detail(id).await?))
}

/// POST /api/admin/campaigns/:id/publish
pub async fn publish_campaign(
    State(state): State<AppState>,
    request_id: RequestId,
    Path(id): Path<Uuid>,
) -> Result<Json<PublishReport>, AppError> {
    tracing::info!(request_id = %request_id.as_str(), campaign_id = %id, "Campaign publish requested");
    Ok(Json(state.campaigns.publish(id).await?))
}

/// POST /api/admin/campaigns/:id/regenerate
pub async fn regenerate_campaign(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<RegenerateCampaignRequest>>,
) -> Result<Json<CampaignDetail>, AppError> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    req.validate()?;
    Ok(Json(
        state
            .campaigns
            .regenerate(id, &CampaignRequest::from(req))
            .await?,
    ))
}
