use crate::dtos::content::{CreateCategoryRequest, ReorderCategoriesRequest, UpdateCategoryRequest};
use crate::models::{visible_category_tree, Category, CategoryNode, CategoryUpdate};
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

/// GET /api/categories: visible categories as a tree. A hidden category
/// hides its whole subtree.
pub async fn category_tree(State(state): State<AppState>) -> Result<Json<Vec<CategoryNode>>, AppError> {
    let categories = state.db.list_categories().await?;
    Ok(Json(visible_category_tree(categories)))
}

/// GET /api/admin/categories
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.db.list_categories().await?))
}

/// POST /api/admin/categories
pub async fn create_category(
    State(state): State<AppState>,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    req.validate()?;
    let category = state.db.create_category(&req.into_new_category()?).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/admin/categories/:id
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<Json<Category>, AppError> {
    req.validate()?;
    let update = CategoryUpdate::from(req);
    Ok(Json(state.db.update_category(id, &update).await?))
}

/// DELETE /api/admin/categories/:id
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/categories/reorder
pub async fn reorder_categories(
    State(state): State<AppState>,
    Json(req): Json<ReorderCategoriesRequest>,
) -> Result<Json<Vec<Category>>, AppError> {
    req.validate()?;
    Ok(Json(state.db.reorder_categories(&req.ids).await?))
}
