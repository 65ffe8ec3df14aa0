//! Blog posts: public reads and admin management.

use crate::dtos::content::{
    CreatePostRequest, PostListQuery, SetCategoriesRequest, SetTagsRequest, UpdatePostRequest,
};
use crate::dtos::Paginated;
use crate::models::{Category, Post, PostAction, PostDetail, PostStatus, PostUpdate, Tag};
use crate::services::quality::score_content;
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

fn post_not_found(id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("Post {} not found", id))
}

/// GET /api/posts
pub async fn list_published_posts(
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<Paginated<Post>>, AppError> {
    let pagination = query.pagination();
    let mut filter = query.filter();
    filter.status = Some(PostStatus::Published);

    let (limit, offset) = pagination.limit_offset();
    let (posts, total) = state.db.list_posts(&filter, limit, offset).await?;
    Ok(Json(Paginated::new(posts, total, &pagination)))
}

/// GET /api/posts/:slug
pub async fn get_published_post(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<PostDetail>, AppError> {
    let post = state
        .db
        .get_published_post_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Post '{}' not found", slug)))?;
    Ok(Json(state.db.post_detail(post).await?))
}

/// GET /api/admin/posts
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> Result<Json<Paginated<Post>>, AppError> {
    let pagination = query.pagination();
    let (limit, offset) = pagination.limit_offset();
    let (posts, total) = state.db.list_posts(&query.filter(), limit, offset).await?;
    Ok(Json(Paginated::new(posts, total, &pagination)))
}

/// POST /api/admin/posts
pub async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<PostDetail>), AppError> {
    req.validate()?;
    let (mut new_post, category_ids, tags) = req.into_parts()?;
    new_post.quality_score = Some(i32::from(
        score_content(&new_post.content, new_post.focus_keyword.as_deref()).overall,
    ));

    let post = state.db.create_post(&new_post, &category_ids, &tags).await?;

    Ok((StatusCode::CREATED, Json(state.db.post_detail(post).await?)))
}

/// GET /api/admin/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PostDetail>, AppError> {
    let post = state.db.get_post(id).await?.ok_or_else(|| post_not_found(id))?;
    Ok(Json(state.db.post_detail(post).await?))
}

/// PUT /api/admin/posts/:id
///
/// Never changes status; use the publish/unpublish/archive actions.
pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<PostDetail>, AppError> {
    req.validate()?;
    let mut update = PostUpdate::from(req);

    if update.content.is_some() || update.focus_keyword.is_some() {
        let current = state.db.get_post(id).await?.ok_or_else(|| post_not_found(id))?;
        let content = update.content.as_deref().unwrap_or(&current.content);
        let keyword = update
            .focus_keyword
            .as_deref()
            .or(current.focus_keyword.as_deref());
        update.quality_score = Some(i32::from(score_content(content, keyword).overall));
    }

    let post = state.db.update_post(id, &update).await?;
    Ok(Json(state.db.post_detail(post).await?))
}

/// DELETE /api/admin/posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.db.delete_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_status(state: &AppState, id: Uuid, action: PostAction) -> Result<Json<Post>, AppError> {
    Ok(Json(state.db.change_post_status(id, action).await?))
}

/// POST /api/admin/posts/:id/publish
pub async fn publish_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Post>, AppError> {
    change_status(&state, id, PostAction::Publish).await
}

/// POST /api/admin/posts/:id/unpublish
pub async fn unpublish_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Post>, AppError> {
    change_status(&state, id, PostAction::Unpublish).await
}

/// POST /api/admin/posts/:id/archive
pub async fn archive_post(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Post>, AppError> {
    change_status(&state, id, PostAction::Archive).await
}

/// PUT /api/admin/posts/:id/categories
pub async fn set_post_categories(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetCategoriesRequest>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.db.set_post_categories(id, &req.category_ids).await?))
}

/// PUT /api/admin/posts/:id/tags
pub async fn set_post_tags(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetTagsRequest>,
) -> Result<Json<Vec<Tag>>, AppError> {
    req.validate()?;
    Ok(Json(state.db.set_post_tags(id, &req.tags).await?))
}
