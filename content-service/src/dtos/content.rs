//! Posts, categories and tags.

use super::{double_option, validate_slug, Pagination};
use crate::models::{CategoryUpdate, NewCategory, NewPost, PostFilter, PostStatus, PostUpdate};
use crate::utils::slugify;
use serde::Deserialize;
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

fn derive_slug(explicit: Option<String>, name: &str) -> Result<String, AppError> {
    let slug = explicit.unwrap_or_else(|| slugify(name));
    if slug.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Could not derive a slug from '{}'",
            name
        )));
    }
    Ok(slug)
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 200, message = "Title is required (max 200 characters)"))]
    pub title: String,
    #[validate(custom(function = "validate_slug"))]
    pub slug: Option<String>,
    #[validate(length(max = 500))]
    pub excerpt: Option<String>,
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    #[validate(url)]
    pub featured_image_url: Option<String>,
    #[validate(length(max = 70))]
    pub seo_title: Option<String>,
    #[validate(length(max = 170))]
    pub seo_description: Option<String>,
    #[validate(length(max = 100))]
    pub focus_keyword: Option<String>,
    #[validate(length(max = 100))]
    pub author_name: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreatePostRequest {
    /// Split into the row to insert and the taxonomy to attach.
    pub fn into_parts(self) -> Result<(NewPost, Vec<Uuid>, Vec<String>), AppError> {
        let slug = derive_slug(self.slug, &self.title)?;
        let post = NewPost {
            title: self.title.trim().to_string(),
            slug,
            excerpt: self.excerpt,
            content: self.content,
            featured_image_url: self.featured_image_url,
            seo_title: self.seo_title,
            seo_description: self.seo_description,
            focus_keyword: self.focus_keyword,
            author_name: self.author_name,
            quality_score: None,
        };
        Ok((post, self.category_ids, self.tags))
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(custom(function = "validate_slug"))]
    pub slug: Option<String>,
    #[validate(length(max = 500))]
    pub excerpt: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
    #[validate(url)]
    pub featured_image_url: Option<String>,
    #[validate(length(max = 70))]
    pub seo_title: Option<String>,
    #[validate(length(max = 170))]
    pub seo_description: Option<String>,
    #[validate(length(max = 100))]
    pub focus_keyword: Option<String>,
    #[validate(length(max = 100))]
    pub author_name: Option<String>,
}

impl From<UpdatePostRequest> for PostUpdate {
    fn from(req: UpdatePostRequest) -> Self {
        PostUpdate {
            title: req.title,
            slug: req.slug,
            excerpt: req.excerpt,
            content: req.content,
            featured_image_url: req.featured_image_url,
            seo_title: req.seo_title,
            seo_description: req.seo_description,
            focus_keyword: req.focus_keyword,
            author_name: req.author_name,
            quality_score: None,
        }
    }
}

/// Listing filters shared by the public and admin post endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PostListQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub status: Option<PostStatus>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

impl PostListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            page_size: self.page_size,
        }
    }

    pub fn filter(&self) -> PostFilter {
        PostFilter {
            status: self.status,
            category_slug: self.category.clone(),
            tag_slug: self.tag.clone(),
            search: self.search.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SetCategoriesRequest {
    pub category_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetTagsRequest {
    #[validate(length(max = 30, message = "At most 30 tags per post"))]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(custom(function = "validate_slug"))]
    pub slug: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub parent_id: Option<Uuid>,
    #[serde(default = "default_true")]
    pub is_visible: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub sort_order: i32,
}

fn default_true() -> bool {
    true
}

impl CreateCategoryRequest {
    pub fn into_new_category(self) -> Result<NewCategory, AppError> {
        Ok(NewCategory {
            slug: derive_slug(self.slug, &self.name)?,
            name: self.name.trim().to_string(),
            description: self.description,
            parent_id: self.parent_id,
            is_visible: self.is_visible,
            is_featured: self.is_featured,
            sort_order: self.sort_order,
        })
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(custom(function = "validate_slug"))]
    pub slug: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    /// `null` moves the category to the top level.
    #[serde(default, deserialize_with = "double_option")]
    pub parent_id: Option<Option<Uuid>>,
    pub is_visible: Option<bool>,
    pub is_featured: Option<bool>,
    pub sort_order: Option<i32>,
}

impl From<UpdateCategoryRequest> for CategoryUpdate {
    fn from(req: UpdateCategoryRequest) -> Self {
        CategoryUpdate {
            name: req.name,
            slug: req.slug,
            description: req.description,
            parent_id: req.parent_id,
            is_visible: req.is_visible,
            is_featured: req.is_featured,
            sort_order: req.sort_order,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReorderCategoriesRequest {
    #[validate(length(min = 1, message = "At least one category id is required"))]
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTagRequest {
    #[validate(length(min = 1, max = 60))]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_slug_defaults_to_title() {
        let req: CreatePostRequest = serde_json::from_str(
            r#"{"title": "Tax & Payroll: 2025 Update", "content": "Body"}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());
        let (post, categories, tags) = req.into_parts().unwrap();
        assert_eq!(post.slug, "tax-and-payroll-2025-update");
        assert!(categories.is_empty());
        assert!(tags.is_empty());
    }

    #[test]
    fn invalid_explicit_slug_fails_validation() {
        let req: CreatePostRequest = serde_json::from_str(
            r#"{"title": "Title", "slug": "Not A Slug", "content": "Body"}"#,
        )
        .unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn unsluggable_title_is_rejected() {
        let req: CreatePostRequest =
            serde_json::from_str(r#"{"title": "???", "content": "Body"}"#).unwrap();
        assert!(matches!(req.into_parts(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn category_defaults_to_visible() {
        let req: CreateCategoryRequest = serde_json::from_str(r#"{"name": "Tax Planning"}"#).unwrap();
        let category = req.into_new_category().unwrap();
        assert!(category.is_visible);
        assert!(!category.is_featured);
        assert_eq!(category.slug, "tax-planning");
    }

    #[test]
    fn category_update_can_clear_parent() {
        let req: UpdateCategoryRequest = serde_json::from_str(r#"{"parent_id": null}"#).unwrap();
        let update = CategoryUpdate::from(req);
        assert_eq!(update.parent_id, Some(None));
    }
}
