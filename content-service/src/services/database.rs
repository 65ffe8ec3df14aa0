//! Database service for content-service.

use crate::models::{
    would_create_cycle, Campaign, CampaignDetail, CampaignStatus, Category, CategoryUpdate,
    NewCampaign, NewCategory, NewNewsletter, NewPost, NewSocialSeries, Newsletter,
    NewsletterStatus, NewsletterUpdate, PdfGuide, Platform, Post, PostAction, PostDetail,
    PostFilter, PostUpdate, SeriesStatus, SocialSeries, Subscriber, SubscriberStatus, Tag,
    VideoScript,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::utils::{reading_time_minutes, slugify};
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const POST_COLUMNS: &str = "id, title, slug, excerpt, content, featured_image_url, seo_title, \
    seo_description, focus_keyword, status, author_name, reading_time_minutes, quality_score, \
    published_at, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "id, name, slug, description, parent_id, is_visible, is_featured, \
    sort_order, created_at, updated_at";

const CAMPAIGN_COLUMNS: &str = "id, topic, source_post_id, status, keywords, newsletter_id, \
    pdf_guide, video_script, error_message, created_at, updated_at";

const NEWSLETTER_COLUMNS: &str = "id, subject, preview_text, content_html, content_text, status, \
    recipient_count, sent_count, failed_count, sent_at, campaign_id, created_at, updated_at";

const SERIES_COLUMNS: &str = "id, platform, title, source_post_id, posts, status, created_at, updated_at";

const SUBSCRIBER_COLUMNS: &str = "id, email, name, status, subscribed_at, unsubscribed_at";

/// Shared WHERE clause for post listings: $1 status, $2 category slug,
/// $3 tag slug, $4 search text.
const POST_FILTER_SQL: &str = r#"
    WHERE ($1::text IS NULL OR p.status = $1)
      AND ($2::text IS NULL OR EXISTS (
            SELECT 1 FROM post_categories pc
            JOIN categories c ON c.id = pc.category_id
            WHERE pc.post_id = p.id AND c.slug = $2))
      AND ($3::text IS NULL OR EXISTS (
            SELECT 1 FROM post_tags pt
            JOIN tags t ON t.id = pt.tag_id
            WHERE pt.post_id = p.id AND t.slug = $3))
      AND ($4::text IS NULL
            OR p.title ILIKE '%' || $4 || '%'
            OR p.excerpt ILIKE '%' || $4 || '%')
"#;

fn not_found(what: &str, id: Uuid) -> AppError {
    AppError::NotFound(anyhow::anyhow!("{} {} not found", what, id))
}

/// Unique violations become a Conflict naming the offending value.
fn conflict_on_duplicate(e: sqlx::Error, what: &str, value: &str) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!("{} '{}' already exists", what, value))
        }
        other => AppError::from(other),
    }
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "content-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(max_connections, min_connections, "Connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool (tests use a lazily connecting one).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Posts
    // -------------------------------------------------------------------------

    /// Insert a draft together with its categories and tags. Nothing is
    /// written when any part fails.
    #[instrument(skip(self, input, category_ids, tags), fields(slug = %input.slug))]
    pub async fn create_post(
        &self,
        input: &NewPost,
        category_ids: &[Uuid],
        tags: &[String],
    ) -> Result<Post, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_post"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (id, title, slug, excerpt, content, featured_image_url, seo_title,
                               seo_description, focus_keyword, status, author_name,
                               reading_time_minutes, quality_score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'draft', $10, $11, $12)
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.title)
        .bind(&input.slug)
        .bind(&input.excerpt)
        .bind(&input.content)
        .bind(&input.featured_image_url)
        .bind(&input.seo_title)
        .bind(&input.seo_description)
        .bind(&input.focus_keyword)
        .bind(&input.author_name)
        .bind(reading_time_minutes(&input.content))
        .bind(input.quality_score)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_duplicate(e, "Post slug", &input.slug))?;

        if !category_ids.is_empty() {
            insert_post_categories(&mut tx, post.id, category_ids).await?;
        }
        if !tags.is_empty() {
            insert_post_tags(&mut tx, post.id, tags).await?;
        }

        tx.commit().await?;
        timer.observe_duration();

        info!(post_id = %post.id, slug = %post.slug, "Post created");

        Ok(post)
    }

    #[instrument(skip(self))]
    pub async fn get_post(&self, id: Uuid) -> Result<Option<Post>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_post"])
            .start_timer();

        let post = sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        timer.observe_duration();
        Ok(post)
    }

    /// Published post by slug, for the public site.
    #[instrument(skip(self))]
    pub async fn get_published_post_by_slug(&self, slug: &str) -> Result<Option<Post>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_published_post_by_slug"])
            .start_timer();

        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE slug = $1 AND status = 'published'"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(post)
    }

    /// Page of posts matching `filter`, newest first, with the total count.
    #[instrument(skip(self))]
    pub async fn list_posts(
        &self,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Post>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_posts"])
            .start_timer();

        let status = filter.status.map(|s| s.as_str());
        let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

        let posts = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts p {POST_FILTER_SQL} \
             ORDER BY COALESCE(p.published_at, p.created_at) DESC, p.id \
             LIMIT $5 OFFSET $6"
        ))
        .bind(status)
        .bind(&filter.category_slug)
        .bind(&filter.tag_slug)
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM posts p {POST_FILTER_SQL}"))
                .bind(status)
                .bind(&filter.category_slug)
                .bind(&filter.tag_slug)
                .bind(search)
                .fetch_one(&self.pool)
                .await?;

        timer.observe_duration();
        Ok((posts, total))
    }

    /// Apply a partial update. Status is never touched here.
    #[instrument(skip(self, update))]
    pub async fn update_post(&self, id: Uuid, update: &PostUpdate) -> Result<Post, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_post"])
            .start_timer();

        let reading_time = update.content.as_deref().map(reading_time_minutes);

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts SET
                title = COALESCE($2, title),
                slug = COALESCE($3, slug),
                excerpt = COALESCE($4, excerpt),
                content = COALESCE($5, content),
                featured_image_url = COALESCE($6, featured_image_url),
                seo_title = COALESCE($7, seo_title),
                seo_description = COALESCE($8, seo_description),
                focus_keyword = COALESCE($9, focus_keyword),
                author_name = COALESCE($10, author_name),
                quality_score = COALESCE($11, quality_score),
                reading_time_minutes = COALESCE($12, reading_time_minutes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.title)
        .bind(&update.slug)
        .bind(&update.excerpt)
        .bind(&update.content)
        .bind(&update.featured_image_url)
        .bind(&update.seo_title)
        .bind(&update.seo_description)
        .bind(&update.focus_keyword)
        .bind(&update.author_name)
        .bind(update.quality_score)
        .bind(reading_time)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, "Post slug", update.slug.as_deref().unwrap_or("")))?
        .ok_or_else(|| not_found("Post", id))?;

        timer.observe_duration();
        Ok(post)
    }

    #[instrument(skip(self))]
    pub async fn delete_post(&self, id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_post"])
            .start_timer();

        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(not_found("Post", id));
        }
        info!(post_id = %id, "Post deleted");
        Ok(())
    }

    /// Publish, unpublish or archive under a row lock so concurrent actions
    /// cannot break the status/published_at pairing.
    #[instrument(skip(self), fields(action = action.as_str()))]
    pub async fn change_post_status(&self, id: Uuid, action: PostAction) -> Result<Post, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["change_post_status"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| not_found("Post", id))?;

        let (status, published_at) = action.apply(current.status, current.published_at, Utc::now());

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts SET status = $2, published_at = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(published_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.observe_duration();

        info!(post_id = %id, from = %current.status, to = %post.status, "Post status changed");
        Ok(post)
    }

    #[instrument(skip(self))]
    pub async fn post_categories(&self, post_id: Uuid) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.name, c.slug, c.description, c.parent_id, c.is_visible, c.is_featured,
                   c.sort_order, c.created_at, c.updated_at
            FROM categories c
            JOIN post_categories pc ON pc.category_id = c.id
            WHERE pc.post_id = $1
            ORDER BY c.sort_order, c.name
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    #[instrument(skip(self))]
    pub async fn post_tags(&self, post_id: Uuid) -> Result<Vec<Tag>, AppError> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name, t.slug, t.created_at
            FROM tags t
            JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    pub async fn post_detail(&self, post: Post) -> Result<PostDetail, AppError> {
        let categories = self.post_categories(post.id).await?;
        let tags = self.post_tags(post.id).await?;
        Ok(PostDetail {
            post,
            categories,
            tags,
        })
    }

    /// Replace the post's category set.
    #[instrument(skip(self, category_ids))]
    pub async fn set_post_categories(
        &self,
        post_id: Uuid,
        category_ids: &[Uuid],
    ) -> Result<Vec<Category>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_post_categories"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(not_found("Post", post_id));
        }

        sqlx::query("DELETE FROM post_categories WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        insert_post_categories(&mut tx, post_id, category_ids).await?;

        tx.commit().await?;
        timer.observe_duration();

        self.post_categories(post_id).await
    }

    /// Replace the post's tags, creating unknown tags by slug.
    #[instrument(skip(self, names))]
    pub async fn set_post_tags(&self, post_id: Uuid, names: &[String]) -> Result<Vec<Tag>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_post_tags"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1)")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;
        if !exists {
            return Err(not_found("Post", post_id));
        }

        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        insert_post_tags(&mut tx, post_id, names).await?;

        tx.commit().await?;
        timer.observe_duration();

        self.post_tags(post_id).await
    }

    // -------------------------------------------------------------------------
    // Categories
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_categories"])
            .start_timer();

        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY sort_order, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(categories)
    }

    #[instrument(skip(self, input), fields(slug = %input.slug))]
    pub async fn create_category(&self, input: &NewCategory) -> Result<Category, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_category"])
            .start_timer();

        if let Some(parent) = input.parent_id {
            self.ensure_category_exists(parent).await?;
        }

        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO categories (id, name, slug, description, parent_id, is_visible, is_featured, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.description)
        .bind(input.parent_id)
        .bind(input.is_visible)
        .bind(input.is_featured)
        .bind(input.sort_order)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_duplicate(e, "Category slug", &input.slug))?;

        timer.observe_duration();

        info!(category_id = %category.id, slug = %category.slug, "Category created");
        Ok(category)
    }

    async fn ensure_category_exists(&self, id: Uuid) -> Result<(), AppError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if exists {
            Ok(())
        } else {
            Err(AppError::BadRequest(anyhow::anyhow!("Parent category {} does not exist", id)))
        }
    }

    /// Update a category; re-parenting is rejected when it would create a cycle.
    #[instrument(skip(self, update))]
    pub async fn update_category(
        &self,
        id: Uuid,
        update: &CategoryUpdate,
    ) -> Result<Category, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_category"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        // Lock the whole table's parent links while validating the new shape.
        let rows: Vec<(Uuid, Option<Uuid>)> =
            sqlx::query_as("SELECT id, parent_id FROM categories FOR UPDATE")
                .fetch_all(&mut *tx)
                .await?;
        let parents: HashMap<Uuid, Option<Uuid>> = rows.into_iter().collect();

        if !parents.contains_key(&id) {
            return Err(not_found("Category", id));
        }

        if let Some(new_parent) = update.parent_id {
            if let Some(parent) = new_parent {
                if !parents.contains_key(&parent) {
                    return Err(AppError::BadRequest(anyhow::anyhow!(
                        "Parent category {} does not exist",
                        parent
                    )));
                }
            }
            if would_create_cycle(&parents, id, new_parent) {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Category cannot be moved under itself or one of its descendants"
                )));
            }
        }

        let category = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories SET
                name = COALESCE($2, name),
                slug = COALESCE($3, slug),
                description = COALESCE($4, description),
                parent_id = CASE WHEN $5::bool THEN $6::uuid ELSE parent_id END,
                is_visible = COALESCE($7, is_visible),
                is_featured = COALESCE($8, is_featured),
                sort_order = COALESCE($9, sort_order),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.slug)
        .bind(&update.description)
        .bind(update.parent_id.is_some())
        .bind(update.parent_id.flatten())
        .bind(update.is_visible)
        .bind(update.is_featured)
        .bind(update.sort_order)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_duplicate(e, "Category slug", update.slug.as_deref().unwrap_or("")))?;

        tx.commit().await?;
        timer.observe_duration();
        Ok(category)
    }

    /// Delete a category, moving its children up to its parent.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: Uuid) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_category"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let parent: Option<Uuid> =
            sqlx::query_scalar("SELECT parent_id FROM categories WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| not_found("Category", id))?;

        let moved = sqlx::query(
            "UPDATE categories SET parent_id = $2, updated_at = NOW() WHERE parent_id = $1",
        )
        .bind(id)
        .bind(parent)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        // post_categories rows go with the category via ON DELETE CASCADE
        sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        timer.observe_duration();

        info!(category_id = %id, children_moved = moved, "Category deleted");
        Ok(())
    }

    /// Set `sort_order` from the position of each id in `ordered_ids`.
    #[instrument(skip(self, ordered_ids), fields(count = ordered_ids.len()))]
    pub async fn reorder_categories(&self, ordered_ids: &[Uuid]) -> Result<Vec<Category>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["reorder_categories"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        for (position, id) in ordered_ids.iter().enumerate() {
            let updated = sqlx::query(
                "UPDATE categories SET sort_order = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if updated == 0 {
                return Err(not_found("Category", *id));
            }
        }

        tx.commit().await?;
        timer.observe_duration();

        self.list_categories().await
    }

    // -------------------------------------------------------------------------
    // Tags
    // -------------------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn list_tags(&self) -> Result<Vec<Tag>, AppError> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name, slug, created_at FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    /// Find or create a tag by the slug of `name`.
    #[instrument(skip(self))]
    pub async fn create_tag(&self, name: &str) -> Result<Tag, AppError> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("Tag name has no usable characters")));
        }
        let mut tx = self.pool.begin().await?;
        let tag = upsert_tag(&mut tx, name.trim(), &slug).await?;
        tx.commit().await?;
        Ok(tag)
    }

    #[instrument(skip(self))]
    pub async fn delete_tag(&self, id: Uuid) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("Tag", id));
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Campaigns
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(topic = %input.topic))]
    pub async fn create_campaign(&self, input: &NewCampaign) -> Result<Campaign, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_campaign"])
            .start_timer();

        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            INSERT INTO campaigns (id, topic, source_post_id, status, keywords)
            VALUES ($1, $2, $3, 'draft', $4)
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.topic)
        .bind(input.source_post_id)
        .bind(&input.keywords)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();
        info!(campaign_id = %campaign.id, "Campaign created");
        Ok(campaign)
    }

    #[instrument(skip(self))]
    pub async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>, AppError> {
        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(campaign)
    }

    #[instrument(skip(self))]
    pub async fn list_campaigns(&self, limit: i64, offset: i64) -> Result<(Vec<Campaign>, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_campaigns"])
            .start_timer();

        let campaigns = sqlx::query_as::<_, Campaign>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY created_at DESC LIMIT $1 OFFSET $2"
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM campaigns")
            .fetch_one(&self.pool)
            .await?;

        timer.observe_duration();
        Ok((campaigns, total))
    }

    /// Move a campaign to `next`, enforcing the lifecycle under a row lock.
    #[instrument(skip(self, error_message))]
    pub async fn transition_campaign(
        &self,
        id: Uuid,
        next: CampaignStatus,
        error_message: Option<&str>,
    ) -> Result<Campaign, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["transition_campaign"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        let status: String =
            sqlx::query_scalar("SELECT status FROM campaigns WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| not_found("Campaign", id))?;
        let current: CampaignStatus = status
            .parse()
            .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

        if !current.can_transition_to(next) {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Campaign cannot move from {} to {}",
                current,
                next
            )));
        }

        let campaign = sqlx::query_as::<_, Campaign>(&format!(
            r#"
            UPDATE campaigns SET status = $2, error_message = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(next.as_str())
        .bind(error_message)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.observe_duration();

        info!(campaign_id = %id, from = %current, to = %next, "Campaign status changed");
        Ok(campaign)
    }

    /// Attach generated artifacts, replacing any earlier links.
    #[instrument(skip(self, series_ids, guide, script))]
    pub async fn link_campaign_artifacts(
        &self,
        id: Uuid,
        newsletter_id: Uuid,
        series_ids: &[Uuid],
        guide: &PdfGuide,
        script: &VideoScript,
    ) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["link_campaign_artifacts"])
            .start_timer();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE campaigns SET newsletter_id = $2, pdf_guide = $3, video_script = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(newsletter_id)
        .bind(Json(guide))
        .bind(Json(script))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM campaign_social_series WHERE campaign_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO campaign_social_series (campaign_id, series_id) \
             SELECT $1, unnest($2::uuid[])",
        )
        .bind(id)
        .bind(series_ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn campaign_detail(&self, id: Uuid) -> Result<CampaignDetail, AppError> {
        let campaign = self
            .get_campaign(id)
            .await?
            .ok_or_else(|| not_found("Campaign", id))?;

        let newsletter = match campaign.newsletter_id {
            Some(newsletter_id) => self.get_newsletter(newsletter_id).await?,
            None => None,
        };

        let social_series = sqlx::query_as::<_, SocialSeries>(
            r#"
            SELECT s.id, s.platform, s.title, s.source_post_id, s.posts, s.status, s.created_at, s.updated_at
            FROM social_series s
            JOIN campaign_social_series cs ON cs.series_id = s.id
            WHERE cs.campaign_id = $1
            ORDER BY s.created_at
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(CampaignDetail {
            campaign,
            newsletter,
            social_series,
        })
    }

    // -------------------------------------------------------------------------
    // Newsletters
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(subject = %input.subject))]
    pub async fn create_newsletter(&self, input: &NewNewsletter) -> Result<Newsletter, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_newsletter"])
            .start_timer();

        let newsletter = sqlx::query_as::<_, Newsletter>(&format!(
            r#"
            INSERT INTO newsletters (id, subject, preview_text, content_html, content_text, status, campaign_id)
            VALUES ($1, $2, $3, $4, $5, 'draft', $6)
            RETURNING {NEWSLETTER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&input.subject)
        .bind(&input.preview_text)
        .bind(&input.content_html)
        .bind(&input.content_text)
        .bind(input.campaign_id)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(newsletter)
    }

    #[instrument(skip(self))]
    pub async fn get_newsletter(&self, id: Uuid) -> Result<Option<Newsletter>, AppError> {
        let newsletter = sqlx::query_as::<_, Newsletter>(&format!(
            "SELECT {NEWSLETTER_COLUMNS} FROM newsletters WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(newsletter)
    }

    #[instrument(skip(self))]
    pub async fn list_newsletters(
        &self,
        status: Option<NewsletterStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Newsletter>, i64), AppError> {
        let status = status.map(|s| s.as_str());

        let newsletters = sqlx::query_as::<_, Newsletter>(&format!(
            "SELECT {NEWSLETTER_COLUMNS} FROM newsletters \
             WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM newsletters WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok((newsletters, total))
    }

    /// Edit content; only draft or failed newsletters are editable.
    #[instrument(skip(self, update))]
    pub async fn update_newsletter(
        &self,
        id: Uuid,
        update: &NewsletterUpdate,
    ) -> Result<Newsletter, AppError> {
        let mut tx = self.pool.begin().await?;

        let status: String =
            sqlx::query_scalar("SELECT status FROM newsletters WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| not_found("Newsletter", id))?;
        let status: NewsletterStatus = status
            .parse()
            .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

        if !status.is_editable() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Newsletter is {} and can no longer be edited",
                status
            )));
        }

        let newsletter = sqlx::query_as::<_, Newsletter>(&format!(
            r#"
            UPDATE newsletters SET
                subject = COALESCE($2, subject),
                preview_text = COALESCE($3, preview_text),
                content_html = COALESCE($4, content_html),
                content_text = COALESCE($5, content_text),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {NEWSLETTER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&update.subject)
        .bind(&update.preview_text)
        .bind(&update.content_html)
        .bind(&update.content_text)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(newsletter)
    }

    /// Atomically move a sendable newsletter to `sending`.
    #[instrument(skip(self))]
    pub async fn claim_newsletter_for_sending(&self, id: Uuid) -> Result<Newsletter, AppError> {
        let mut tx = self.pool.begin().await?;

        let status: String =
            sqlx::query_scalar("SELECT status FROM newsletters WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| not_found("Newsletter", id))?;
        let status: NewsletterStatus = status
            .parse()
            .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

        if !status.can_send() {
            return Err(AppError::Conflict(anyhow::anyhow!(
                "Newsletter is {} and cannot be sent",
                status
            )));
        }

        let newsletter = sqlx::query_as::<_, Newsletter>(&format!(
            r#"
            UPDATE newsletters SET status = 'sending', updated_at = NOW()
            WHERE id = $1
            RETURNING {NEWSLETTER_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(newsletter)
    }

    #[instrument(skip(self))]
    pub async fn finish_newsletter_delivery(
        &self,
        id: Uuid,
        status: NewsletterStatus,
        recipient_count: i32,
        sent_count: i32,
        failed_count: i32,
        sent_at: Option<DateTime<Utc>>,
    ) -> Result<Newsletter, AppError> {
        let newsletter = sqlx::query_as::<_, Newsletter>(&format!(
            r#"
            UPDATE newsletters SET status = $2, recipient_count = $3, sent_count = $4,
                failed_count = $5, sent_at = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {NEWSLETTER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(recipient_count)
        .bind(sent_count)
        .bind(failed_count)
        .bind(sent_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("Newsletter", id))?;
        Ok(newsletter)
    }

    // -------------------------------------------------------------------------
    // Social series
    // -------------------------------------------------------------------------

    #[instrument(skip(self, input), fields(platform = %input.platform))]
    pub async fn create_social_series(&self, input: &NewSocialSeries) -> Result<SocialSeries, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_social_series"])
            .start_timer();

        let series = sqlx::query_as::<_, SocialSeries>(&format!(
            r#"
            INSERT INTO social_series (id, platform, title, source_post_id, posts, status)
            VALUES ($1, $2, $3, $4, $5, 'draft')
            RETURNING {SERIES_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(input.platform.as_str())
        .bind(&input.title)
        .bind(input.source_post_id)
        .bind(Json(&input.posts))
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(series)
    }

    #[instrument(skip(self))]
    pub async fn get_social_series(&self, id: Uuid) -> Result<Option<SocialSeries>, AppError> {
        let series = sqlx::query_as::<_, SocialSeries>(&format!(
            "SELECT {SERIES_COLUMNS} FROM social_series WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(series)
    }

    #[instrument(skip(self))]
    pub async fn list_social_series(
        &self,
        platform: Option<Platform>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<SocialSeries>, i64), AppError> {
        let platform = platform.map(|p| p.as_str());

        let series = sqlx::query_as::<_, SocialSeries>(&format!(
            "SELECT {SERIES_COLUMNS} FROM social_series \
             WHERE ($1::text IS NULL OR platform = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(platform)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM social_series WHERE ($1::text IS NULL OR platform = $1)",
        )
        .bind(platform)
        .fetch_one(&self.pool)
        .await?;

        Ok((series, total))
    }

    #[instrument(skip(self))]
    pub async fn set_series_status(&self, id: Uuid, status: SeriesStatus) -> Result<SocialSeries, AppError> {
        let series = sqlx::query_as::<_, SocialSeries>(&format!(
            "UPDATE social_series SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {SERIES_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("Social series", id))?;
        Ok(series)
    }

    // -------------------------------------------------------------------------
    // Subscribers
    // -------------------------------------------------------------------------

    /// Subscribe an address. Unsubscribed addresses are re-activated;
    /// active and bounced ones are left as they are.
    #[instrument(skip(self, email, name))]
    pub async fn subscribe(&self, email: &str, name: Option<&str>) -> Result<Subscriber, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["subscribe"])
            .start_timer();

        let subscriber = sqlx::query_as::<_, Subscriber>(&format!(
            r#"
            INSERT INTO newsletter_subscribers (id, email, name, status)
            VALUES ($1, $2, $3, 'active')
            ON CONFLICT (email) DO UPDATE SET
                name = COALESCE(EXCLUDED.name, newsletter_subscribers.name),
                status = CASE WHEN newsletter_subscribers.status = 'unsubscribed'
                              THEN 'active' ELSE newsletter_subscribers.status END,
                subscribed_at = CASE WHEN newsletter_subscribers.status = 'unsubscribed'
                                     THEN NOW() ELSE newsletter_subscribers.subscribed_at END,
                unsubscribed_at = CASE WHEN newsletter_subscribers.status = 'unsubscribed'
                                       THEN NULL ELSE newsletter_subscribers.unsubscribed_at END
            RETURNING {SUBSCRIBER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        timer.observe_duration();

        if subscriber.status == SubscriberStatus::Bounced {
            warn!(subscriber_id = %subscriber.id, "Subscribe request for a bounced address");
        }
        Ok(subscriber)
    }

    /// Mark an address unsubscribed. Unknown addresses return `None`.
    #[instrument(skip(self, email))]
    pub async fn unsubscribe(&self, email: &str) -> Result<Option<Subscriber>, AppError> {
        let subscriber = sqlx::query_as::<_, Subscriber>(&format!(
            r#"
            UPDATE newsletter_subscribers
            SET status = 'unsubscribed', unsubscribed_at = COALESCE(unsubscribed_at, NOW())
            WHERE email = $1 AND status <> 'bounced'
            RETURNING {SUBSCRIBER_COLUMNS}
            "#
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(subscriber)
    }

    #[instrument(skip(self))]
    pub async fn list_subscribers(
        &self,
        status: Option<SubscriberStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<Subscriber>, i64), AppError> {
        let status = status.map(|s| s.as_str());

        let subscribers = sqlx::query_as::<_, Subscriber>(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM newsletter_subscribers \
             WHERE ($1::text IS NULL OR status = $1) \
             ORDER BY subscribed_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM newsletter_subscribers WHERE ($1::text IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        Ok((subscribers, total))
    }

    #[instrument(skip(self))]
    pub async fn active_subscribers(&self) -> Result<Vec<Subscriber>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["active_subscribers"])
            .start_timer();

        let subscribers = sqlx::query_as::<_, Subscriber>(&format!(
            "SELECT {SUBSCRIBER_COLUMNS} FROM newsletter_subscribers WHERE status = 'active' ORDER BY email"
        ))
        .fetch_all(&self.pool)
        .await?;

        timer.observe_duration();
        Ok(subscribers)
    }

    /// Admin override of a subscriber's status.
    #[instrument(skip(self))]
    pub async fn set_subscriber_status(
        &self,
        id: Uuid,
        status: SubscriberStatus,
    ) -> Result<Subscriber, AppError> {
        let subscriber = sqlx::query_as::<_, Subscriber>(&format!(
            r#"
            UPDATE newsletter_subscribers SET
                status = $2,
                unsubscribed_at = CASE WHEN $2::text = 'unsubscribed' THEN COALESCE(unsubscribed_at, NOW())
                                       ELSE NULL END
            WHERE id = $1
            RETURNING {SUBSCRIBER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("Subscriber", id))?;
        Ok(subscriber)
    }
}

async fn upsert_tag(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    name: &str,
    slug: &str,
) -> Result<Tag, AppError> {
    let tag = sqlx::query_as::<_, Tag>(
        r#"
        INSERT INTO tags (id, name, slug)
        VALUES ($1, $2, $3)
        ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
        RETURNING id, name, slug, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(slug)
    .fetch_one(&mut **tx)
    .await?;
    Ok(tag)
}

async fn insert_post_categories(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    post_id: Uuid,
    category_ids: &[Uuid],
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO post_categories (post_id, category_id) \
         SELECT $1, unnest($2::uuid[]) ON CONFLICT DO NOTHING",
    )
    .bind(post_id)
    .bind(category_ids)
    .execute(&mut **tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            AppError::BadRequest(anyhow::anyhow!("Unknown category id in request"))
        }
        other => AppError::from(other),
    })?;
    Ok(())
}

/// Link tags by name, creating unknown ones by slug.
async fn insert_post_tags(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    post_id: Uuid,
    names: &[String],
) -> Result<(), AppError> {
    for name in names.iter().map(|n| n.trim()).filter(|n| !n.is_empty()) {
        let slug = slugify(name);
        if slug.is_empty() {
            continue;
        }
        let tag = upsert_tag(tx, name, &slug).await?;
        sqlx::query("INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(post_id)
            .bind(tag.id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}
