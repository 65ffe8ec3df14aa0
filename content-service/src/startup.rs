//! Application startup and lifecycle management.

use crate::config::{ContentConfig, SiteConfig};
use crate::handlers;
use crate::services::metrics::metrics_middleware;
use crate::services::providers::{build_text_provider, TextProvider};
use crate::services::{
    CampaignService, ContentGenerator, Database, EmailProvider, MockEmailProvider,
    MockSocialPublisher, NewsletterService, SmtpProvider, SocialPublisher, WebhookSocialPublisher,
};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    admin_auth::{admin_auth_middleware, AdminApiKey, ADMIN_API_KEY_HEADER},
    rate_limit::{create_rate_limiter, rate_limit_middleware, UnkeyedRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ContentConfig,
    pub db: Database,
    pub generator: ContentGenerator,
    pub campaigns: CampaignService,
    pub newsletters: NewsletterService,
    pub publisher: Arc<dyn SocialPublisher>,
    pub site: SiteConfig,
    pub text_provider: Arc<dyn TextProvider>,
    pub mailer: Arc<dyn EmailProvider>,
    pub admin_key: AdminApiKey,
    pub ai_limiter: UnkeyedRateLimiter,
}

impl AppState {
    /// Wire services together from already-built providers.
    pub fn new(
        config: ContentConfig,
        db: Database,
        text_provider: Arc<dyn TextProvider>,
        mailer: Arc<dyn EmailProvider>,
        publisher: Arc<dyn SocialPublisher>,
    ) -> Self {
        let site = config.site.clone();
        let generator = ContentGenerator::new(
            text_provider.clone(),
            site.clone(),
            config.ai.temperature,
            config.ai.max_tokens,
        );
        let newsletters = NewsletterService::new(db.clone(), mailer.clone(), site.clone());
        let campaigns = CampaignService::new(
            db.clone(),
            generator.clone(),
            newsletters.clone(),
            publisher.clone(),
        );

        Self {
            admin_key: AdminApiKey::new(config.security.admin_api_key.clone()),
            ai_limiter: create_rate_limiter(config.security.ai_requests_per_minute, 60),
            config,
            db,
            generator,
            campaigns,
            newsletters,
            publisher,
            site,
            text_provider,
            mailer,
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(ADMIN_API_KEY_HEADER),
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::health::metrics))
        .route("/api/posts", get(handlers::posts::list_published_posts))
        .route("/api/posts/:slug", get(handlers::posts::get_published_post))
        .route("/api/categories", get(handlers::categories::category_tree))
        .route(
            "/api/newsletter/subscribe",
            post(handlers::subscribers::subscribe),
        )
        .route(
            "/api/newsletter/unsubscribe",
            post(handlers::subscribers::unsubscribe),
        );

    let admin_routes = Router::new()
        .route(
            "/api/admin/posts",
            get(handlers::posts::list_posts).post(handlers::posts::create_post),
        )
        .route(
            "/api/admin/posts/:id",
            get(handlers::posts::get_post)
                .put(handlers::posts::update_post)
                .delete(handlers::posts::delete_post),
        )
        .route("/api/admin/posts/:id/publish", post(handlers::posts::publish_post))
        .route(
            "/api/admin/posts/:id/unpublish",
            post(handlers::posts::unpublish_post),
        )
        .route("/api/admin/posts/:id/archive", post(handlers::posts::archive_post))
        .route(
            "/api/admin/posts/:id/categories",
            put(handlers::posts::set_post_categories),
        )
        .route("/api/admin/posts/:id/tags", put(handlers::posts::set_post_tags))
        .route(
            "/api/admin/categories",
            get(handlers::categories::list_categories).post(handlers::categories::create_category),
        )
        .route(
            "/api/admin/categories/reorder",
            post(handlers::categories::reorder_categories),
        )
        .route(
            "/api/admin/categories/:id",
            put(handlers::categories::update_category).delete(handlers::categories::delete_category),
        )
        .route(
            "/api/admin/tags",
            get(handlers::tags::list_tags).post(handlers::tags::create_tag),
        )
        .route(
            "/api/admin/tags/:id",
            axum::routing::delete(handlers::tags::delete_tag),
        )
        .route(
            "/api/admin/campaigns",
            get(handlers::campaigns::list_campaigns).post(handlers::campaigns::create_campaign),
        )
        .route("/api/admin/campaigns/:id", get(handlers::campaigns::get_campaign))
        .route(
            "/api/admin/campaigns/:id/publish",
            post(handlers::campaigns::publish_campaign),
        )
        .route(
            "/api/admin/campaigns/:id/regenerate",
            post(handlers::campaigns::regenerate_campaign),
        )
        .route(
            "/api/admin/newsletters",
            get(handlers::newsletters::list_newsletters)
                .post(handlers::newsletters::create_newsletter),
        )
        .route(
            "/api/admin/newsletters/:id",
            get(handlers::newsletters::get_newsletter)
                .put(handlers::newsletters::update_newsletter),
        )
        .route(
            "/api/admin/newsletters/:id/send",
            post(handlers::newsletters::send_newsletter),
        )
        .route(
            "/api/admin/newsletters/:id/test",
            post(handlers::newsletters::send_test_newsletter),
        )
        .route("/api/admin/social-series", get(handlers::social::list_series))
        .route("/api/admin/social-series/:id", get(handlers::social::get_series))
        .route(
            "/api/admin/social-series/:id/publish",
            post(handlers::social::publish_series),
        )
        .route(
            "/api/admin/subscribers",
            get(handlers::subscribers::list_subscribers),
        )
        .route(
            "/api/admin/subscribers/:id/status",
            put(handlers::subscribers::set_subscriber_status),
        )
        .layer(from_fn_with_state(state.admin_key.clone(), admin_auth_middleware));

    // Layers run bottom-up: the key check happens before the limiter spends quota.
    let ai_routes = Router::new()
        .route("/api/ai/blog-post", post(handlers::ai::generate_blog_post))
        .route("/api/ai/newsletter", post(handlers::ai::generate_newsletter))
        .route(
            "/api/ai/social-series",
            post(handlers::ai::generate_social_series),
        )
        .route("/api/ai/seo", post(handlers::ai::generate_seo))
        .route("/api/ai/score", post(handlers::ai::score))
        .route("/api/ai/enhance", post(handlers::ai::enhance))
        .layer(from_fn_with_state(state.ai_limiter.clone(), rate_limit_middleware))
        .layer(from_fn_with_state(state.admin_key.clone(), admin_auth_middleware));

    let cors = cors_layer(&state.config.security.allowed_origins);

    public_routes
        .merge(admin_routes)
        .merge(ai_routes)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: ContentConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to PostgreSQL: {}", e);
            e
        })?;

        if config.database.run_migrations {
            db.run_migrations().await?;
        }

        let text_provider = build_text_provider(&config.ai).map_err(|e| {
            tracing::error!("Failed to initialize AI provider: {}", e);
            AppError::ConfigError(anyhow::anyhow!("AI provider: {}", e))
        })?;

        let mailer: Arc<dyn EmailProvider> = if config.smtp.enabled {
            match SmtpProvider::new(config.smtp.clone()) {
                Ok(provider) => {
                    tracing::info!("SMTP email provider initialized");
                    Arc::new(provider)
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP provider: {}. Using mock.", e);
                    Arc::new(MockEmailProvider::new(true))
                }
            }
        } else {
            tracing::info!("SMTP provider disabled, using mock email provider");
            Arc::new(MockEmailProvider::new(true))
        };

        let publisher: Arc<dyn SocialPublisher> = if config.social.enabled {
            tracing::info!("Webhook social publisher initialized");
            Arc::new(WebhookSocialPublisher::new(&config.social))
        } else {
            tracing::info!("Social publishing disabled, using mock publisher");
            Arc::new(MockSocialPublisher::new())
        };

        // port 0 = random port for testing
        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Content service listening on port {}", port);

        let state = AppState::new(config, db, text_provider, mailer, publisher);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Serve until `shutdown` resolves.
    pub async fn run_until_stopped<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = build_router(self.state);
        axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
