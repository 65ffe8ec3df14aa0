use crate::services::metrics::get_metrics;
use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Liveness plus a database round trip.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "service": "content-service",
                "version": env!("CARGO_PKG_VERSION"),
                "ai_provider": state.text_provider.name(),
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": "content-service",
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Database, text provider and mailer checks. Any failure turns the
/// response into 503; a disabled mailer is reported but does not count.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let mut ready = true;

    let database = match state.db.health_check().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::error!(error = %e, "Database readiness check failed");
            ready = false;
            "down"
        }
    };

    let ai_provider = match state.text_provider.health_check().await {
        Ok(()) => "up",
        Err(e) => {
            tracing::error!(provider = state.text_provider.name(), error = %e, "Text provider readiness check failed");
            ready = false;
            "down"
        }
    };

    let mailer = if !state.mailer.is_enabled() {
        "disabled"
    } else {
        match state.mailer.health_check().await {
            Ok(()) => "up",
            Err(e) => {
                tracing::error!(error = %e, "Mailer readiness check failed");
                ready = false;
                "down"
            }
        }
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if ready { "ready" } else { "not_ready" },
            "checks": {
                "database": database,
                "ai_provider": ai_provider,
                "mailer": mailer,
            }
        })),
    )
}

pub async fn metrics() -> impl IntoResponse {
    get_metrics()
}
