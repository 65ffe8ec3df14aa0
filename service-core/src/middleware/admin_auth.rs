use crate::error::AppError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use secrecy::{ExposeSecret, Secret};
use std::sync::Arc;
use subtle::ConstantTimeEq;

pub const ADMIN_API_KEY_HEADER: &str = "x-admin-api-key";

/// Shared secret guarding the admin and AI routes.
#[derive(Clone)]
pub struct AdminApiKey(Arc<Secret<String>>);

impl AdminApiKey {
    pub fn new(key: Secret<String>) -> Self {
        Self(Arc::new(key))
    }

    /// Constant-time comparison. An empty configured key never matches.
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.0.expose_secret().as_bytes();
        !expected.is_empty() && bool::from(expected.ct_eq(candidate.as_bytes()))
    }
}

pub async fn admin_auth_middleware(
    State(key): State<AdminApiKey>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = request
        .headers()
        .get(ADMIN_API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match provided {
        Some(candidate) if key.matches(candidate) => Ok(next.run(request).await),
        _ => {
            tracing::warn!(path = %request.uri().path(), "Failed admin authentication attempt");
            Err(AppError::Unauthorized(anyhow::anyhow!(
                "Invalid or missing admin API key"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_key_is_accepted() {
        let key = AdminApiKey::new(Secret::new("s3cret".to_string()));
        assert!(key.matches("s3cret"));
        assert!(!key.matches("s3cre"));
        assert!(!key.matches("s3cret!"));
    }

    #[test]
    fn empty_configured_key_rejects_everything() {
        let key = AdminApiKey::new(Secret::new(String::new()));
        assert!(!key.matches(""));
    }
}
