//! AI provider abstractions and implementations.
//!
//! Generation code talks to a [`TextProvider`] so the backend (Gemini, an
//! OpenAI-compatible gateway, or the scripted mock) can be swapped by
//! configuration.

pub mod gemini;
pub mod mock;
pub mod openai;

use crate::config::{AiConfig, AiProviderKind};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use gemini::GeminiTextProvider;
pub use mock::MockTextProvider;
pub use openai::OpenAiTextProvider;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,
}

/// Result of a provider call.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub text: String,

    /// Input tokens consumed.
    pub input_tokens: i32,

    /// Output tokens generated.
    pub output_tokens: i32,

    pub finish_reason: FinishReason,
}

/// Reason why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Complete,
    Length,
}

/// Generation parameters for AI requests.
#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    /// Temperature (0.0 - 2.0).
    pub temperature: Option<f32>,

    /// Maximum output tokens.
    pub max_tokens: Option<i32>,

    /// Instructions sent ahead of the user prompt.
    pub system_prompt: Option<String>,

    /// Ask the backend for a JSON response body.
    pub json_output: bool,
}

/// Trait for text/JSON generation providers.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Generate a single, complete response.
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Build the provider selected by configuration.
pub fn build_text_provider(config: &AiConfig) -> Result<Arc<dyn TextProvider>, ProviderError> {
    let provider: Arc<dyn TextProvider> = match config.provider {
        AiProviderKind::Gemini => Arc::new(GeminiTextProvider::new(config)?),
        AiProviderKind::OpenAi => Arc::new(OpenAiTextProvider::new(config)?),
        AiProviderKind::Mock => Arc::new(MockTextProvider::new(true)),
    };

    tracing::info!(provider = provider.name(), model = %config.model, "AI provider initialized");
    Ok(provider)
}

/// Map an HTTP error status from a provider to a [`ProviderError`].
pub(crate) fn status_error(backend: &str, status: reqwest::StatusCode, body: &str) -> ProviderError {
    match status.as_u16() {
        429 => ProviderError::RateLimited,
        400 | 404 | 422 => {
            ProviderError::InvalidRequest(format!("{} rejected request ({}): {}", backend, status, body))
        }
        _ => ProviderError::ApiError(format!("{} API error {}: {}", backend, status, body)),
    }
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))
}
