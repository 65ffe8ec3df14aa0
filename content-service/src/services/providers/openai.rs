//! OpenAI-compatible chat completions provider.
//!
//! Works against api.openai.com or any gateway exposing the same
//! `/chat/completions` contract (set `AI_BASE_URL`).

use super::{
    http_client, status_error, FinishReason, GenerationParams, ProviderError, ProviderResponse,
    TextProvider,
};
use crate::config::AiConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

pub struct OpenAiTextProvider {
    api_key: Secret<String>,
    model: String,
    base_url: String,
    client: Client,
}

impl OpenAiTextProvider {
    pub fn new(config: &AiConfig) -> Result<Self, ProviderError> {
        if config.api_key.expose_secret().is_empty() {
            return Err(ProviderError::NotConfigured(
                "AI_API_KEY is required for the OpenAI provider".to_string(),
            ));
        }

        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| OPENAI_API_BASE.to_string()),
            client: http_client(config.timeout_secs)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn build_request(&self, prompt: &str, params: &GenerationParams) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &params.system_prompt {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            response_format: params.json_output.then(|| ResponseFormat {
                kind: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl TextProvider for OpenAiTextProvider {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        let request = self.build_request(prompt, params);

        tracing::debug!(
            model = %self.model,
            prompt_len = prompt.len(),
            json_output = params.json_output,
            "Sending request to chat completions API"
        );

        let response = self
            .client
            .traced_post(&self.url("chat/completions"))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send(None)
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(status_error("OpenAI", status, &error_text));
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Failed to parse response: {}", e)))?;

        parse_response(api_response)
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let response = self
            .client
            .traced_get(&self.url("models"))
            .bearer_auth(self.api_key.expose_secret())
            .send(None)
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

fn parse_response(api_response: ChatResponse) -> Result<ProviderResponse, ProviderError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?;

    let finish_reason = match choice.finish_reason.as_deref() {
        Some("content_filter") => return Err(ProviderError::ContentFiltered),
        Some("length") => FinishReason::Length,
        _ => FinishReason::Complete,
    };

    let text = choice.message.content.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    let usage = api_response.usage.unwrap_or_default();

    Ok(ProviderResponse {
        text,
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
        finish_reason,
    })
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: i32,
    #[serde(default)]
    completion_tokens: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_first_choice() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"a\":1}"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 40, "completion_tokens": 8}
        }))
        .unwrap();

        let parsed = parse_response(response).unwrap();
        assert_eq!(parsed.text, "{\"a\":1}");
        assert_eq!(parsed.input_tokens, 40);
        assert_eq!(parsed.finish_reason, FinishReason::Complete);
    }

    #[test]
    fn truncated_output_reports_length() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": "partial"}, "finish_reason": "length"}]
        }))
        .unwrap();
        assert_eq!(parse_response(response).unwrap().finish_reason, FinishReason::Length);
    }

    #[test]
    fn filtered_output_is_an_error() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"content": null}, "finish_reason": "content_filter"}]
        }))
        .unwrap();
        assert!(matches!(parse_response(response), Err(ProviderError::ContentFiltered)));
    }
}
