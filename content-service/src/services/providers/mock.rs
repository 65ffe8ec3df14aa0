//! Mock provider for development and tests.
//!
//! Responses are scripted from the `Task:` line of the prompt so the
//! generator's parsing runs against realistic JSON without network access.

use super::{FinishReason, GenerationParams, ProviderError, ProviderResponse, TextProvider};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Mock text provider.
pub struct MockTextProvider {
    enabled: bool,
    fail_on: Option<String>,
    calls: AtomicUsize,
}

impl MockTextProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            fail_on: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Fail any request whose prompt contains `needle`.
    pub fn failing_on(needle: impl Into<String>) -> Self {
        Self {
            fail_on: Some(needle.into()),
            ..Self::new(true)
        }
    }

    /// Number of `generate` calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn line_value<'a>(prompt: &'a str, key: &str) -> Option<&'a str> {
    prompt
        .lines()
        .find_map(|line| line.trim().strip_prefix(key))
        .map(str::trim)
}

fn scripted(prompt: &str) -> Value {
    let topic = line_value(prompt, "Topic:").unwrap_or("Year-end tax planning");
    let task = line_value(prompt, "Task:").unwrap_or("text");

    match task {
        "blog_post" => json!({
            "title": format!("{}: A Practical Guide for Business Owners", topic),
            "excerpt": format!("What {} means for your business and the steps to take before year end.", topic.to_lowercase()),
            "content": format!(
                "## Why {topic} matters\n\nMost owners leave money on the table. A review now can cut your bill by 15%.\n\n\
                 ## What to review\n\n- Estimated payments\n- Retirement contributions\n- Equipment purchases\n\n\
                 ## Common mistakes\n\nWaiting until April is the most expensive one. Are your records ready?\n\n\
                 ## Next steps\n\nSchedule a consultation and we will walk through your numbers with you."
            ),
            "seo_title": format!("{} Guide", topic),
            "seo_description": format!("A plain-English guide to {} for small business owners.", topic.to_lowercase()),
        }),
        "newsletter" => json!({
            "subject": format!("This month: {}", topic),
            "preview_text": "Three things to do before the quarter closes",
            "intro": format!("Here is what you need to know about {}.", topic.to_lowercase()),
            "sections": [
                {"heading": "The short version", "body": "Review your estimates and keep receipts organised."},
                {"heading": "Deadlines", "body": "Quarterly payments are due on the 15th."}
            ],
            "closing": "Reply to this email if you have questions.",
        }),
        "social_series" => {
            let platform = line_value(prompt, "Platform:").unwrap_or("linkedin");
            let count: u32 = line_value(prompt, "Posts:")
                .and_then(|n| n.parse().ok())
                .unwrap_or(5);
            let posts: Vec<Value> = (1..=count)
                .map(|i| {
                    json!({
                        "content": format!("{} tip {} of {}: keep your books current every month.", topic, i, count),
                        "hashtags": ["SmallBusiness", "Tax"],
                        "slide_title": format!("Tip {}", i),
                        "image_prompt": "Clean flat illustration of a ledger and calculator",
                    })
                })
                .collect();
            json!({
                "title": format!("{} on {}", topic, platform),
                "posts": posts,
            })
        }
        "pdf_guide" => json!({
            "title": format!("The {} Checklist", topic),
            "introduction": "Use this guide to prepare before meeting your accountant.",
            "sections": [
                {"heading": "Gather documents", "body": "Collect statements and receipts.", "checklist": ["Bank statements", "Payroll reports"]},
                {"heading": "Review deductions", "body": "Confirm what you can claim.", "checklist": ["Home office", "Mileage log"]}
            ],
        }),
        "video_script" => json!({
            "title": format!("{} in 60 seconds", topic),
            "hook": "Are you overpaying in tax?",
            "scenes": [
                {"visual": "Owner at desk with receipts", "narration": "Most small businesses miss easy deductions.", "duration_seconds": 20},
                {"visual": "Checklist on screen", "narration": "Here are three to check today.", "duration_seconds": 25},
                {"visual": "Accountant smiling", "narration": "We can help you find the rest.", "duration_seconds": 15}
            ],
            "call_to_action": "Book a free consultation today.",
        }),
        "seo_metadata" => json!({
            "seo_title": format!("{} | Practical Advice", topic),
            "seo_description": format!("Learn how {} affects your business and what to do next.", topic.to_lowercase()),
        }),
        _ => json!({ "text": format!("Mock response for: {}", topic) }),
    }
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.enabled {
            return Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            ));
        }

        if let Some(needle) = &self.fail_on {
            if prompt.contains(needle.as_str()) {
                return Err(ProviderError::ApiError(format!(
                    "Mock failure for prompt containing '{}'",
                    needle
                )));
            }
        }

        let text = scripted(prompt).to_string();

        Ok(ProviderResponse {
            output_tokens: text.len() as i32 / 4,
            text: format!("```json\n{}\n```", text),
            input_tokens: prompt.len() as i32 / 4,
            finish_reason: FinishReason::Complete,
        })
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.enabled {
            Ok(())
        } else {
            Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            ))
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_series_honours_post_count() {
        let provider = MockTextProvider::new(true);
        let response = provider
            .generate(
                "Task: social_series\nPlatform: twitter\nPosts: 7\nTopic: Payroll",
                &GenerationParams::default(),
            )
            .await
            .unwrap();

        let body = response
            .text
            .trim_start_matches("```json\n")
            .trim_end_matches("\n```");
        let value: Value = serde_json::from_str(body).unwrap();
        assert_eq!(value["posts"].as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn disabled_provider_is_not_configured() {
        let provider = MockTextProvider::new(false);
        let err = provider
            .generate("Task: blog_post", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert!(provider.health_check().await.is_err());
    }

    #[tokio::test]
    async fn failing_needle_fails_only_matching_prompts() {
        let provider = MockTextProvider::failing_on("Task: video_script");
        let params = GenerationParams::default();
        assert!(provider.generate("Task: pdf_guide", &params).await.is_ok());
        assert!(provider.generate("Task: video_script", &params).await.is_err());
        assert_eq!(provider.call_count(), 2);
    }
}
