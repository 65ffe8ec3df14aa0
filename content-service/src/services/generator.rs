//! Prompt construction and response parsing for every generated artifact.

use crate::config::SiteConfig;
use crate::models::{PdfGuide, Platform, SocialPost, VideoScript};
use crate::services::metrics::{AI_GENERATIONS_TOTAL, AI_GENERATION_DURATION, AI_TOKENS_TOTAL};
use crate::services::providers::{FinishReason, GenerationParams, ProviderError, TextProvider};
use crate::utils::{escape_html, slugify, truncate_on_word};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

/// Placeholder replaced per recipient when a newsletter is sent.
pub const UNSUBSCRIBE_PLACEHOLDER: &str = "{{unsubscribe_url}}";

pub const SEO_TITLE_MAX: usize = 60;
pub const SEO_DESCRIPTION_MAX: usize = 160;

/// Source text is capped before it goes into a prompt.
const MAX_SOURCE_CHARS: usize = 12_000;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Malformed model output: {0}")]
    Malformed(String),
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Provider(ProviderError::RateLimited) => {
                AppError::TooManyRequests("AI provider rate limit reached".to_string(), None)
            }
            GenerationError::Provider(ProviderError::NotConfigured(msg)) => {
                tracing::error!(reason = %msg, "AI provider not configured");
                AppError::ServiceUnavailable
            }
            other => AppError::BadGateway(other.to_string()),
        }
    }
}

/// The article a campaign or artifact is derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceContent {
    pub post_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedPost {
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub excerpt: String,
    pub content: String,
    #[serde(default)]
    pub seo_title: String,
    #[serde(default)]
    pub seo_description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedNewsletter {
    pub subject: String,
    pub preview_text: String,
    pub content_html: String,
    pub content_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedSeries {
    pub platform: Platform,
    pub title: String,
    pub posts: Vec<SocialPost>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeoMetadata {
    pub seo_title: String,
    pub seo_description: String,
}

#[derive(Debug, Deserialize)]
struct RawNewsletter {
    subject: String,
    #[serde(default)]
    preview_text: String,
    #[serde(default)]
    intro: String,
    #[serde(default)]
    sections: Vec<RawSection>,
    #[serde(default)]
    closing: String,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    heading: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct RawSeries {
    #[serde(default)]
    title: String,
    posts: Vec<RawSocialPost>,
}

#[derive(Debug, Deserialize)]
struct RawSocialPost {
    content: String,
    #[serde(default)]
    hashtags: Vec<String>,
    #[serde(default)]
    slide_title: Option<String>,
    #[serde(default)]
    image_prompt: Option<String>,
}

/// Wraps a [`TextProvider`] with prompts and parsing for each artifact.
#[derive(Clone)]
pub struct ContentGenerator {
    provider: Arc<dyn TextProvider>,
    site: SiteConfig,
    temperature: f32,
    max_tokens: i32,
}

impl ContentGenerator {
    pub fn new(
        provider: Arc<dyn TextProvider>,
        site: SiteConfig,
        temperature: f32,
        max_tokens: i32,
    ) -> Self {
        Self {
            provider,
            site,
            temperature,
            max_tokens,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You write marketing content for {}, an accounting firm serving small and \
             mid-sized businesses. Write in plain English for business owners, avoid jargon, \
             never promise specific tax outcomes, and respond with a single JSON object only.",
            self.site.firm_name
        )
    }

    /// Call the provider and deserialize the JSON object in its reply.
    async fn complete_json<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        prompt: String,
    ) -> Result<T, GenerationError> {
        let params = GenerationParams {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
            system_prompt: Some(self.system_prompt()),
            json_output: true,
        };

        let start = Instant::now();
        let result = self.provider.generate(&prompt, &params).await;
        AI_GENERATION_DURATION
            .with_label_values(&[kind])
            .observe(start.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                AI_GENERATIONS_TOTAL.with_label_values(&[kind, "error"]).inc();
                tracing::error!(kind, provider = self.provider.name(), error = %e, "AI generation failed");
                return Err(e.into());
            }
        };

        AI_TOKENS_TOTAL
            .with_label_values(&["input"])
            .inc_by(response.input_tokens.max(0) as f64);
        AI_TOKENS_TOTAL
            .with_label_values(&["output"])
            .inc_by(response.output_tokens.max(0) as f64);

        if response.finish_reason == FinishReason::Length {
            tracing::warn!(kind, "AI response hit the token limit");
        }

        let parsed = extract_json(&response.text)
            .ok_or_else(|| GenerationError::Malformed(format!("no JSON object in {} response", kind)))
            .and_then(|json| {
                serde_json::from_str::<T>(json)
                    .map_err(|e| GenerationError::Malformed(format!("{} response: {}", kind, e)))
            });

        let status = if parsed.is_ok() { "success" } else { "malformed" };
        AI_GENERATIONS_TOTAL.with_label_values(&[kind, status]).inc();

        tracing::info!(
            kind,
            status,
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "AI generation finished"
        );

        parsed
    }

    #[instrument(skip(self, keywords))]
    pub async fn generate_blog_post(
        &self,
        topic: &str,
        keywords: &[String],
    ) -> Result<GeneratedPost, GenerationError> {
        let prompt = format!(
            "Task: blog_post\nTopic: {topic}\nKeywords: {keywords}\n\n\
             Write a blog post of 800 to 1200 words in markdown with at least three `##` \
             headings, one bulleted list, a concrete statistic where accurate, and a closing \
             paragraph inviting readers to schedule a consultation.\n\
             Return JSON with keys: title, excerpt (max 200 chars), content (markdown), \
             seo_title (max {SEO_TITLE_MAX} chars), seo_description (max {SEO_DESCRIPTION_MAX} chars).",
            keywords = keywords.join(", "),
        );

        let mut post: GeneratedPost = self.complete_json("blog_post", prompt).await?;
        if post.content.trim().is_empty() {
            return Err(GenerationError::Malformed("blog post has no content".to_string()));
        }

        post.slug = slugify(&post.title);
        post.excerpt = truncate_on_word(&post.excerpt, 200, "...");
        post.seo_title = truncate_on_word(
            non_empty_or(&post.seo_title, &post.title),
            SEO_TITLE_MAX,
            "",
        );
        post.seo_description = truncate_on_word(
            non_empty_or(&post.seo_description, &post.excerpt),
            SEO_DESCRIPTION_MAX,
            "...",
        );
        Ok(post)
    }

    #[instrument(skip(self, source), fields(title = %source.title))]
    pub async fn generate_newsletter(
        &self,
        source: &SourceContent,
    ) -> Result<GeneratedNewsletter, GenerationError> {
        let prompt = format!(
            "Task: newsletter\nTopic: {}\n\nSource article:\n{}\n\n\
             Turn the article into an email newsletter. Return JSON with keys: subject \
             (max 70 chars), preview_text (max 120 chars), intro, sections (array of \
             {{heading, body}} with 2 to 4 entries), closing.",
            source.title,
            clip_source(&source.content),
        );

        let raw: RawNewsletter = self.complete_json("newsletter", prompt).await?;
        if raw.subject.trim().is_empty() {
            return Err(GenerationError::Malformed("newsletter has no subject".to_string()));
        }

        Ok(GeneratedNewsletter {
            content_html: render_newsletter_html(&raw, &self.site),
            content_text: render_newsletter_text(&raw, &self.site),
            subject: raw.subject,
            preview_text: raw.preview_text,
        })
    }

    #[instrument(skip(self, source), fields(title = %source.title, platform = %platform))]
    pub async fn generate_social_series(
        &self,
        source: &SourceContent,
        platform: Platform,
    ) -> Result<GeneratedSeries, GenerationError> {
        let count = platform.series_length();
        let shape = if platform.uses_slides() {
            "carousel slides; each needs slide_title (max 8 words), content (caption text) \
             and image_prompt"
        } else {
            "posts; each needs content and may include image_prompt"
        };
        let prompt = format!(
            "Task: social_series\nPlatform: {platform}\nPosts: {count}\nTopic: {title}\n\n\
             Source article:\n{content}\n\n\
             Write a {display} series of exactly {count} {shape}. Each post must stand alone, \
             be at most {max} characters including hashtags, and use at most {tags} hashtags. \
             Return JSON with keys: title, posts (array of {{content, hashtags, slide_title, image_prompt}}).",
            platform = platform.as_str(),
            title = source.title,
            content = clip_source(&source.content),
            display = platform.display_name(),
            max = platform.max_chars(),
            tags = platform.max_hashtags(),
        );

        let raw: RawSeries = self.complete_json("social_series", prompt).await?;
        let posts = normalize_series(platform, raw.posts)?;

        Ok(GeneratedSeries {
            platform,
            title: non_empty_or(&raw.title, &format!("{}: {}", platform.display_name(), source.title))
                .to_string(),
            posts,
        })
    }

    #[instrument(skip(self, source), fields(title = %source.title))]
    pub async fn generate_pdf_guide(&self, source: &SourceContent) -> Result<PdfGuide, GenerationError> {
        let prompt = format!(
            "Task: pdf_guide\nTopic: {}\n\nSource article:\n{}\n\n\
             Create a downloadable guide. Return JSON with keys: title, introduction, sections \
             (array of {{heading, body, checklist}} with 3 to 6 entries; checklist is an array \
             of short action items).",
            source.title,
            clip_source(&source.content),
        );

        let guide: PdfGuide = self.complete_json("pdf_guide", prompt).await?;
        if guide.sections.is_empty() {
            return Err(GenerationError::Malformed("guide has no sections".to_string()));
        }
        Ok(guide)
    }

    #[instrument(skip(self, source), fields(title = %source.title))]
    pub async fn generate_video_script(
        &self,
        source: &SourceContent,
    ) -> Result<VideoScript, GenerationError> {
        let prompt = format!(
            "Task: video_script\nTopic: {}\n\nSource article:\n{}\n\n\
             Write a 60 to 90 second video script. Return JSON with keys: title, hook, scenes \
             (array of {{visual, narration, duration_seconds}}), call_to_action.",
            source.title,
            clip_source(&source.content),
        );

        let script: VideoScript = self.complete_json("video_script", prompt).await?;
        if script.scenes.is_empty() {
            return Err(GenerationError::Malformed("video script has no scenes".to_string()));
        }
        Ok(script.with_computed_duration())
    }

    #[instrument(skip(self, content))]
    pub async fn generate_seo_metadata(
        &self,
        title: &str,
        content: &str,
        focus_keyword: Option<&str>,
    ) -> Result<SeoMetadata, GenerationError> {
        let prompt = format!(
            "Task: seo_metadata\nTopic: {title}\nFocus keyword: {keyword}\n\nContent:\n{content}\n\n\
             Return JSON with keys: seo_title (max {SEO_TITLE_MAX} chars, include the focus \
             keyword if given), seo_description (max {SEO_DESCRIPTION_MAX} chars, end with a \
             reason to click).",
            keyword = focus_keyword.unwrap_or("none"),
            content = clip_source(content),
        );

        let meta: SeoMetadata = self.complete_json("seo_metadata", prompt).await?;
        Ok(SeoMetadata {
            seo_title: truncate_on_word(non_empty_or(&meta.seo_title, title), SEO_TITLE_MAX, ""),
            seo_description: truncate_on_word(&meta.seo_description, SEO_DESCRIPTION_MAX, "..."),
        })
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn clip_source(content: &str) -> String {
    truncate_on_word(content, MAX_SOURCE_CHARS, "")
}

/// Find the JSON object in a model reply: a fenced ```json block first,
/// then the first balanced `{...}`.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(start) = text.find("```json") {
        let body = &text[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            let inner = body[..end].trim();
            if !inner.is_empty() {
                return Some(inner);
            }
        }
    }

    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Number, cap and trim a model's posts for one platform.
fn normalize_series(
    platform: Platform,
    raw: Vec<RawSocialPost>,
) -> Result<Vec<SocialPost>, GenerationError> {
    let expected = platform.series_length();
    if raw.is_empty() {
        return Err(GenerationError::Malformed(format!(
            "{} series has no posts",
            platform
        )));
    }
    if raw.len() != expected {
        tracing::warn!(%platform, expected, received = raw.len(), "Series length differs from request");
    }

    let posts = raw
        .into_iter()
        .filter(|p| !p.content.trim().is_empty())
        .take(expected)
        .enumerate()
        .map(|(i, p)| {
            let mut hashtags: Vec<String> = p
                .hashtags
                .into_iter()
                .map(|t| t.trim().trim_start_matches('#').replace(' ', ""))
                .filter(|t| !t.is_empty())
                .take(platform.max_hashtags())
                .collect();
            // Hashtags give way before the post body does.
            while !hashtags.is_empty()
                && hashtag_suffix_len(&hashtags) + MIN_SOCIAL_CONTENT_CHARS > platform.max_chars()
            {
                hashtags.pop();
            }

            let mut post = SocialPost {
                sequence: i as u32 + 1,
                content: p.content.trim().to_string(),
                hashtags,
                slide_title: if platform.uses_slides() {
                    Some(p.slide_title.unwrap_or_else(|| format!("Slide {}", i + 1)))
                } else {
                    None
                },
                image_prompt: p.image_prompt.filter(|s| !s.trim().is_empty()),
            };

            let rendered_len = post.rendered().chars().count();
            if rendered_len > platform.max_chars() {
                let tag_len = rendered_len - post.content.chars().count();
                let budget = platform.max_chars().saturating_sub(tag_len);
                post.content = truncate_on_word(&post.content, budget, "...");
            }
            post
        })
        .collect();

    Ok(posts)
}

/// Shortest body a social post keeps when hashtags compete for space.
const MIN_SOCIAL_CONTENT_CHARS: usize = 80;

/// Characters [`SocialPost::rendered`] adds after the body: a space and
/// `#` per tag plus the tag itself.
fn hashtag_suffix_len(hashtags: &[String]) -> usize {
    hashtags.iter().map(|t| t.chars().count() + 2).sum()
}

fn render_paragraphs_html(body: &str) -> String {
    let mut html = String::new();
    for block in body.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
        let lines: Vec<&str> = block.lines().map(str::trim).collect();
        if lines.iter().all(|l| l.starts_with("- ") || l.starts_with("* ")) {
            html.push_str("<ul>");
            for line in lines {
                html.push_str(&format!("<li>{}</li>", escape_html(&line[2..])));
            }
            html.push_str("</ul>\n");
        } else {
            html.push_str(&format!("<p>{}</p>\n", escape_html(&lines.join(" "))));
        }
    }
    html
}

fn render_newsletter_html(raw: &RawNewsletter, site: &SiteConfig) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html><body style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;\">\n",
    );
    if !raw.preview_text.is_empty() {
        html.push_str(&format!(
            "<div style=\"display:none;\">{}</div>\n",
            escape_html(&raw.preview_text)
        ));
    }
    html.push_str(&render_paragraphs_html(&raw.intro));
    for section in &raw.sections {
        html.push_str(&format!("<h2>{}</h2>\n", escape_html(&section.heading)));
        html.push_str(&render_paragraphs_html(&section.body));
    }
    html.push_str(&render_paragraphs_html(&raw.closing));
    html.push_str(&format!(
        "<p><a href=\"{}\">Schedule a consultation</a></p>\n",
        escape_html(&site.consultation_url)
    ));
    html.push_str(&format!(
        "<hr>\n<p style=\"font-size: 12px; color: #666;\">{}<br>\
         <a href=\"{}\">Unsubscribe</a></p>\n</body></html>",
        escape_html(&site.firm_name),
        UNSUBSCRIBE_PLACEHOLDER
    ));
    html
}

fn render_newsletter_text(raw: &RawNewsletter, site: &SiteConfig) -> String {
    let mut parts: Vec<String> = Vec::new();
    if !raw.intro.trim().is_empty() {
        parts.push(raw.intro.trim().to_string());
    }
    for section in &raw.sections {
        parts.push(format!("{}\n\n{}", section.heading.to_uppercase(), section.body.trim()));
    }
    if !raw.closing.trim().is_empty() {
        parts.push(raw.closing.trim().to_string());
    }
    parts.push(format!("Schedule a consultation: {}", site.consultation_url));
    parts.push(format!(
        "--\n{}\nUnsubscribe: {}",
        site.firm_name, UNSUBSCRIBE_PLACEHOLDER
    ));
    parts.join("\n\n")
}
