use secrecy::Secret;
use service_core::config::{self as core_config, get_env, get_env_parsed, is_production};
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct ContentConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub smtp: SmtpConfig,
    pub social: SocialConfig,
    pub site: SiteConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub run_migrations: bool,
}

/// Which text-generation backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProviderKind {
    Gemini,
    OpenAi,
    Mock,
}

impl FromStr for AiProviderKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "mock" => Ok(Self::Mock),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown AI provider '{}': expected gemini, openai or mock",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub provider: AiProviderKind,
    pub model: String,
    pub api_key: Secret<String>,
    /// Override for OpenAI-compatible gateways.
    pub base_url: Option<String>,
    pub temperature: f32,
    pub max_tokens: i32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
    pub from_email: String,
    pub from_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct SocialConfig {
    pub enabled: bool,
    pub linkedin_webhook_url: Option<String>,
    pub twitter_webhook_url: Option<String>,
    pub facebook_webhook_url: Option<String>,
    pub instagram_webhook_url: Option<String>,
}

/// Public-facing identity used in prompts, CTAs and newsletter footers.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub base_url: String,
    pub firm_name: String,
    pub consultation_url: String,
    pub contact_phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub admin_api_key: Secret<String>,
    pub ai_requests_per_minute: u32,
    pub allowed_origins: Vec<String>,
}

impl ContentConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let is_prod = is_production();

        let provider: AiProviderKind = get_env("AI_PROVIDER", Some("mock"), is_prod)?.parse()?;
        let default_model = match provider {
            AiProviderKind::Gemini => "gemini-2.0-flash",
            AiProviderKind::OpenAi => "gpt-4o-mini",
            AiProviderKind::Mock => "mock",
        };
        let api_key_default = if provider == AiProviderKind::Mock {
            Some("")
        } else {
            None
        };

        let base_url = get_env("SITE_BASE_URL", Some("http://localhost:3000"), is_prod)?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "content-service".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|s| !s.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: get_env_parsed("DATABASE_MAX_CONNECTIONS", 10, is_prod)?,
                min_connections: get_env_parsed("DATABASE_MIN_CONNECTIONS", 2, is_prod)?,
                run_migrations: get_env_parsed("DATABASE_RUN_MIGRATIONS", true, is_prod)?,
            },
            ai: AiConfig {
                provider,
                model: get_env("AI_MODEL", Some(default_model), is_prod)?,
                api_key: Secret::new(get_env("AI_API_KEY", api_key_default, is_prod)?),
                base_url: env::var("AI_BASE_URL").ok().filter(|s| !s.is_empty()),
                temperature: get_env_parsed("AI_TEMPERATURE", 0.7, is_prod)?,
                max_tokens: get_env_parsed("AI_MAX_TOKENS", 4096, is_prod)?,
                timeout_secs: get_env_parsed("AI_TIMEOUT_SECS", 120, is_prod)?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("smtp.gmail.com"), is_prod)?,
                port: get_env_parsed("SMTP_PORT", 587, is_prod)?,
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: Secret::new(get_env("SMTP_PASSWORD", Some(""), is_prod)?),
                from_email: get_env("SMTP_FROM_EMAIL", Some("newsletter@example.com"), is_prod)?,
                from_name: get_env("SMTP_FROM_NAME", Some("Firm Newsletter"), is_prod)?,
                enabled: get_env_parsed("SMTP_ENABLED", false, is_prod)?,
            },
            social: SocialConfig {
                enabled: get_env_parsed("SOCIAL_ENABLED", false, is_prod)?,
                linkedin_webhook_url: optional_env("SOCIAL_LINKEDIN_WEBHOOK_URL"),
                twitter_webhook_url: optional_env("SOCIAL_TWITTER_WEBHOOK_URL"),
                facebook_webhook_url: optional_env("SOCIAL_FACEBOOK_WEBHOOK_URL"),
                instagram_webhook_url: optional_env("SOCIAL_INSTAGRAM_WEBHOOK_URL"),
            },
            site: SiteConfig {
                consultation_url: get_env(
                    "SITE_CONSULTATION_URL",
                    Some(&format!("{}/contact", base_url.trim_end_matches('/'))),
                    is_prod,
                )?,
                base_url,
                firm_name: get_env("SITE_FIRM_NAME", Some("Our Accounting Firm"), is_prod)?,
                contact_phone: optional_env("SITE_CONTACT_PHONE"),
            },
            security: SecurityConfig {
                admin_api_key: Secret::new(get_env("ADMIN_API_KEY", None, is_prod)?),
                ai_requests_per_minute: get_env_parsed("AI_REQUESTS_PER_MINUTE", 20, is_prod)?,
                allowed_origins: get_env("CORS_ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect(),
            },
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("Gemini".parse::<AiProviderKind>().unwrap(), AiProviderKind::Gemini);
        assert_eq!("openai".parse::<AiProviderKind>().unwrap(), AiProviderKind::OpenAi);
        assert_eq!("MOCK".parse::<AiProviderKind>().unwrap(), AiProviderKind::Mock);
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let err = "claude-on-a-toaster".parse::<AiProviderKind>().unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }
}
