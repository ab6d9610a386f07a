//! Environment-based configuration.
//!
//! All settings come from the environment (a `.env` file is honored via
//! `dotenvy` in `main`). Secrets are wrapped in [`SecretString`] so they
//! never show up in debug output.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Top-level configuration for the service.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub channel: ChannelConfig,
}

/// Webhook server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    url: String,
    pub pool_size: usize,
}

impl DatabaseConfig {
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Completion-provider settings.
///
/// `default_api_key` is the fallback used when a tenant has no key of its
/// own; with neither present the conversation degrades to a fixed apology.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub default_api_key: Option<SecretString>,
    pub request_timeout_secs: u64,
}

/// WhatsApp Cloud API settings that are global rather than per tenant.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Token Meta must present on the GET verification handshake.
    pub verify_token: SecretString,
    /// Graph API base, e.g. `https://graph.facebook.com/v20.0`.
    pub graph_base_url: String,
}

impl Config {
    /// Load configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let server = ServerConfig {
            host: env_or("BOOKLINE_HOST", "0.0.0.0"),
            port: env_parse("BOOKLINE_PORT", 8080)?,
        };

        let database = DatabaseConfig {
            url: required("DATABASE_URL")?,
            pool_size: env_parse("DATABASE_POOL_SIZE", 8)?,
        };

        let llm = LlmConfig {
            base_url: env_or("LLM_BASE_URL", "https://api.openai.com"),
            model: env_or("LLM_MODEL", "gpt-4o-mini"),
            default_api_key: std::env::var("LLM_API_KEY")
                .ok()
                .filter(|v| !v.is_empty())
                .map(SecretString::from),
            request_timeout_secs: env_parse("LLM_TIMEOUT_SECS", 60)?,
        };

        let channel = ChannelConfig {
            verify_token: SecretString::from(required("WHATSAPP_VERIFY_TOKEN")?),
            graph_base_url: env_or("WHATSAPP_GRAPH_URL", "https://graph.facebook.com/v20.0"),
        };

        Ok(Self {
            server,
            database,
            llm,
            channel,
        })
    }
}

fn required(var: &str) -> Result<String, ConfigError> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingVar(var.to_string()))
}

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(v) if !v.is_empty() => v.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            var: var.to_string(),
            reason: e.to_string(),
        }),
        _ => Ok(default),
    }
}
