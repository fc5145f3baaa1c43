//! Configuration types.
//!
//! Everything is read from the environment once at startup. The only hard
//! requirement is `GROUPME_ACCESS_TOKEN`; without an LLM key the relevance
//! filter is disabled.

use std::time::Duration;

use secrecy::SecretString;

use crate::channels::gmail::GMAIL_API_BASE;
use crate::channels::groupme::GROUPME_API_BASE;
use crate::error::ConfigError;
use crate::llm::{DEFAULT_MODEL, LlmBackend, LlmConfig};
use crate::pipeline::relevance::DEFAULT_BODY_CHAR_BUDGET;

/// Origins of the bundled web client's dev server.
pub const DEFAULT_CORS_ORIGINS: &[&str] = &["http://localhost:5173", "http://127.0.0.1:5173"];

/// Mail fetch behavior shared by all requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    /// Search unread messages only.
    pub unread_only: bool,
    /// Run the LLM relevance filter (when an LLM is configured).
    pub relevance_filter: bool,
    /// Per-email body budget in the classification prompt.
    pub body_char_budget: usize,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            unread_only: false,
            relevance_filter: true,
            body_char_budget: DEFAULT_BODY_CHAR_BUDGET,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
    /// Timeout for every outbound provider request.
    pub http_timeout: Duration,
    pub gmail_api_base: String,
    pub groupme_api_base: String,
    pub groupme_token: SecretString,
    /// `None` disables the relevance filter.
    pub llm: Option<LlmConfig>,
    pub mail: MailSettings,
    /// Send `since_id` so group fetches only return new messages.
    pub track_unread: bool,
    /// Hide upstream error text in 500 responses.
    pub redact_upstream_errors: bool,
}

impl AppConfig {
    /// Defaults for everything except the GroupMe token.
    pub fn new(groupme_token: SecretString) -> Self {
        Self {
            port: 8000,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            http_timeout: Duration::from_secs(30),
            gmail_api_base: GMAIL_API_BASE.to_string(),
            groupme_api_base: GROUPME_API_BASE.to_string(),
            groupme_token,
            llm: None,
            mail: MailSettings::default(),
            track_unread: true,
            redact_upstream_errors: false,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let token = get("GROUPME_ACCESS_TOKEN")
            .ok_or_else(|| ConfigError::MissingEnvVar("GROUPME_ACCESS_TOKEN".to_string()))?;
        let mut config = Self::new(SecretString::from(token));

        if let Some(port) = get("FEED_RELAY_PORT") {
            config.port = parse_value("FEED_RELAY_PORT", &port)?;
        }
        if let Some(origins) = get("FEED_RELAY_CORS_ORIGINS") {
            config.cors_origins = parse_list(&origins);
        }
        if let Some(secs) = get("FEED_RELAY_HTTP_TIMEOUT_SECS") {
            config.http_timeout =
                Duration::from_secs(parse_value("FEED_RELAY_HTTP_TIMEOUT_SECS", &secs)?);
        }
        if let Some(base) = get("GMAIL_API_BASE") {
            config.gmail_api_base = base;
        }
        if let Some(base) = get("GROUPME_API_BASE") {
            config.groupme_api_base = base;
        }

        config.llm = llm_config(&get)?;

        if let Some(flag) = get("MAIL_UNREAD_ONLY") {
            config.mail.unread_only = parse_flag("MAIL_UNREAD_ONLY", &flag)?;
        }
        if let Some(flag) = get("MAIL_RELEVANCE_FILTER") {
            config.mail.relevance_filter = parse_flag("MAIL_RELEVANCE_FILTER", &flag)?;
        }
        if let Some(budget) = get("MAIL_BODY_CHAR_BUDGET") {
            config.mail.body_char_budget = parse_value("MAIL_BODY_CHAR_BUDGET", &budget)?;
        }
        if let Some(flag) = get("GROUPME_TRACK_UNREAD") {
            config.track_unread = parse_flag("GROUPME_TRACK_UNREAD", &flag)?;
        }
        if let Some(flag) = get("REDACT_UPSTREAM_ERRORS") {
            config.redact_upstream_errors = parse_flag("REDACT_UPSTREAM_ERRORS", &flag)?;
        }

        Ok(config)
    }
}

/// Resolve the LLM backend and key. A missing key means no LLM.
fn llm_config<G>(get: &G) -> Result<Option<LlmConfig>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let backend = match get("FEED_RELAY_LLM_BACKEND") {
        Some(raw) => raw.parse::<LlmBackend>().map_err(|message| ConfigError::InvalidValue {
            key: "FEED_RELAY_LLM_BACKEND".to_string(),
            message,
        })?,
        None => LlmBackend::OpenAi,
    };

    let api_key = match backend {
        // OPENAPI_API_KEY is accepted for older deployments.
        LlmBackend::OpenAi => get("OPENAI_API_KEY").or_else(|| get("OPENAPI_API_KEY")),
        LlmBackend::Anthropic => get("ANTHROPIC_API_KEY"),
    };

    Ok(api_key.map(|key| LlmConfig {
        backend,
        api_key: SecretString::from(key),
        model: get("FEED_RELAY_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
    }))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_flag(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn missing_groupme_token_fails_fast() {
        let err = config_from(&[("OPENAI_API_KEY", "sk-test")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "GROUPME_ACCESS_TOKEN"));
    }

    #[test]
    fn blank_groupme_token_counts_as_missing() {
        assert!(config_from(&[("GROUPME_ACCESS_TOKEN", "   ")]).is_err());
    }

    #[test]
    fn defaults_with_only_token() {
        let config = config_from(&[("GROUPME_ACCESS_TOKEN", "gm-token")]).unwrap();
        assert_eq!(config.groupme_token.expose_secret(), "gm-token");
        assert_eq!(config.port, 8000);
        assert_eq!(config.cors_origins, DEFAULT_CORS_ORIGINS);
        assert!(config.llm.is_none());
        assert_eq!(config.mail, MailSettings::default());
        assert!(config.track_unread);
        assert!(!config.redact_upstream_errors);
    }

    #[test]
    fn openai_key_enables_llm_with_default_model() {
        let config = config_from(&[
            ("GROUPME_ACCESS_TOKEN", "t"),
            ("OPENAI_API_KEY", "sk-test"),
        ])
        .unwrap();
        let llm = config.llm.unwrap();
        assert_eq!(llm.backend, LlmBackend::OpenAi);
        assert_eq!(llm.model, "gpt-4o-mini");
    }

    #[test]
    fn legacy_openai_key_name_is_accepted() {
        let config = config_from(&[
            ("GROUPME_ACCESS_TOKEN", "t"),
            ("OPENAPI_API_KEY", "sk-legacy"),
        ])
        .unwrap();
        assert_eq!(config.llm.unwrap().api_key.expose_secret(), "sk-legacy");
    }

    #[test]
    fn anthropic_backend_uses_its_own_key() {
        let config = config_from(&[
            ("GROUPME_ACCESS_TOKEN", "t"),
            ("FEED_RELAY_LLM_BACKEND", "anthropic"),
            ("OPENAI_API_KEY", "sk-openai"),
        ])
        .unwrap();
        assert!(config.llm.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("GROUPME_ACCESS_TOKEN", "t"),
            ("FEED_RELAY_PORT", "9090"),
            ("FEED_RELAY_CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("FEED_RELAY_HTTP_TIMEOUT_SECS", "5"),
            ("MAIL_UNREAD_ONLY", "yes"),
            ("MAIL_RELEVANCE_FILTER", "off"),
            ("MAIL_BODY_CHAR_BUDGET", "200"),
            ("GROUPME_TRACK_UNREAD", "false"),
            ("REDACT_UPSTREAM_ERRORS", "1"),
        ])
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert!(config.mail.unread_only);
        assert!(!config.mail.relevance_filter);
        assert_eq!(config.mail.body_char_budget, 200);
        assert!(!config.track_unread);
        assert!(config.redact_upstream_errors);
    }

    #[test]
    fn invalid_values_are_reported_with_key() {
        let err = config_from(&[("GROUPME_ACCESS_TOKEN", "t"), ("FEED_RELAY_PORT", "eighty")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "FEED_RELAY_PORT"));

        let err = config_from(&[("GROUPME_ACCESS_TOKEN", "t"), ("MAIL_UNREAD_ONLY", "maybe")])
            .unwrap_err();
        assert!(err.to_string().contains("MAIL_UNREAD_ONLY"));

        let err = config_from(&[("GROUPME_ACCESS_TOKEN", "t"), ("FEED_RELAY_LLM_BACKEND", "gemini")])
            .unwrap_err();
        assert!(err.to_string().contains("gemini"));
    }
}
