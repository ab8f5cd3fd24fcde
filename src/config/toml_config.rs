use crate::adapters::{telegram, youtube};
use crate::core::formatter::TELEGRAM_MAX_MESSAGE_BYTES;
use crate::core::transcript::DEFAULT_FALLBACK_LANGUAGES;
use crate::utils::error::{BotError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env placeholder pattern is valid"));

/// Full bot configuration. Every field has a default, so an empty file
/// (or no file at all) is valid apart from the token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub telegram: TelegramConfig,
    pub youtube: YoutubeConfig,
    pub delivery: DeliveryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,
    pub api_url: String,
    pub poll_timeout_seconds: u64,
    pub request_timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: telegram::DEFAULT_API_URL.to_string(),
            poll_timeout_seconds: 30,
            request_timeout_seconds: 60,
            retry_attempts: 3,
            retry_delay_seconds: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YoutubeConfig {
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout_seconds: u64,
    pub default_language: String,
    pub fallback_languages: Vec<String>,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            base_url: youtube::DEFAULT_BASE_URL.to_string(),
            user_agent: youtube::DEFAULT_USER_AGENT.to_string(),
            request_timeout_seconds: 30,
            default_language: "en".to_string(),
            fallback_languages: DEFAULT_FALLBACK_LANGUAGES
                .iter()
                .map(|l| l.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub max_message_bytes: usize,
    pub concurrent_chats: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: TELEGRAM_MAX_MESSAGE_BYTES,
            concurrent_chats: 4,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
}

impl BotConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);

        toml::from_str(&processed).map_err(|e| BotError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value; unknown variables are
    /// left untouched so validation can point at them.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }
}

impl Validate for BotConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_bot_token("telegram.token", &self.telegram.token)?;
        validation::validate_url("telegram.api_url", &self.telegram.api_url)?;
        validation::validate_url("youtube.base_url", &self.youtube.base_url)?;
        validation::validate_positive_number(
            "youtube.request_timeout_seconds",
            self.youtube.request_timeout_seconds as usize,
            1,
        )?;
        validation::validate_non_empty_string(
            "youtube.default_language",
            &self.youtube.default_language,
        )?;
        for lang in &self.youtube.fallback_languages {
            validation::validate_non_empty_string("youtube.fallback_languages", lang)?;
        }
        // a 4-byte UTF-8 character must always fit in one message
        validation::validate_range(
            "delivery.max_message_bytes",
            self.delivery.max_message_bytes,
            4,
            TELEGRAM_MAX_MESSAGE_BYTES,
        )?;
        validation::validate_positive_number(
            "delivery.concurrent_chats",
            self.delivery.concurrent_chats,
            1,
        )?;

        if self.telegram.request_timeout_seconds <= self.telegram.poll_timeout_seconds {
            return Err(BotError::InvalidConfigValueError {
                field: "telegram.request_timeout_seconds".to_string(),
                value: self.telegram.request_timeout_seconds.to_string(),
                reason: format!(
                    "Must be longer than telegram.poll_timeout_seconds ({})",
                    self.telegram.poll_timeout_seconds
                ),
            });
        }
        Ok(())
    }
}
