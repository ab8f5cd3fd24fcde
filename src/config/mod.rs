pub mod toml_config;

pub use toml_config::BotConfig;

#[cfg(feature = "cli")]
use crate::utils::error::Result;
#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::path::PathBuf;

/// Command line flags. Anything given here wins over the config file.
#[cfg(feature = "cli")]
#[derive(Clone, Parser)]
#[command(name = "tofuboi")]
#[command(about = "Telegram bot that replies with YouTube video transcripts")]
pub struct CliConfig {
    /// Bot token issued by @BotFather
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long, env = "TOFUBOI_CONFIG")]
    pub config: Option<PathBuf>,

    /// Bot API server, e.g. a local telegram-bot-api instance
    #[arg(long)]
    pub api_url: Option<String>,

    #[arg(long)]
    pub youtube_url: Option<String>,

    /// Language used when a message names none
    #[arg(long)]
    pub default_lang: Option<String>,

    #[arg(long)]
    pub poll_timeout: Option<u64>,

    #[arg(long)]
    pub concurrent_chats: Option<usize>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, env = "TOFUBOI_JSON_LOGS", help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Loads the config file (if any) and layers the flags on top.
    pub fn into_bot_config(self) -> Result<BotConfig> {
        let mut config = match &self.config {
            Some(path) => BotConfig::from_file(path)?,
            None => BotConfig::default(),
        };

        if let Some(token) = self.token {
            config.telegram.token = token;
        }
        if let Some(api_url) = self.api_url {
            config.telegram.api_url = api_url;
        }
        if let Some(youtube_url) = self.youtube_url {
            config.youtube.base_url = youtube_url;
        }
        if let Some(lang) = self.default_lang {
            config.youtube.default_language = lang;
        }
        if let Some(timeout) = self.poll_timeout {
            config.telegram.poll_timeout_seconds = timeout;
        }
        if let Some(chats) = self.concurrent_chats {
            config.delivery.concurrent_chats = chats;
        }
        if self.json_logs {
            config.logging.json = true;
        }

        Ok(config)
    }
}
