use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Impossible to retrieve a YouTube video ID from '{input}'")]
    InvalidVideoId { input: String },

    #[error("YouTube is receiving too many requests from this IP and now requires solving a captcha to continue")]
    TooManyRequests,

    #[error("The video is no longer available ({video_id})")]
    VideoUnavailable { video_id: String },

    #[error("Transcript is disabled on this video ({video_id})")]
    TranscriptDisabled { video_id: String },

    #[error("No transcripts are available for this video ({video_id})")]
    TranscriptNotAvailable { video_id: String },

    #[error("No transcripts are available in {lang} for this video ({video_id}). Available languages: {}", .available.join(", "))]
    TranscriptNotAvailableLanguage {
        lang: String,
        available: Vec<String>,
        video_id: String,
    },

    #[error("Telegram API error {code}: {description}")]
    TelegramApi { code: i64, description: String },

    #[error("Processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Transcript,
    Telegram,
    Processing,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl BotError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            BotError::HttpError(_) => ErrorCategory::Network,
            BotError::IoError(_) => ErrorCategory::System,
            BotError::SerializationError(_) | BotError::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
            BotError::ConfigValidationError { .. }
            | BotError::InvalidConfigValueError { .. }
            | BotError::MissingConfigError { .. } => ErrorCategory::Configuration,
            BotError::InvalidVideoId { .. }
            | BotError::TooManyRequests
            | BotError::VideoUnavailable { .. }
            | BotError::TranscriptDisabled { .. }
            | BotError::TranscriptNotAvailable { .. }
            | BotError::TranscriptNotAvailableLanguage { .. } => ErrorCategory::Transcript,
            BotError::TelegramApi { .. } => ErrorCategory::Telegram,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            BotError::InvalidVideoId { .. }
            | BotError::VideoUnavailable { .. }
            | BotError::TranscriptDisabled { .. }
            | BotError::TranscriptNotAvailable { .. }
            | BotError::TranscriptNotAvailableLanguage { .. } => ErrorSeverity::Low,
            BotError::HttpError(_) | BotError::TooManyRequests => ErrorSeverity::Medium,
            BotError::SerializationError(_)
            | BotError::ProcessingError { .. }
            | BotError::ConfigValidationError { .. }
            | BotError::InvalidConfigValueError { .. }
            | BotError::MissingConfigError { .. } => ErrorSeverity::High,
            // 401/404 mean the token is wrong, nothing will recover from that
            BotError::TelegramApi { code, .. } if *code == 401 || *code == 404 => {
                ErrorSeverity::Critical
            }
            BotError::TelegramApi { .. } => ErrorSeverity::Medium,
            BotError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Transcript => format!("Transcript unavailable: {}", self),
            ErrorCategory::Telegram => format!("Telegram rejected the request: {}", self),
            ErrorCategory::Processing => format!("Failed to process data: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            BotError::MissingConfigError { .. } => {
                "Set TELEGRAM_BOT_TOKEN or pass --token / a [telegram] token in the config file"
            }
            BotError::ConfigValidationError { .. } | BotError::InvalidConfigValueError { .. } => {
                "Check the configuration file and command line flags"
            }
            BotError::TelegramApi { code, .. } if *code == 401 || *code == 404 => {
                "Verify the bot token with @BotFather"
            }
            BotError::TelegramApi { .. } => "Retry later; Telegram may be rate limiting the bot",
            BotError::HttpError(_) => "Check network connectivity and the configured API URLs",
            BotError::TooManyRequests => "Wait before retrying or run the bot from another IP",
            BotError::InvalidVideoId { .. } => "Send an 11-character video ID or a YouTube link",
            BotError::TranscriptNotAvailableLanguage { .. } => "Request one of the available languages",
            BotError::VideoUnavailable { .. }
            | BotError::TranscriptDisabled { .. }
            | BotError::TranscriptNotAvailable { .. } => "Try a video that has captions",
            BotError::IoError(_) => "Check file paths and permissions",
            BotError::SerializationError(_) | BotError::ProcessingError { .. } => {
                "Run with --verbose and report the failing input"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, BotError>;
