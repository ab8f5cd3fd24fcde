use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One caption cue of a transcript. `offset` and `duration` are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub text: String,
    pub offset: f64,
    pub duration: f64,
    pub lang: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "languageCode")]
    pub language_code: String,
}

/// What the user asked for: a video id or link, and a language code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptRequest {
    pub video: String,
    pub lang: String,
}

impl TranscriptRequest {
    /// First token is the video, optional second token the language.
    /// Returns `None` when the text holds no tokens at all.
    pub fn parse(text: &str, default_lang: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let video = parts.next()?.trim().to_string();
        let lang = parts.next().unwrap_or(default_lang).to_string();
        Some(Self { video, lang })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub entries: Vec<TranscriptEntry>,
    /// Set when the requested language was swapped for a fallback.
    pub notice: Option<String>,
}

// Telegram Bot API wire types, only the fields the bot reads.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default, with = "chrono::serde::ts_seconds")]
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub text: Option<String>,
}

impl Message {
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseParameters {
    #[serde(default)]
    pub retry_after: Option<u64>,
}

/// Envelope every Bot API method replies with.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}
