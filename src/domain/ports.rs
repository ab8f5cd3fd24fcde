use crate::domain::model::{TranscriptEntry, Update};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Anything that can turn a video reference into caption cues.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// `video` is either a bare id or a link; `lang` of `None` takes the first track.
    async fn fetch_transcript(&self, video: &str, lang: Option<&str>)
        -> Result<Vec<TranscriptEntry>>;
}

#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}

#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>>;
}
