use crate::core::{FetchOutcome, TranscriptSource};
use crate::utils::error::{BotError, Result};

pub const DEFAULT_FALLBACK_LANGUAGES: [&str; 3] = ["en", "zh-HK", "zh-TW"];

pub struct TranscriptService<S: TranscriptSource> {
    source: S,
    fallback_languages: Vec<String>,
}

impl<S: TranscriptSource> TranscriptService<S> {
    pub fn new(source: S) -> Self {
        Self::with_fallbacks(
            source,
            DEFAULT_FALLBACK_LANGUAGES.iter().map(|l| l.to_string()).collect(),
        )
    }

    pub fn with_fallbacks(source: S, fallback_languages: Vec<String>) -> Self {
        Self {
            source,
            fallback_languages,
        }
    }

    /// Fetches the transcript in `lang`, retrying once with a fallback
    /// language when the video has no track in the requested one.
    pub async fn fetch(&self, video: &str, lang: &str) -> Result<FetchOutcome> {
        match self.source.fetch_transcript(video, Some(lang)).await {
            Ok(entries) => Ok(FetchOutcome {
                entries,
                notice: None,
            }),
            Err(BotError::TranscriptNotAvailableLanguage {
                available,
                video_id,
                ..
            }) => {
                let preferred: Vec<&str> =
                    self.fallback_languages.iter().map(String::as_str).collect();
                let fallback = select_fallback_language(&available, &preferred);
                tracing::info!(
                    "🌐 {}: '{}' not available, falling back to '{}'",
                    video_id,
                    lang,
                    fallback
                );

                let entries = self
                    .source
                    .fetch_transcript(&video_id, Some(&fallback))
                    .await?;
                let notice = format!(
                    "Requested language '{}' not available. Using fallback language '{}'. Available languages: {}",
                    lang,
                    fallback,
                    available.join(", ")
                );
                Ok(FetchOutcome {
                    entries,
                    notice: Some(notice),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Picks the first preferred language that is available, then any Chinese
/// variant, then whatever comes first. Falls back to `en` when nothing is
/// available at all.
pub fn select_fallback_language(available: &[String], preferred: &[&str]) -> String {
    if let Some(lang) = preferred
        .iter()
        .find(|&&p| available.iter().any(|a| a == p))
    {
        return lang.to_string();
    }
    if let Some(lang) = available.iter().find(|l| l.starts_with("zh")) {
        return lang.clone();
    }
    available
        .first()
        .cloned()
        .unwrap_or_else(|| "en".to_string())
}
