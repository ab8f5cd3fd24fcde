use crate::core::{CaptionTrack, TranscriptEntry, TranscriptSource};
use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::Client;
use std::sync::LazyLock;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.youtube.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/85.0.4183.83 Safari/537.36,gzip(gfe)";

static VIDEO_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:youtube\.com/(?:[^/]+/.+/|(?:v|e(?:mbed)?|shorts|live)/|.*[?&]v=)|youtu\.be/)([^"&?/\s]{11})"#,
    )
    .expect("video id pattern is valid")
});

static CUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<text start="([^"]*)" dur="([^"]*)">([^<]*)</text>"#)
        .expect("timed text pattern is valid")
});

/// Accepts a bare 11-character id or any common YouTube link form.
pub fn extract_video_id(input: &str) -> Result<String> {
    let input = input.trim();
    if input.chars().count() == 11 && !input.contains('/') {
        return Ok(input.to_string());
    }

    VIDEO_ID_RE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| BotError::InvalidVideoId {
            input: input.to_string(),
        })
}

/// Pulls the caption track list out of a watch page.
pub fn parse_caption_tracks(page: &str, video_id: &str) -> Result<Vec<CaptionTrack>> {
    let Some((_, after)) = page.split_once("\"captions\":") else {
        if page.contains("class=\"g-recaptcha\"") {
            return Err(BotError::TooManyRequests);
        }
        if !page.contains("\"playabilityStatus\":") {
            return Err(BotError::VideoUnavailable {
                video_id: video_id.to_string(),
            });
        }
        return Err(BotError::TranscriptDisabled {
            video_id: video_id.to_string(),
        });
    };

    let captions_json = after.split(",\"videoDetails").next().unwrap_or(after);
    let renderer = serde_json::from_str::<serde_json::Value>(captions_json)
        .ok()
        .and_then(|captions| captions.get("playerCaptionsTracklistRenderer").cloned())
        .ok_or_else(|| BotError::TranscriptDisabled {
            video_id: video_id.to_string(),
        })?;

    let tracks = renderer
        .get("captionTracks")
        .cloned()
        .and_then(|tracks| serde_json::from_value::<Vec<CaptionTrack>>(tracks).ok())
        .unwrap_or_default();

    if tracks.is_empty() {
        return Err(BotError::TranscriptNotAvailable {
            video_id: video_id.to_string(),
        });
    }
    Ok(tracks)
}

/// Track in `lang`, or the first track when no language is asked for.
pub fn select_track<'a>(
    tracks: &'a [CaptionTrack],
    lang: Option<&str>,
    video_id: &str,
) -> Result<&'a CaptionTrack> {
    let selected = match lang {
        Some(lang) => tracks.iter().find(|t| t.language_code == lang),
        None => tracks.first(),
    };

    selected.ok_or_else(|| match lang {
        Some(lang) => BotError::TranscriptNotAvailableLanguage {
            lang: lang.to_string(),
            available: tracks.iter().map(|t| t.language_code.clone()).collect(),
            video_id: video_id.to_string(),
        },
        None => BotError::TranscriptNotAvailable {
            video_id: video_id.to_string(),
        },
    })
}

/// Reads the `<text>` cues of a timed text document. Malformed timings
/// become 0.0 rather than dropping the cue.
pub fn parse_timed_text(xml: &str, lang: &str) -> Vec<TranscriptEntry> {
    CUE_RE
        .captures_iter(xml)
        .map(|caps| TranscriptEntry {
            offset: caps[1].parse().unwrap_or(0.0),
            duration: caps[2].parse().unwrap_or(0.0),
            text: caps[3].to_string(),
            lang: lang.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct YoutubeClient {
    client: Client,
    base_url: String,
    user_agent: String,
}

impl YoutubeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Every request, page and timed text alike, is bounded by `request_timeout`.
    pub fn with_timeout(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    fn request(&self, url: &str, lang: Option<&str>) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url).header(USER_AGENT, &self.user_agent);
        if let Some(lang) = lang {
            request = request.header(ACCEPT_LANGUAGE, lang);
        }
        request
    }
}

#[async_trait]
impl TranscriptSource for YoutubeClient {
    async fn fetch_transcript(
        &self,
        video: &str,
        lang: Option<&str>,
    ) -> Result<Vec<TranscriptEntry>> {
        let video_id = extract_video_id(video)?;
        let watch_url = format!("{}/watch?v={}", self.base_url, video_id);

        tracing::debug!("Fetching watch page: {}", watch_url);
        let page = self.request(&watch_url, lang).send().await?.text().await?;

        let tracks = parse_caption_tracks(&page, &video_id)?;
        tracing::debug!(
            "{}: caption tracks {:?}",
            video_id,
            tracks.iter().map(|t| t.language_code.as_str()).collect::<Vec<_>>()
        );
        let track = select_track(&tracks, lang, &video_id)?;

        let response = self.request(&track.base_url, lang).send().await?;
        if !response.status().is_success() {
            tracing::warn!(
                "⚠️ {}: timed text request returned {}",
                video_id,
                response.status()
            );
            return Err(BotError::TranscriptNotAvailable { video_id });
        }

        let xml = response.text().await?;
        let entries = parse_timed_text(&xml, &track.language_code);
        tracing::debug!("{}: {} caption cues", video_id, entries.len());
        Ok(entries)
    }
}
