use crate::core::formatter::{decode_caption_text, split_safe_utf8, MessageBatcher};
use crate::core::transcript::TranscriptService;
use crate::core::{Message, Messenger, TranscriptEntry, TranscriptRequest, TranscriptSource};
use crate::utils::error::Result;

pub const NO_TEXT_REPLY: &str = "Please provide a valid YouTube video ID.";
pub const EMPTY_TEXT_REPLY: &str = "Please provide a video ID.";
pub const EMPTY_TRANSCRIPT_REPLY: &str = "Transcript could not be retrieved or is empty.";
pub const USAGE_REPLY: &str = "Send me a YouTube video ID or link and I will reply with its transcript.\n\
    Add a language code to pick the captions, e.g.\n\
    HQoJMIgNdjo zh-TW\n\
    If that language is missing I fall back to another available one.";

pub struct MessageHandler<S: TranscriptSource, M: Messenger> {
    transcripts: TranscriptService<S>,
    messenger: M,
    default_lang: String,
    max_message_bytes: usize,
}

impl<S: TranscriptSource, M: Messenger> MessageHandler<S, M> {
    pub fn new(
        transcripts: TranscriptService<S>,
        messenger: M,
        default_lang: impl Into<String>,
        max_message_bytes: usize,
    ) -> Self {
        Self {
            transcripts,
            messenger,
            default_lang: default_lang.into(),
            max_message_bytes,
        }
    }

    /// Replies to one incoming message. Only delivery failures surface as
    /// errors; transcript problems are reported to the chat.
    pub async fn handle(&self, message: &Message) -> Result<()> {
        let chat_id = message.chat.id;

        let text = match message.text() {
            Some(text) => text,
            None => {
                return self.messenger.send_message(chat_id, NO_TEXT_REPLY).await;
            }
        };

        if is_command(text, "start") || is_command(text, "help") {
            return self.messenger.send_message(chat_id, USAGE_REPLY).await;
        }

        let request = match TranscriptRequest::parse(text, &self.default_lang) {
            Some(request) => request,
            None => {
                return self.messenger.send_message(chat_id, EMPTY_TEXT_REPLY).await;
            }
        };

        tracing::info!(
            "🎬 chat {}: transcript requested for {} ({})",
            chat_id,
            request.video,
            request.lang
        );

        match self.transcripts.fetch(&request.video, &request.lang).await {
            Ok(outcome) => {
                if let Some(notice) = outcome.notice {
                    self.messenger.send_message(chat_id, &notice).await?;
                }
                self.send_transcript(chat_id, outcome.entries).await
            }
            Err(e) => {
                tracing::warn!("⚠️ chat {}: {} ({:?})", chat_id, e, e.category());
                self.messenger
                    .send_message(chat_id, &format!("Error fetching transcript: {}", e))
                    .await
            }
        }
    }

    /// Sends each message as soon as the batcher fills it, so a long
    /// transcript is never held in memory as a whole.
    async fn send_transcript(&self, chat_id: i64, transcript: Vec<TranscriptEntry>) -> Result<()> {
        if transcript.is_empty() {
            return self
                .messenger
                .send_message(chat_id, EMPTY_TRANSCRIPT_REPLY)
                .await;
        }

        let mut batcher = MessageBatcher::new(self.max_message_bytes);
        let mut sent = 0usize;

        for entry in transcript {
            let text = decode_caption_text(&entry.text);

            let chunks = match split_safe_utf8(&text, self.max_message_bytes) {
                Ok(chunks) => chunks,
                Err(e) => {
                    tracing::error!("❌ chat {}: cannot split transcript: {}", chat_id, e);
                    return self
                        .messenger
                        .send_message(chat_id, &format!("Error processing transcript: {}", e))
                        .await;
                }
            };

            for chunk in chunks {
                if let Some(full) = batcher.push(chunk) {
                    self.messenger.send_message(chat_id, &full).await?;
                    sent += 1;
                }
            }
        }

        if let Some(rest) = batcher.finish() {
            self.messenger.send_message(chat_id, &rest).await?;
            sent += 1;
        }

        // every cue was blank
        if sent == 0 {
            return self
                .messenger
                .send_message(chat_id, EMPTY_TRANSCRIPT_REPLY)
                .await;
        }

        tracing::debug!("chat {}: transcript delivered in {} messages", chat_id, sent);
        Ok(())
    }
}

/// Matches `/name` and `/name@botname`, followed by nothing or whitespace.
fn is_command(text: &str, name: &str) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    let Some(command) = first.strip_prefix('/') else {
        return false;
    };
    let command = command.split('@').next().unwrap_or_default();
    command.eq_ignore_ascii_case(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Chat, TranscriptEntry};
    use crate::utils::error::BotError;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingMessenger {
        sent: Arc<Mutex<Vec<(i64, String)>>>,
    }

    impl RecordingMessenger {
        async fn texts(&self) -> Vec<String> {
            self.sent.lock().await.iter().map(|(_, t)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
            self.sent.lock().await.push((chat_id, text.to_string()));
            Ok(())
        }
    }

    struct FixedSource {
        entries: Vec<TranscriptEntry>,
    }

    #[async_trait]
    impl TranscriptSource for FixedSource {
        async fn fetch_transcript(
            &self,
            video: &str,
            lang: Option<&str>,
        ) -> Result<Vec<TranscriptEntry>> {
            if video.len() != 11 {
                return Err(BotError::InvalidVideoId {
                    input: video.to_string(),
                });
            }
            if lang != Some("en") {
                return Err(BotError::TranscriptNotAvailableLanguage {
                    lang: lang.unwrap_or_default().to_string(),
                    available: vec!["en".to_string()],
                    video_id: video.to_string(),
                });
            }
            Ok(self.entries.clone())
        }
    }

    fn entry(text: &str) -> TranscriptEntry {
        TranscriptEntry {
            text: text.to_string(),
            offset: 0.0,
            duration: 1.0,
            lang: "en".to_string(),
        }
    }

    fn message(text: Option<&str>) -> Message {
        Message {
            message_id: 1,
            chat: Chat {
                id: 77,
                kind: "private".to_string(),
            },
            from: None,
            date: Default::default(),
            text: text.map(str::to_string),
        }
    }

    fn handler(
        entries: Vec<TranscriptEntry>,
        max_bytes: usize,
    ) -> (MessageHandler<FixedSource, RecordingMessenger>, RecordingMessenger) {
        let messenger = RecordingMessenger::default();
        let service = TranscriptService::new(FixedSource { entries });
        (
            MessageHandler::new(service, messenger.clone(), "en", max_bytes),
            messenger,
        )
    }

    #[tokio::test]
    async fn test_non_text_message() {
        let (handler, messenger) = handler(vec![], 4096);
        tokio_test::assert_ok!(handler.handle(&message(None)).await);
        assert_eq!(messenger.texts().await, vec![NO_TEXT_REPLY]);
    }

    #[tokio::test]
    async fn test_empty_text_message() {
        let (handler, messenger) = handler(vec![], 4096);
        tokio_test::assert_ok!(handler.handle(&message(Some(""))).await);
        assert_eq!(messenger.texts().await, vec![EMPTY_TEXT_REPLY]);
    }

    #[tokio::test]
    async fn test_start_and_help_commands() {
        let (handler, messenger) = handler(vec![], 4096);
        handler.handle(&message(Some("/start"))).await.unwrap();
        handler.handle(&message(Some("/help@tofuboi_bot"))).await.unwrap();
        assert_eq!(messenger.texts().await, vec![USAGE_REPLY, USAGE_REPLY]);
    }

    #[tokio::test]
    async fn test_invalid_video_id_reports_error() {
        let (handler, messenger) = handler(vec![entry("hi")], 4096);
        handler
            .handle(&message(Some("not_a_valid_video_id")))
            .await
            .unwrap();
        let texts = messenger.texts().await;
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("Error fetching transcript"));
    }

    #[tokio::test]
    async fn test_empty_transcript() {
        let (handler, messenger) = handler(vec![], 4096);
        handler.handle(&message(Some("abcdefghijk"))).await.unwrap();
        assert_eq!(messenger.texts().await, vec![EMPTY_TRANSCRIPT_REPLY]);
    }

    #[tokio::test]
    async fn test_blank_cues_count_as_empty_transcript() {
        let (handler, messenger) = handler(vec![entry(""), entry("")], 4096);
        handler.handle(&message(Some("abcdefghijk"))).await.unwrap();
        assert_eq!(messenger.texts().await, vec![EMPTY_TRANSCRIPT_REPLY]);
    }

    #[tokio::test]
    async fn test_transcript_is_decoded_and_joined() {
        let entries = vec![entry("it&amp;#39;s"), entry("Tom &amp; Jerry")];
        let (handler, messenger) = handler(entries, 4096);
        handler.handle(&message(Some("abcdefghijk"))).await.unwrap();
        assert_eq!(messenger.texts().await, vec!["it's\nTom & Jerry"]);
    }

    #[tokio::test]
    async fn test_long_transcript_is_split() {
        let entries = vec![entry(&"a".repeat(8)), entry(&"b".repeat(8)), entry("c")];
        let (handler, messenger) = handler(entries, 10);
        handler.handle(&message(Some("abcdefghijk"))).await.unwrap();
        assert_eq!(
            messenger.texts().await,
            vec!["a".repeat(8), "b".repeat(8) + "\nc"]
        );
    }

    #[tokio::test]
    async fn test_split_failure_is_reported() {
        let entries = vec![entry("ab"), entry("abc"), entry("世")];
        let (handler, messenger) = handler(entries, 2);
        handler.handle(&message(Some("abcdefghijk"))).await.unwrap();
        // "ab" was flushed when "ab" of "abc" arrived; the buffer holding "c" is dropped
        assert_eq!(
            messenger.texts().await,
            vec![
                "ab".to_string(),
                "ab".to_string(),
                "Error processing transcript: max_bytes is too small to fit the next character"
                    .to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_fallback_notice_precedes_transcript() {
        let (handler, messenger) = handler(vec![entry("hello")], 4096);
        handler
            .handle(&message(Some("abcdefghijk fr")))
            .await
            .unwrap();
        let texts = messenger.texts().await;
        assert_eq!(texts.len(), 2);
        assert!(texts[0].starts_with("Requested language 'fr' not available."));
        assert_eq!(texts[1], "hello");
    }

    #[test]
    fn test_is_command() {
        assert!(is_command("/start", "start"));
        assert!(is_command("/START now", "start"));
        assert!(is_command("/help@some_bot", "help"));
        assert!(!is_command("start", "start"));
        assert!(!is_command("/starting", "start"));
        assert!(!is_command("", "help"));
    }
}
