use crate::core::handler::MessageHandler;
use crate::core::{Message, Messenger, TranscriptSource, Update, UpdateSource};
use crate::utils::error::{ErrorSeverity, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub struct Dispatcher<U, S, M>
where
    U: UpdateSource,
    S: TranscriptSource + 'static,
    M: Messenger + 'static,
{
    updates: U,
    handler: Arc<MessageHandler<S, M>>,
    offset: Option<i64>,
    poll_timeout_secs: u64,
    retry_delay: Duration,
    permits: Arc<Semaphore>,
}

impl<U, S, M> Dispatcher<U, S, M>
where
    U: UpdateSource,
    S: TranscriptSource + 'static,
    M: Messenger + 'static,
{
    pub fn new(updates: U, handler: MessageHandler<S, M>) -> Self {
        Self {
            updates,
            handler: Arc::new(handler),
            offset: None,
            poll_timeout_secs: 30,
            retry_delay: Duration::from_secs(5),
            permits: Arc::new(Semaphore::new(4)),
        }
    }

    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_concurrent_chats(mut self, chats: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(chats.max(1)));
        self
    }

    /// Next `update_id` the dispatcher will ask for.
    pub fn offset(&self) -> Option<i64> {
        self.offset
    }

    /// Fetches one batch of updates and waits until every message in it has
    /// been handled. Returns the number of updates received.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let updates = self
            .updates
            .get_updates(self.offset, self.poll_timeout_secs)
            .await?;
        Ok(self.dispatch(updates).await)
    }

    /// Polls until `shutdown` resolves. A batch that is already being
    /// handled is finished before returning.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!("🚀 Polling for updates (timeout {}s)", self.poll_timeout_secs);

        loop {
            let polled = tokio::select! {
                _ = &mut shutdown => break,
                polled = self.updates.get_updates(self.offset, self.poll_timeout_secs) => polled,
            };

            match polled {
                Ok(updates) => {
                    self.dispatch(updates).await;
                }
                Err(e) if e.severity() == ErrorSeverity::Critical => {
                    tracing::error!("❌ Giving up on polling: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Polling failed: {}, retrying in {:?}",
                        e,
                        self.retry_delay
                    );
                    tokio::select! {
                        _ = &mut shutdown => break,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }

        tracing::info!("🛑 Shutdown requested, stopped polling");
        Ok(())
    }

    async fn dispatch(&mut self, updates: Vec<Update>) -> usize {
        let received = updates.len();
        if received == 0 {
            return 0;
        }

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset = Some(last + 1);
        }
        tracing::debug!("📥 {} updates, next offset {:?}", received, self.offset);

        let mut set = JoinSet::new();
        for (chat_id, messages) in group_by_chat(updates) {
            let handler = Arc::clone(&self.handler);
            let permits = Arc::clone(&self.permits);

            set.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                for message in messages {
                    if let Err(e) = handler.handle(&message).await {
                        tracing::error!(
                            "❌ chat {}: failed to answer message {}: {}",
                            chat_id,
                            message.message_id,
                            e
                        );
                    }
                }
            });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                tracing::error!("❌ message handler task failed: {}", e);
            }
        }

        received
    }
}

/// Groups message updates per chat, keeping the arrival order both of the
/// chats and of the messages inside each chat.
fn group_by_chat(updates: Vec<Update>) -> Vec<(i64, Vec<Message>)> {
    let mut index: HashMap<i64, usize> = HashMap::new();
    let mut groups: Vec<(i64, Vec<Message>)> = Vec::new();

    for message in updates.into_iter().filter_map(|u| u.message) {
        let chat_id = message.chat.id;
        match index.get(&chat_id) {
            Some(&i) => groups[i].1.push(message),
            None => {
                index.insert(chat_id, groups.len());
                groups.push((chat_id, vec![message]));
            }
        }
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transcript::TranscriptService;
    use crate::core::{Chat, TranscriptEntry};
    use crate::utils::error::BotError;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    fn update(update_id: i64, chat_id: i64, text: &str) -> Update {
        Update {
            update_id,
            message: Some(Message {
                message_id: update_id,
                chat: Chat {
                    id: chat_id,
                    kind: "private".to_string(),
                },
                from: None,
                date: Default::default(),
                text: Some(text.to_string()),
            }),
        }
    }

    struct ScriptedUpdates {
        batches: Mutex<VecDeque<Result<Vec<Update>>>>,
        offsets: Mutex<Vec<Option<i64>>>,
    }

    impl ScriptedUpdates {
        fn new(batches: Vec<Result<Vec<Update>>>) -> Self {
            Self {
                batches: Mutex::new(batches.into()),
                offsets: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl UpdateSource for ScriptedUpdates {
        async fn get_updates(&self, offset: Option<i64>, _timeout: u64) -> Result<Vec<Update>> {
            self.offsets.lock().await.push(offset);
            let next = self.batches.lock().await.pop_front();
            match next {
                Some(batch) => batch,
                None => {
                    // behave like an idle long poll
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingMessenger {
        sent: Arc<Mutex<Vec<(i64, String)>>>,
    }

    #[async_trait]
    impl Messenger for RecordingMessenger {
        async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
            self.sent.lock().await.push((chat_id, text.to_string()));
            Ok(())
        }
    }

    /// Holds every send for a while and remembers how many overlapped.
    #[derive(Clone, Default)]
    struct SlowMessenger {
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Messenger for SlowMessenger {
        async fn send_message(&self, _chat_id: i64, _text: &str) -> Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn peak_concurrency(chats: usize) -> usize {
        let messenger = SlowMessenger::default();
        let handler = MessageHandler::new(
            TranscriptService::new(EchoSource),
            messenger.clone(),
            "en",
            4096,
        );
        let mut dispatcher = Dispatcher::new(
            ScriptedUpdates::new(vec![Ok(vec![
                update(1, 1, "aaaaaaaaaaa"),
                update(2, 2, "bbbbbbbbbbb"),
                update(3, 3, "ccccccccccc"),
            ])]),
            handler,
        )
        .with_concurrent_chats(chats);

        assert_eq!(dispatcher.poll_once().await.unwrap(), 3);
        messenger.peak.load(Ordering::SeqCst)
    }

    struct EchoSource;

    #[async_trait]
    impl TranscriptSource for EchoSource {
        async fn fetch_transcript(
            &self,
            video: &str,
            lang: Option<&str>,
        ) -> Result<Vec<TranscriptEntry>> {
            Ok(vec![TranscriptEntry {
                text: format!("{} captions", video),
                offset: 0.0,
                duration: 1.0,
                lang: lang.unwrap_or("en").to_string(),
            }])
        }
    }

    fn dispatcher(
        batches: Vec<Result<Vec<Update>>>,
    ) -> (
        Dispatcher<ScriptedUpdates, EchoSource, RecordingMessenger>,
        RecordingMessenger,
    ) {
        let messenger = RecordingMessenger::default();
        let handler = MessageHandler::new(
            TranscriptService::new(EchoSource),
            messenger.clone(),
            "en",
            4096,
        );
        let dispatcher = Dispatcher::new(ScriptedUpdates::new(batches), handler)
            .with_retry_delay(Duration::from_millis(10))
            .with_concurrent_chats(2);
        (dispatcher, messenger)
    }

    #[test]
    fn test_group_by_chat_keeps_order() {
        let updates = vec![
            update(1, 10, "a"),
            update(2, 20, "b"),
            update(3, 10, "c"),
            Update {
                update_id: 4,
                message: None,
            },
        ];
        let groups = group_by_chat(updates);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, 10);
        let texts: Vec<_> = groups[0].1.iter().map(|m| m.text().unwrap()).collect();
        assert_eq!(texts, vec!["a", "c"]);
        assert_eq!(groups[1].0, 20);
    }

    #[tokio::test]
    async fn test_poll_once_advances_offset() {
        let (mut dispatcher, messenger) = dispatcher(vec![
            Ok(vec![update(5, 1, "aaaaaaaaaaa"), update(7, 2, "bbbbbbbbbbb")]),
            Ok(vec![]),
        ]);

        assert_eq!(dispatcher.poll_once().await.unwrap(), 2);
        assert_eq!(dispatcher.offset(), Some(8));
        assert_eq!(dispatcher.poll_once().await.unwrap(), 0);
        assert_eq!(dispatcher.offset(), Some(8));

        let offsets = dispatcher.updates.offsets.lock().await.clone();
        assert_eq!(offsets, vec![None, Some(8)]);

        let mut sent = messenger.sent.lock().await.clone();
        sent.sort();
        assert_eq!(
            sent,
            vec![
                (1, "aaaaaaaaaaa captions".to_string()),
                (2, "bbbbbbbbbbb captions".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_messages_of_one_chat_stay_ordered() {
        let (mut dispatcher, messenger) = dispatcher(vec![Ok(vec![
            update(1, 9, "first000000"),
            update(2, 9, "second00000"),
            update(3, 9, "third000000"),
        ])]);

        dispatcher.poll_once().await.unwrap();

        let texts: Vec<String> = messenger
            .sent
            .lock()
            .await
            .iter()
            .map(|(_, t)| t.clone())
            .collect();
        assert_eq!(
            texts,
            vec![
                "first000000 captions",
                "second00000 captions",
                "third000000 captions"
            ]
        );
    }

    #[tokio::test]
    async fn test_run_retries_after_transient_error_and_stops() {
        let (mut dispatcher, messenger) = dispatcher(vec![
            Err(BotError::TelegramApi {
                code: 502,
                description: "Bad Gateway".to_string(),
            }),
            Ok(vec![update(1, 3, "ccccccccccc")]),
        ]);

        let shutdown = tokio::time::sleep(Duration::from_millis(200));
        dispatcher.run(shutdown).await.unwrap();

        let sent = messenger.sent.lock().await.clone();
        assert_eq!(sent, vec![(3, "ccccccccccc captions".to_string())]);
        assert_eq!(dispatcher.offset(), Some(2));
    }

    #[tokio::test]
    async fn test_run_stops_on_critical_error() {
        let (mut dispatcher, _messenger) = dispatcher(vec![Err(BotError::TelegramApi {
            code: 401,
            description: "Unauthorized".to_string(),
        })]);

        let result = dispatcher.run(std::future::pending::<()>()).await;

        assert!(matches!(result, Err(BotError::TelegramApi { code: 401, .. })));
    }

    #[tokio::test]
    async fn test_concurrent_chats_bounds_parallel_chats() {
        assert_eq!(peak_concurrency(1).await, 1);
        assert_eq!(peak_concurrency(2).await, 2);
    }
}
