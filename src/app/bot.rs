use crate::adapters::{TelegramClient, YoutubeClient};
use crate::config::BotConfig;
use crate::core::dispatcher::Dispatcher;
use crate::core::handler::MessageHandler;
use crate::core::transcript::TranscriptService;
use crate::core::User;
use crate::utils::error::Result;
use std::future::Future;
use std::time::Duration;

pub type TofuboiDispatcher = Dispatcher<TelegramClient, YoutubeClient, TelegramClient>;

/// A fully assembled bot: Telegram on both ends, YouTube as the transcript source.
pub struct Bot {
    telegram: TelegramClient,
    dispatcher: TofuboiDispatcher,
}

impl Bot {
    /// Builds the clients from an already validated configuration.
    pub fn from_config(config: &BotConfig) -> Result<Self> {
        let telegram = TelegramClient::with_timeout(
            &config.telegram.api_url,
            &config.telegram.token,
            Duration::from_secs(config.telegram.request_timeout_seconds),
        )?
        .with_retry_attempts(config.telegram.retry_attempts);

        let youtube = YoutubeClient::with_timeout(
            &config.youtube.base_url,
            Duration::from_secs(config.youtube.request_timeout_seconds),
        )?
        .with_user_agent(&config.youtube.user_agent);

        let handler = MessageHandler::new(
            TranscriptService::with_fallbacks(youtube, config.youtube.fallback_languages.clone()),
            telegram.clone(),
            &config.youtube.default_language,
            config.delivery.max_message_bytes,
        );

        let dispatcher = Dispatcher::new(telegram.clone(), handler)
            .with_poll_timeout(config.telegram.poll_timeout_seconds)
            .with_retry_delay(Duration::from_secs(config.telegram.retry_delay_seconds))
            .with_concurrent_chats(config.delivery.concurrent_chats);

        Ok(Self {
            telegram,
            dispatcher,
        })
    }

    /// Checks the token against the Bot API and returns the bot's account.
    pub async fn identify(&self) -> Result<User> {
        self.telegram.get_me().await
    }

    pub fn dispatcher_mut(&mut self) -> &mut TofuboiDispatcher {
        &mut self.dispatcher
    }

    pub async fn run<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.dispatcher.run(shutdown).await
    }
}
