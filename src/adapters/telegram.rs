use crate::core::{Messenger, Update, UpdateSource, User};
use crate::domain::model::ApiResponse;
use crate::utils::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Outcome of one Bot API call that came back `ok: false`.
enum ApiFailure {
    RetryAfter(u64),
    Fatal(BotError),
}

/// Minimal Bot API client over HTTPS long polling.
#[derive(Clone)]
pub struct TelegramClient {
    client: Client,
    api_url: String,
    token: String,
    retry_attempts: u32,
}

// the token must never end up in logs
impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_url", &self.api_url)
            .field("retry_attempts", &self.retry_attempts)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_client(Client::new(), api_url, token)
    }

    /// `request_timeout` must be longer than the long-poll timeout.
    pub fn with_timeout(
        api_url: impl Into<String>,
        token: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self::with_client(client, api_url, token))
    }

    pub fn with_client(client: Client, api_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            retry_attempts: 3,
        }
    }

    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn call_once<P, T>(&self, method: &str, payload: &P) -> Result<std::result::Result<T, ApiFailure>>
    where
        P: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            // reqwest errors carry the URL, which contains the token
            .map_err(|e| BotError::HttpError(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BotError::HttpError(e.without_url()))?;
        let reply: ApiResponse<T> = serde_json::from_str(&body)?;

        if reply.ok {
            return match reply.result {
                Some(result) => Ok(Ok(result)),
                None => Err(BotError::ProcessingError {
                    message: format!("{} returned ok without a result", method),
                }),
            };
        }

        let code = reply.error_code.unwrap_or(i64::from(status.as_u16()));
        if let Some(retry_after) = reply.parameters.as_ref().and_then(|p| p.retry_after) {
            return Ok(Err(ApiFailure::RetryAfter(retry_after)));
        }

        Ok(Err(ApiFailure::Fatal(BotError::TelegramApi {
            code,
            description: reply
                .description
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string()),
        })))
    }

    /// Calls a Bot API method, honouring `retry_after` flood-control replies
    /// up to `retry_attempts` times.
    pub async fn call<P, T>(&self, method: &str, payload: &P) -> Result<T>
    where
        P: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut attempt = 0;
        loop {
            match self.call_once(method, payload).await? {
                Ok(result) => return Ok(result),
                Err(ApiFailure::RetryAfter(secs)) if attempt < self.retry_attempts => {
                    attempt += 1;
                    tracing::warn!(
                        "⏳ {} rate limited, retrying in {}s ({}/{})",
                        method,
                        secs,
                        attempt,
                        self.retry_attempts
                    );
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                }
                Err(ApiFailure::RetryAfter(secs)) => {
                    return Err(BotError::TelegramApi {
                        code: 429,
                        description: format!("Too Many Requests: retry after {}", secs),
                    });
                }
                Err(ApiFailure::Fatal(e)) => return Err(e),
            }
        }
    }

    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &serde_json::json!({})).await
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut payload = serde_json::json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            payload["offset"] = serde_json::json!(offset);
        }
        self.call("getUpdates", &payload).await
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        // the sent Message is returned but nothing reads it
        let _: serde_json::Value = self.call("sendMessage", &payload).await?;
        Ok(())
    }
}
