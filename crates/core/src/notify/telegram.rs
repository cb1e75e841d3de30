use reqwest::Client;
use serde_json::json;

use super::{Notification, NotificationSink};

/// Telegram's limit for one message.
pub const MAX_MESSAGE_LEN: usize = 4096;

/// Split `text` into chunks of at most `MAX_MESSAGE_LEN` characters,
/// preferring newline boundaries.
pub fn split_message(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= MAX_MESSAGE_LEN {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + MAX_MESSAGE_LEN).min(chars.len());
        let chunk = &chars[start..end];
        let split_at = if end < chars.len() {
            chunk
                .iter()
                .rposition(|c| *c == '\n')
                .map(|p| p + 1)
                .unwrap_or(chunk.len())
        } else {
            chunk.len()
        };
        chunks.push(chars[start..start + split_at].iter().collect());
        start += split_at;
    }
    chunks
}

/// Sends notifications to one Telegram chat through the Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    bot_token: String,
    chat_id: String,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn send_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base,
            urlencoding::encode(&self.bot_token)
        )
    }

    async fn send(&self, text: String) {
        for chunk in split_message(&text) {
            let body = json!({ "chat_id": self.chat_id, "text": chunk });
            match self.client.post(self.send_url()).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => {
                    tracing::warn!(status = %resp.status(), "Telegram sendMessage rejected");
                    return;
                }
                Err(e) => {
                    tracing::warn!("Telegram sendMessage failed: {}", e);
                    return;
                }
            }
        }
    }
}

impl NotificationSink for TelegramNotifier {
    fn notify(&self, notification: Notification) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, dropping notification");
            return;
        };

        let notifier = self.clone();
        let text = notification.render();
        runtime.spawn(async move { notifier.send(text).await });
    }
}
