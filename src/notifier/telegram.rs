// src/notifier/telegram.rs
use crate::domain::errors::{NotificationError, NotificationResult};
use crate::notifier::Notifier;
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Method, Request};
use hyper_tls::HttpsConnector;

/// Telegram bot-API transport. Messages go out as HTML so reports can carry
/// the same markup the channel has always used.
pub struct TelegramNotifier {
    client: Client<HttpsConnector<HttpConnector>>,
    url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Self {
        let https = HttpsConnector::new();
        let client = Client::builder().build::<_, Body>(https);

        Self {
            client,
            url: format!("https://api.telegram.org/bot{}/sendMessage", bot_token),
            chat_id: chat_id.to_string(),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> NotificationResult<()> {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "HTML",
        });

        let request = Request::builder()
            .method(Method::POST)
            .uri(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .map_err(|e| NotificationError::Request(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| NotificationError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotificationError::Rejected(format!(
                "Telegram responded {}",
                response.status()
            )));
        }

        Ok(())
    }
}
