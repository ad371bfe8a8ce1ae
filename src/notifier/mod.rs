// src/notifier/mod.rs
pub mod format;
pub mod telegram;

pub use telegram::TelegramNotifier;

use crate::domain::errors::NotificationResult;
use async_trait::async_trait;

/// Outbound alert channel. Delivery failure is the caller's to log; it must
/// never fail a trading cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> NotificationResult<()>;
}
