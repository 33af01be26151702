//! Outbound messaging port (Telegram today).

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    Result,
};

#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;
}
