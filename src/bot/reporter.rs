//! Status reporting through the Telegram Bot API.
//!
//! All texts are sent with HTML parse mode; callers escape user content.

use crate::relay::{StatusMessage, StatusReporter};
use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode};
use teloxide::{ApiError, RequestError};
use tracing::debug;

/// Reports relay progress into one chat
pub struct TelegramStatusReporter {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramStatusReporter {
    /// Create a reporter for `chat_id`
    #[must_use]
    pub const fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl StatusReporter for TelegramStatusReporter {
    async fn send(&self, text: &str) -> Result<StatusMessage> {
        let sent = self
            .bot
            .send_message(self.chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))?;
        Ok(StatusMessage { id: sent.id.0 })
    }

    async fn edit(&self, status: &StatusMessage, text: &str) -> Result<()> {
        match self
            .bot
            .edit_message_text(self.chat_id, MessageId(status.id), text)
            .parse_mode(ParseMode::Html)
            .await
        {
            Ok(_) => Ok(()),
            Err(RequestError::Api(ApiError::MessageNotModified)) => {
                debug!("Message update skipped: message is not modified");
                Ok(())
            }
            Err(e) => Err(anyhow::anyhow!("Telegram edit error: {e}")),
        }
    }
}
