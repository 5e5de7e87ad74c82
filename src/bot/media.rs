//! Media extraction from Telegram messages
//!
//! Maps a Telegram video or document onto the relay's attachment types and
//! downloads the file through the Bot API.

use crate::relay::attachment::{AttachmentKind, AttachmentMeta, IncomingAttachment};
use crate::relay::{Downloader, RelayError};
use anyhow::Result;
use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tracing::info;

/// Raw metadata of the video (preferred) or document in `msg`
#[must_use]
pub fn attachment_meta(msg: &Message) -> Option<AttachmentMeta> {
    if let Some(video) = msg.video() {
        return Some(AttachmentMeta {
            kind: AttachmentKind::Video,
            file_name: video.file_name.clone(),
            file_id: video.file.id.0.clone(),
            unique_id: video.file.unique_id.0.clone(),
        });
    }

    msg.document().map(|doc| AttachmentMeta {
        kind: AttachmentKind::Document,
        file_name: doc.file_name.clone(),
        file_id: doc.file.id.0.clone(),
        unique_id: doc.file.unique_id.0.clone(),
    })
}

/// Classify the attachment of `msg`; `Ok(None)` if it carries no video or document.
///
/// # Errors
///
/// Returns `RelayError::Classify` if the attachment metadata is unusable.
pub fn classify_message(msg: &Message) -> Result<Option<IncomingAttachment>, RelayError> {
    attachment_meta(msg)
        .map(IncomingAttachment::classify)
        .transpose()
}

/// Downloads files through the Bot API into memory
pub struct TelegramDownloader {
    bot: Bot,
}

impl TelegramDownloader {
    /// Create a downloader for `bot`
    #[must_use]
    pub const fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Downloader for TelegramDownloader {
    async fn download(&self, remote_handle: &str) -> Result<Vec<u8>> {
        let file = self.bot.get_file(FileId(remote_handle.to_string())).await?;
        let mut buf = Vec::new();
        self.bot.download_file(&file.path, &mut buf).await?;

        info!(size = buf.len(), "Downloaded file from Telegram");
        Ok(buf)
    }
}
