//! Media relay pipeline
//!
//! Takes one classified attachment through download → upload → shared link →
//! streamable link, keeping the sender informed through a single status
//! message that is edited in place. Transport specifics live behind the
//! [`Downloader`] and [`StatusReporter`] seams; storage behind
//! [`FileStorage`].

pub mod attachment;
pub mod link;

use crate::storage::{FileStorage, StorageError};
use anyhow::Result;
use async_trait::async_trait;
use attachment::{IncomingAttachment, UploadTarget};
use link::{ShareableLink, StreamableLink};
use thiserror::Error;
use tracing::{error, info, warn};

/// Reply for messages without a video or document
pub const UNSUPPORTED_TEXT: &str = "This doesn't seem to be a video or a file I can handle.";
/// Progress text after the download finished
pub const DOWNLOADED_TEXT: &str = "File downloaded. Uploading to Dropbox...";
/// Progress text after the upload finished
pub const UPLOADED_TEXT: &str = "Upload complete! Generating a shareable link...";
/// Generic failure text shown to the sender
pub const ERROR_TEXT: &str =
    "❌ <b>Error:</b> Something went wrong. The developers have been notified.";

/// Failure of one pipeline stage, with its cause
#[derive(Debug, Error)]
pub enum RelayError {
    /// Attachment metadata could not be turned into an upload
    #[error("Invalid attachment metadata: {0}")]
    Classify(String),
    /// Fetching the bytes from the messaging platform failed
    #[error("Download failed: {0:#}")]
    Download(anyhow::Error),
    /// Writing to storage failed
    #[error("Upload failed: {0}")]
    Upload(#[source] StorageError),
    /// Creating the shared link failed (the upload itself is kept)
    #[error("Shared link creation failed: {0}")]
    ShareLink(#[source] StorageError),
}

/// Status message that is edited as the relay progresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusMessage {
    /// Platform message id
    pub id: i32,
}

/// Fetches attachment bytes from the messaging platform
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Download the whole file behind `remote_handle` into memory
    async fn download(&self, remote_handle: &str) -> Result<Vec<u8>>;
}

/// Sends and edits HTML-formatted messages in the originating conversation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusReporter: Send + Sync {
    /// Reply to the sender
    async fn send(&self, text: &str) -> Result<StatusMessage>;
    /// Replace the text of a previously sent message
    async fn edit(&self, status: &StatusMessage, text: &str) -> Result<()>;
}

/// What happened to one inbound message
#[derive(Debug)]
pub enum RelayOutcome {
    /// No video or document; the rejection notice was sent
    Unsupported,
    /// The streamable link was reported
    Delivered(StreamableLink),
    /// A stage failed; the generic error was reported
    Failed(RelayError),
}

/// Progress text sent when an attachment is accepted
#[must_use]
pub fn processing_text(file_name: &str) -> String {
    format!("Processing '{}'...", html_escape::encode_text(file_name))
}

/// Final text carrying the streamable link
#[must_use]
pub fn success_text(file_name: &str, link: &StreamableLink) -> String {
    format!(
        "✅ <b>Success!</b>\n\nYour direct streamable link for <b>{}</b> is ready:\n\n<code>{}</code>",
        html_escape::encode_text(file_name),
        html_escape::encode_text(link.as_str())
    )
}

/// Relays attachments into one storage folder
pub struct MediaRelay {
    upload_dir: String,
}

impl MediaRelay {
    /// Create a relay writing under `upload_dir`
    #[must_use]
    pub fn new(upload_dir: impl Into<String>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
        }
    }

    /// Folder uploads land in
    #[must_use]
    pub fn upload_dir(&self) -> &str {
        &self.upload_dir
    }

    /// Handle one inbound message.
    ///
    /// `classified` is the attachment found in the message: `Ok(None)` when
    /// there is none, `Err` when its metadata is unusable. Stage failures are
    /// reported to the sender and returned as [`RelayOutcome::Failed`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the first reply to the sender cannot be sent.
    pub async fn handle(
        &self,
        classified: Result<Option<IncomingAttachment>, RelayError>,
        downloader: &dyn Downloader,
        storage: &dyn FileStorage,
        reporter: &dyn StatusReporter,
    ) -> Result<RelayOutcome> {
        let attachment = match classified {
            Ok(Some(attachment)) => attachment,
            Ok(None) => {
                reporter.send(UNSUPPORTED_TEXT).await?;
                return Ok(RelayOutcome::Unsupported);
            }
            Err(e) => {
                error!("Relay failed before start: {e}");
                reporter.send(ERROR_TEXT).await?;
                return Ok(RelayOutcome::Failed(e));
            }
        };

        let file_name = attachment.file_name();
        info!(file_name = %file_name, kind = ?attachment.kind(), "Relaying attachment");
        let status = reporter.send(&processing_text(file_name)).await?;

        match self.relay(&attachment, &status, downloader, storage, reporter).await {
            Ok(link) => {
                info!(file_name = %file_name, link = %link, "Relay completed");
                if let Err(e) = reporter.edit(&status, &success_text(file_name, &link)).await {
                    error!(file_name = %file_name, "Failed to report streamable link: {e:#}");
                }
                Ok(RelayOutcome::Delivered(link))
            }
            Err(e) => {
                error!(file_name = %file_name, "An error occurred: {e}");
                if let Err(report_err) = reporter.edit(&status, ERROR_TEXT).await {
                    error!(file_name = %file_name, "Failed to report relay error: {report_err:#}");
                }
                Ok(RelayOutcome::Failed(e))
            }
        }
    }

    async fn relay(
        &self,
        attachment: &IncomingAttachment,
        status: &StatusMessage,
        downloader: &dyn Downloader,
        storage: &dyn FileStorage,
        reporter: &dyn StatusReporter,
    ) -> Result<StreamableLink, RelayError> {
        let bytes = downloader
            .download(attachment.remote_handle())
            .await
            .map_err(RelayError::Download)?;
        progress(reporter, status, DOWNLOADED_TEXT).await;

        let target = UploadTarget::new(&self.upload_dir, attachment.file_name())?;
        storage
            .upload(target.path(), bytes)
            .await
            .map_err(RelayError::Upload)?;
        progress(reporter, status, UPLOADED_TEXT).await;

        let shared = storage
            .create_shared_link(target.path())
            .await
            .map_err(RelayError::ShareLink)?;
        Ok(ShareableLink(shared).to_streamable())
    }
}

/// Best-effort progress update; a failed edit never aborts the relay.
async fn progress(reporter: &dyn StatusReporter, status: &StatusMessage, text: &str) {
    if let Err(e) = reporter.edit(status, text).await {
        warn!("Failed to update progress message: {e:#}");
    }
}

#[cfg(test)]
mod tests {
    use super::attachment::{AttachmentKind, AttachmentMeta};
    use super::*;
    use crate::storage::MockFileStorage;
    use crate::testing::CapturedLogs;
    use std::sync::{Arc, Mutex};

    const STATUS: StatusMessage = StatusMessage { id: 42 };

    fn video(name: Option<&str>) -> IncomingAttachment {
        IncomingAttachment::classify(AttachmentMeta {
            kind: AttachmentKind::Video,
            file_name: name.map(ToString::to_string),
            file_id: "file-id".to_string(),
            unique_id: "uniq".to_string(),
        })
        .expect("valid attachment")
    }

    /// Reporter that records every edit and allows exactly one reply
    fn recording_reporter(edits: Arc<Mutex<Vec<String>>>) -> MockStatusReporter {
        let mut reporter = MockStatusReporter::new();
        reporter
            .expect_send()
            .times(1)
            .returning(|_| Ok(STATUS));
        reporter.expect_edit().returning(move |status, text| {
            assert_eq!(*status, STATUS);
            edits.lock().expect("edits lock").push(text.to_string());
            Ok(())
        });
        reporter
    }

    fn downloader_returning(bytes: &'static [u8]) -> MockDownloader {
        let mut downloader = MockDownloader::new();
        downloader
            .expect_download()
            .withf(|handle| handle.to_string() == "file-id")
            .times(1)
            .returning(move |_| Ok(bytes.to_vec()));
        downloader
    }

    #[tokio::test]
    async fn test_relays_video_and_reports_streamable_link() {
        let edits = Arc::new(Mutex::new(Vec::new()));
        let reporter = recording_reporter(edits.clone());
        let downloader = downloader_returning(b"video-bytes");

        let mut storage = MockFileStorage::new();
        storage
            .expect_upload()
            .withf(|path, contents| {
                path.to_string() == "/Telegram Videos/clip.mov" && contents.as_slice() == b"video-bytes"
            })
            .times(1)
            .returning(|_, _| Ok(()));
        storage
            .expect_create_shared_link()
            .withf(|path| path.to_string() == "/Telegram Videos/clip.mov")
            .times(1)
            .returning(|_| Ok("https://example.com/s/abc?dl=0".to_string()));

        let relay = MediaRelay::new("/Telegram Videos");
        let outcome = relay
            .handle(Ok(Some(video(Some("clip.mov")))), &downloader, &storage, &reporter)
            .await
            .expect("first reply is sent");

        match outcome {
            RelayOutcome::Delivered(link) => {
                assert_eq!(link.as_str(), "https://example.com/s/abc?raw=1");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let edits = edits.lock().expect("edits lock");
        assert_eq!(edits.len(), 3);
        assert_eq!(edits[0], DOWNLOADED_TEXT);
        assert_eq!(edits[1], UPLOADED_TEXT);
        assert!(edits[2].contains("<b>clip.mov</b>"));
        assert!(edits[2].contains("<code>https://example.com/s/abc?raw=1</code>"));
    }

    #[tokio::test]
    async fn test_message_without_media_is_rejected_once() {
        let mut reporter = MockStatusReporter::new();
        reporter
            .expect_send()
            .withf(|text| text.to_string() == UNSUPPORTED_TEXT)
            .times(1)
            .returning(|_| Ok(STATUS));
        reporter.expect_edit().never();
        let mut downloader = MockDownloader::new();
        downloader.expect_download().never();
        let mut storage = MockFileStorage::new();
        storage.expect_upload().never();
        storage.expect_create_shared_link().never();

        let outcome = MediaRelay::new("/Telegram Videos")
            .handle(Ok(None), &downloader, &storage, &reporter)
            .await
            .expect("reply is sent");
        assert!(matches!(outcome, RelayOutcome::Unsupported));
    }

    #[tokio::test]
    async fn test_upload_failure_edits_status_to_error() {
        let edits = Arc::new(Mutex::new(Vec::new()));
        let reporter = recording_reporter(edits.clone());
        let downloader = downloader_returning(b"data");

        let mut storage = MockFileStorage::new();
        storage
            .expect_upload()
            .times(1)
            .returning(|_, _| Err(StorageError::Network("connection reset".into())));
        storage.expect_create_shared_link().never();

        let outcome = MediaRelay::new("/Telegram Videos")
            .handle(Ok(Some(video(Some("clip.mov")))), &downloader, &storage, &reporter)
            .await
            .expect("first reply is sent");
        assert!(matches!(
            outcome,
            RelayOutcome::Failed(RelayError::Upload(StorageError::Network(_)))
        ));

        let edits = edits.lock().expect("edits lock");
        assert_eq!(edits.as_slice(), [DOWNLOADED_TEXT, ERROR_TEXT]);
    }

    #[tokio::test]
    async fn test_download_failure_skips_storage() {
        let edits = Arc::new(Mutex::new(Vec::new()));
        let reporter = recording_reporter(edits.clone());
        let mut downloader = MockDownloader::new();
        downloader
            .expect_download()
            .returning(|_| Err(anyhow::anyhow!("file is too big")));
        let mut storage = MockFileStorage::new();
        storage.expect_upload().never();

        let outcome = MediaRelay::new("/Telegram Videos")
            .handle(Ok(Some(video(None))), &downloader, &storage, &reporter)
            .await
            .expect("first reply is sent");
        match outcome {
            RelayOutcome::Failed(e @ RelayError::Download(_)) => {
                assert!(e.to_string().contains("file is too big"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(edits.lock().expect("edits lock").as_slice(), [ERROR_TEXT]);
    }

    #[tokio::test]
    async fn test_failure_is_logged_once_with_cause() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();

        let reporter = recording_reporter(Arc::new(Mutex::new(Vec::new())));
        let mut downloader = MockDownloader::new();
        downloader
            .expect_download()
            .returning(|_| Err(anyhow::anyhow!("file is too big")));
        let storage = MockFileStorage::new();

        MediaRelay::new("/Telegram Videos")
            .handle(Ok(Some(video(Some("clip.mov")))), &downloader, &storage, &reporter)
            .await
            .expect("first reply is sent");

        let errors = logs.lines_at("ERROR");
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert!(errors[0].contains("file is too big"));
        assert!(errors[0].contains("clip.mov"));
    }

    #[tokio::test]
    async fn test_share_link_failure_keeps_upload() {
        let edits = Arc::new(Mutex::new(Vec::new()));
        let reporter = recording_reporter(edits.clone());
        let downloader = downloader_returning(b"data");

        let mut storage = MockFileStorage::new();
        storage.expect_upload().times(1).returning(|_, _| Ok(()));
        storage.expect_create_shared_link().times(1).returning(|_| {
            Err(StorageError::Api {
                status: 409,
                summary: "email_not_verified/..".into(),
            })
        });

        let outcome = MediaRelay::new("/Telegram Videos")
            .handle(Ok(Some(video(None))), &downloader, &storage, &reporter)
            .await
            .expect("first reply is sent");
        assert!(matches!(
            outcome,
            RelayOutcome::Failed(RelayError::ShareLink(_))
        ));
        assert_eq!(
            edits.lock().expect("edits lock").as_slice(),
            [DOWNLOADED_TEXT, UPLOADED_TEXT, ERROR_TEXT]
        );
    }

    #[tokio::test]
    async fn test_classification_failure_replies_with_error() {
        let mut reporter = MockStatusReporter::new();
        reporter
            .expect_send()
            .withf(|text| text.to_string() == ERROR_TEXT)
            .times(1)
            .returning(|_| Ok(STATUS));
        reporter.expect_edit().never();
        let downloader = MockDownloader::new();
        let storage = MockFileStorage::new();

        let outcome = MediaRelay::new("/Telegram Videos")
            .handle(
                Err(RelayError::Classify("no file id".into())),
                &downloader,
                &storage,
                &reporter,
            )
            .await
            .expect("reply is sent");
        assert!(matches!(outcome, RelayOutcome::Failed(RelayError::Classify(_))));
    }

    #[tokio::test]
    async fn test_progress_edit_failure_does_not_abort() {
        let mut reporter = MockStatusReporter::new();
        reporter.expect_send().times(1).returning(|_| Ok(STATUS));
        reporter
            .expect_edit()
            .times(3)
            .returning(|_, _| Err(anyhow::anyhow!("message is not modified")));
        let downloader = downloader_returning(b"data");
        let mut storage = MockFileStorage::new();
        storage.expect_upload().returning(|_, _| Ok(()));
        storage
            .expect_create_shared_link()
            .returning(|_| Ok("https://example.com/s/x?dl=0".to_string()));

        let outcome = MediaRelay::new("")
            .handle(Ok(Some(video(Some("a.mp4")))), &downloader, &storage, &reporter)
            .await
            .expect("first reply is sent");
        assert!(matches!(outcome, RelayOutcome::Delivered(_)));
    }

    #[tokio::test]
    async fn test_failed_first_reply_is_an_error() {
        let mut reporter = MockStatusReporter::new();
        reporter
            .expect_send()
            .returning(|_| Err(anyhow::anyhow!("chat not found")));
        let mut downloader = MockDownloader::new();
        downloader.expect_download().never();
        let storage = MockFileStorage::new();

        let result = MediaRelay::new("/Telegram Videos")
            .handle(Ok(Some(video(None))), &downloader, &storage, &reporter)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_texts_escape_user_content() {
        assert_eq!(processing_text("a<b>.mp4"), "Processing 'a&lt;b&gt;.mp4'...");
        let link = ShareableLink("https://e.com/s/x?dl=0&a=1".into()).to_streamable();
        let text = success_text("x&y.mov", &link);
        assert!(text.contains("<b>x&amp;y.mov</b>"));
        assert!(text.contains("<code>https://e.com/s/x?raw=1&amp;a=1</code>"));
    }
}
