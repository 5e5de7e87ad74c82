//! Attachment classification and upload path computation.

use super::RelayError;

/// Prefix of file names synthesized for videos sent without one
pub const VIDEO_NAME_PREFIX: &str = "telegram_video";
/// Extension of file names synthesized for videos
pub const VIDEO_DEFAULT_EXTENSION: &str = "mp4";
/// Prefix of file names synthesized for documents sent without one
pub const DOCUMENT_NAME_PREFIX: &str = "telegram_document";
/// Extension of file names synthesized for documents
pub const DOCUMENT_DEFAULT_EXTENSION: &str = "bin";

/// Kind of media the relay accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    /// Telegram video
    Video,
    /// Generic document (any file)
    Document,
}

/// Raw attachment metadata as reported by the messaging platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMeta {
    /// Attachment kind
    pub kind: AttachmentKind,
    /// Declared file name, if the platform has one
    pub file_name: Option<String>,
    /// Opaque id used to fetch the bytes
    pub file_id: String,
    /// Stable unique id of the file
    pub unique_id: String,
}

/// Classified attachment with a resolved, non-empty file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingAttachment {
    kind: AttachmentKind,
    file_name: String,
    remote_handle: String,
}

impl IncomingAttachment {
    /// Classify platform metadata.
    ///
    /// Videos without a name get `telegram_video_<unique_id>.mp4`, documents
    /// without a name get `telegram_document_<unique_id>.bin`. A declared
    /// document name is kept verbatim.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Classify` when the metadata has no file id, or when
    /// a name has to be synthesized but the unique id is empty.
    pub fn classify(meta: AttachmentMeta) -> Result<Self, RelayError> {
        if meta.file_id.trim().is_empty() {
            return Err(RelayError::Classify("attachment has no file id".into()));
        }

        let declared = meta.file_name.filter(|name| !name.is_empty());
        let file_name = match declared {
            Some(name) => name,
            None => {
                let (prefix, extension) = match meta.kind {
                    AttachmentKind::Video => (VIDEO_NAME_PREFIX, VIDEO_DEFAULT_EXTENSION),
                    AttachmentKind::Document => {
                        (DOCUMENT_NAME_PREFIX, DOCUMENT_DEFAULT_EXTENSION)
                    }
                };
                synthesize_file_name(prefix, &meta.unique_id, extension)?
            }
        };

        Ok(Self {
            kind: meta.kind,
            file_name,
            remote_handle: meta.file_id,
        })
    }

    /// Attachment kind
    #[must_use]
    pub const fn kind(&self) -> AttachmentKind {
        self.kind
    }

    /// Resolved file name, never empty
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Opaque handle the downloader fetches bytes with
    #[must_use]
    pub fn remote_handle(&self) -> &str {
        &self.remote_handle
    }
}

fn synthesize_file_name(
    prefix: &str,
    unique_id: &str,
    extension: &str,
) -> Result<String, RelayError> {
    if unique_id.trim().is_empty() {
        return Err(RelayError::Classify(
            "attachment has neither a file name nor a unique id".into(),
        ));
    }
    Ok(format!("{prefix}_{unique_id}.{extension}"))
}

/// Storage path an attachment is written to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    path: String,
}

impl UploadTarget {
    /// Join the base directory and the file name.
    ///
    /// `base_dir` is expected in the form produced by
    /// [`crate::config::normalize_upload_dir`]; the file name is not sanitized.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::Classify` if `file_name` is empty.
    pub fn new(base_dir: &str, file_name: &str) -> Result<Self, RelayError> {
        if file_name.is_empty() {
            return Err(RelayError::Classify("empty file name".into()));
        }
        let base = base_dir.trim_end_matches('/');
        Ok(Self {
            path: format!("{base}/{file_name}"),
        })
    }

    /// Full storage path
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}
