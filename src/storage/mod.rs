//! Storage layer for relayed files
//!
//! Defines the [`FileStorage`] seam used by the relay pipeline and its Dropbox
//! implementation.

pub mod dropbox;

use async_trait::async_trait;
use thiserror::Error;

pub use dropbox::{DropboxEndpoints, DropboxStorage};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Error during network communication
    #[error("Network error: {0}")]
    Network(String),
    /// Non-success response from the provider
    #[error("API error: {status} - {summary}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Provider error summary (or truncated body)
        summary: String,
    },
    /// Error during JSON serialization or deserialization
    #[error("JSON error: {0}")]
    Json(String),
    /// Access token could not be obtained
    #[error("Authentication error: {0}")]
    Auth(String),
}

/// Interface for storage providers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Write `contents` to `path`, replacing any existing file
    async fn upload(&self, path: &str, contents: Vec<u8>) -> Result<(), StorageError>;
    /// Create (or fetch the existing) shareable link for `path`
    async fn create_shared_link(&self, path: &str) -> Result<String, StorageError>;
    /// Check that the credentials are usable
    async fn check_connection(&self) -> Result<(), StorageError>;
}
