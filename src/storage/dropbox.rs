//! Dropbox HTTP API client
//!
//! Talks to the Dropbox v2 API directly with `reqwest`: refresh-token exchange,
//! file upload in overwrite mode and shared link creation.

use super::{FileStorage, StorageError};
use crate::config::DropboxCredentials;
use async_trait::async_trait;
use reqwest::{Client as HttpClient, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Maximum length of a non-JSON error body kept in error messages
const ERROR_BODY_LIMIT: usize = 500;

/// Base URLs of the Dropbox services
#[derive(Debug, Clone)]
pub struct DropboxEndpoints {
    /// RPC endpoints (`/2/sharing/...`, `/oauth2/token`)
    pub api: String,
    /// Content upload/download endpoints (`/2/files/upload`)
    pub content: String,
    /// Web host serving the OAuth authorize page
    pub web: String,
}

impl Default for DropboxEndpoints {
    fn default() -> Self {
        Self {
            api: "https://api.dropboxapi.com".to_string(),
            content: "https://content.dropboxapi.com".to_string(),
            web: "https://www.dropbox.com".to_string(),
        }
    }
}

impl DropboxEndpoints {
    /// Point every service at one base URL (used against mock servers)
    #[must_use]
    pub fn single(base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        Self {
            api: base.clone(),
            content: base.clone(),
            web: base,
        }
    }

    pub(crate) fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.api)
    }
}

/// Response of the `/oauth2/token` endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// Short-lived bearer token
    pub access_token: String,
    /// Long-lived refresh token (only for `authorization_code` grants)
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Dropbox account the token belongs to
    #[serde(default)]
    pub account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SharedLinkMetadata {
    url: String,
}

/// Post a grant to the token endpoint, authenticating as the app.
pub(crate) async fn request_token(
    http: &HttpClient,
    endpoints: &DropboxEndpoints,
    app_key: &str,
    app_secret: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse, StorageError> {
    let response = http
        .post(endpoints.token_url())
        .basic_auth(app_key, Some(app_secret))
        .form(params)
        .send()
        .await
        .map_err(|e| StorageError::Network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(api_error(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| StorageError::Json(e.to_string()))
}

/// Dropbox-backed storage bound to one set of credentials.
///
/// The access token is fetched on first use and kept for the lifetime of the
/// instance only; the relay creates one instance per operation.
pub struct DropboxStorage {
    http: HttpClient,
    endpoints: DropboxEndpoints,
    credentials: DropboxCredentials,
    access_token: OnceCell<String>,
}

impl DropboxStorage {
    /// Create a new storage instance against the public Dropbox endpoints
    #[must_use]
    pub fn new(credentials: DropboxCredentials, http: HttpClient) -> Self {
        Self {
            http,
            endpoints: DropboxEndpoints::default(),
            credentials,
            access_token: OnceCell::new(),
        }
    }

    /// Use custom endpoints
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: DropboxEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    async fn access_token(&self) -> Result<&str, StorageError> {
        let token = self
            .access_token
            .get_or_try_init(|| async {
                debug!("Refreshing Dropbox access token");
                let grant = request_token(
                    &self.http,
                    &self.endpoints,
                    &self.credentials.app_key,
                    &self.credentials.app_secret,
                    &[
                        ("grant_type", "refresh_token"),
                        ("refresh_token", self.credentials.refresh_token.as_str()),
                    ],
                )
                .await
                .map_err(|e| StorageError::Auth(e.to_string()))?;
                Ok::<_, StorageError>(grant.access_token)
            })
            .await?;
        Ok(token.as_str())
    }
}

#[async_trait]
impl FileStorage for DropboxStorage {
    async fn upload(&self, path: &str, contents: Vec<u8>) -> Result<(), StorageError> {
        let token = self.access_token().await?;
        let size = contents.len();
        let arg = json!({
            "path": path,
            "mode": "overwrite",
            "autorename": false,
            "mute": false,
        });

        let response = self
            .http
            .post(format!("{}/2/files/upload", self.endpoints.content))
            .bearer_auth(token)
            .header("Dropbox-API-Arg", header_safe_json(&arg))
            .header("Content-Type", "application/octet-stream")
            .body(contents)
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        info!(path = %path, size, "Uploaded file to Dropbox");
        Ok(())
    }

    async fn create_shared_link(&self, path: &str) -> Result<String, StorageError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .post(format!(
                "{}/2/sharing/create_shared_link_with_settings",
                self.endpoints.api
            ))
            .bearer_auth(token)
            .json(&json!({ "path": path }))
            .send()
            .await
            .map_err(|e| StorageError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let metadata: SharedLinkMetadata = response
                .json()
                .await
                .map_err(|e| StorageError::Json(e.to_string()))?;
            return Ok(metadata.url);
        }

        let body = response.text().await.unwrap_or_default();
        if let Some(url) = existing_link_url(&body) {
            debug!(path = %path, "Reusing existing shared link");
            return Ok(url);
        }
        Err(error_from_body(status.as_u16(), &body))
    }

    async fn check_connection(&self) -> Result<(), StorageError> {
        self.access_token().await?;
        info!("Dropbox credentials verified.");
        Ok(())
    }
}

/// URL of an already existing link, from a `shared_link_already_exists` error
fn existing_link_url(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/shared_link_already_exists/metadata/url")
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

async fn api_error(response: Response) -> StorageError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    error_from_body(status, &body)
}

fn error_from_body(status: u16, body: &str) -> StorageError {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let summary = parsed
        .as_ref()
        .and_then(|v| v.get("error_summary").or_else(|| v.get("error_description")))
        .and_then(Value::as_str)
        .map(ToString::to_string);

    let summary = summary.unwrap_or_else(|| {
        let trimmed = body.trim();
        let is_html = trimmed.starts_with("<!DOCTYPE")
            || trimmed.starts_with("<html")
            || trimmed.starts_with("<HTML");
        if is_html {
            "Server returned HTML error page".to_string()
        } else if trimmed.chars().count() > ERROR_BODY_LIMIT {
            let truncated: String = trimmed.chars().take(ERROR_BODY_LIMIT).collect();
            format!("{truncated}... (truncated)")
        } else {
            trimmed.to_string()
        }
    });

    StorageError::Api { status, summary }
}

/// Serialize JSON so it can travel in an HTTP header.
///
/// Everything outside printable ASCII is written as `\uXXXX` (UTF-16 code
/// units, so astral characters become surrogate pairs).
#[must_use]
pub fn header_safe_json(value: &Value) -> String {
    let raw = value.to_string();
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c.is_ascii() && !c.is_ascii_control() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    out
}
