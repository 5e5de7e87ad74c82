//! Dropbox OAuth code flow for authorization mode
//!
//! The operator opens the authorize URL, approves the app, and sends the code
//! Dropbox displays back to the bot. The code is exchanged for an offline
//! (refresh) token which the operator copies into the relay configuration.

use crate::storage::dropbox::{request_token, DropboxEndpoints};
use crate::storage::StorageError;
use reqwest::{Client as HttpClient, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Errors of the authorization exchange
#[derive(Debug, Error)]
pub enum AuthError {
    /// `/auth` was sent without a code
    #[error("No code provided. Usage: /auth <code>")]
    MissingCode,
    /// `/auth` was sent before `/start`
    #[error("No authorization in progress. Send /start first.")]
    NotStarted,
    /// Dropbox rejected the exchange
    #[error("{0}")]
    Exchange(String),
    /// Transport failure while talking to Dropbox
    #[error("Network error: {0}")]
    Network(String),
    /// The configured web endpoint does not form a valid URL
    #[error("Invalid authorize URL: {0}")]
    InvalidUrl(String),
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Network(msg) => Self::Network(msg),
            other => Self::Exchange(other.to_string()),
        }
    }
}

/// Per-operator state of the handshake
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthState {
    /// No handshake in progress
    #[default]
    Idle,
    /// Authorize URL was handed out, waiting for `/auth <code>`
    AwaitingCode,
}

/// Dropbox OAuth flow without redirect, requesting offline access
pub struct AuthFlow {
    http: HttpClient,
    endpoints: DropboxEndpoints,
    app_key: String,
    app_secret: String,
}

impl AuthFlow {
    /// Create a flow for the given app against the public Dropbox endpoints
    #[must_use]
    pub fn new(app_key: String, app_secret: String, http: HttpClient) -> Self {
        Self {
            http,
            endpoints: DropboxEndpoints::default(),
            app_key,
            app_secret,
        }
    }

    /// Use custom endpoints
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: DropboxEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// URL the operator visits to approve the app.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUrl` if the web endpoint is not a valid base URL.
    pub fn authorize_url(&self) -> Result<String, AuthError> {
        let url = Url::parse_with_params(
            &format!("{}/oauth2/authorize", self.endpoints.web),
            [
                ("client_id", self.app_key.as_str()),
                ("response_type", "code"),
                ("token_access_type", "offline"),
            ],
        )
        .map_err(|e| AuthError::InvalidUrl(e.to_string()))?;
        Ok(url.into())
    }

    /// Begin a handshake: the next state and the URL to hand out.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidUrl` if the authorize URL cannot be built.
    pub fn start(&self) -> Result<(AuthState, String), AuthError> {
        Ok((AuthState::AwaitingCode, self.authorize_url()?))
    }

    /// Finish a handshake with the `/auth` arguments.
    ///
    /// Returns the state to store next and either the refresh token or the
    /// error to show the operator. A missing code leaves the state untouched;
    /// every other outcome ends the handshake.
    pub async fn complete(
        &self,
        state: &AuthState,
        args: &str,
    ) -> (AuthState, Result<String, AuthError>) {
        let code = match parse_auth_code(args) {
            Ok(code) => code,
            Err(e) => return (state.clone(), Err(e)),
        };
        if *state != AuthState::AwaitingCode {
            return (AuthState::Idle, Err(AuthError::NotStarted));
        }

        let result = self.exchange_code(code).await;
        if let Err(e) = &result {
            warn!("Dropbox code exchange failed: {e}");
        }
        (AuthState::Idle, result)
    }

    /// Exchange an authorization code for a refresh token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Exchange` if Dropbox rejects the code or answers
    /// without a refresh token, `AuthError::Network` on transport failure.
    pub async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        let grant = request_token(
            &self.http,
            &self.endpoints,
            &self.app_key,
            &self.app_secret,
            &[("grant_type", "authorization_code"), ("code", code)],
        )
        .await?;

        let refresh_token = grant
            .refresh_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| AuthError::Exchange("Dropbox returned no refresh token".into()))?;

        info!(account_id = ?grant.account_id, "Dropbox authorization completed");
        Ok(refresh_token)
    }
}

/// Extract the code from `/auth` arguments.
///
/// The code is the first whitespace-separated token.
///
/// # Errors
///
/// Returns `AuthError::MissingCode` if no token is present.
pub fn parse_auth_code(args: &str) -> Result<&str, AuthError> {
    args.split_whitespace().next().ok_or(AuthError::MissingCode)
}
