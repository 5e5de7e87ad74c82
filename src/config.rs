//! Configuration and settings management
//!
//! Loads settings from environment variables (and optional config files) once at
//! startup. The resulting [`Settings`] value is immutable and shared with the
//! handlers through the dispatcher's dependency map.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Dropbox folder used for uploads when `DROPBOX_UPLOAD_DIR` is not set
pub const DEFAULT_UPLOAD_DIR: &str = "/Telegram Videos";

/// Port of the liveness endpoint when `PORT` is not set
pub const DEFAULT_HEALTH_PORT: u16 = 8080;

/// Which handler set the process registers
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    /// Relay attachments to Dropbox and answer with a streaming link
    #[default]
    Relay,
    /// One-time OAuth handshake that mints a refresh token
    Auth,
}

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,
    /// Dropbox app key
    pub dropbox_app_key: String,
    /// Dropbox app secret
    pub dropbox_app_secret: String,
    /// Long-lived Dropbox refresh token (relay mode only)
    pub dropbox_refresh_token: Option<String>,

    /// Operating mode
    #[serde(default)]
    pub bot_mode: BotMode,

    /// Liveness endpoint port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Dropbox folder all uploads land in
    #[serde(default = "default_upload_dir")]
    pub dropbox_upload_dir: String,
}

const fn default_port() -> u16 {
    DEFAULT_HEALTH_PORT
}

fn default_upload_dir() -> String {
    DEFAULT_UPLOAD_DIR.to_string()
}

/// Credentials needed by the relay pipeline to talk to Dropbox
#[derive(Clone)]
pub struct DropboxCredentials {
    /// Dropbox app key
    pub app_key: String,
    /// Dropbox app secret
    pub app_secret: String,
    /// Refresh token minted in authorization mode
    pub refresh_token: String,
}

impl std::fmt::Debug for DropboxCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropboxCredentials")
            .field("app_key", &self.app_key)
            .field("app_secret", &"[MASKED]")
            .field("refresh_token", &"[MASKED]")
            .finish()
    }
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use dropbox_stream_bot::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails, a required key is missing, or
    /// the mode-specific requirements checked by [`Settings::validate`] fail.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP__PORT=9000 ./target/app` would set the `port` key
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Unprefixed UPPER_SNAKE_CASE variables map onto snake_case keys
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;
        settings.dropbox_upload_dir = normalize_upload_dir(&settings.dropbox_upload_dir);
        settings.validate()?;
        Ok(settings)
    }

    /// Check that every key the selected mode needs is present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Message` naming the first missing key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("TELEGRAM_TOKEN", self.telegram_token.as_str()),
            ("DROPBOX_APP_KEY", self.dropbox_app_key.as_str()),
            ("DROPBOX_APP_SECRET", self.dropbox_app_secret.as_str()),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Message(format!("{key} is missing")));
            }
        }

        if self.bot_mode == BotMode::Relay && self.relay_credentials().is_none() {
            return Err(ConfigError::Message(
                "DROPBOX_REFRESH_TOKEN is missing (required in relay mode)".into(),
            ));
        }
        Ok(())
    }

    /// Dropbox credentials for relay mode, if a refresh token is configured
    #[must_use]
    pub fn relay_credentials(&self) -> Option<DropboxCredentials> {
        let refresh_token = self
            .dropbox_refresh_token
            .as_ref()
            .filter(|token| !token.trim().is_empty())?;
        Some(DropboxCredentials {
            app_key: self.dropbox_app_key.clone(),
            app_secret: self.dropbox_app_secret.clone(),
            refresh_token: refresh_token.clone(),
        })
    }
}

/// Make the upload folder an absolute Dropbox path without a trailing slash.
///
/// The Dropbox root is represented by the empty string.
#[must_use]
pub fn normalize_upload_dir(dir: &str) -> String {
    let trimmed = dir.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
