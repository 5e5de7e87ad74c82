use crate::auth::{AuthError, AuthFlow};
use crate::bot::media::{classify_message, TelegramDownloader};
use crate::bot::reporter::TelegramStatusReporter;
use crate::bot::state::AuthDialogue;
use crate::config::Settings;
use crate::relay::{MediaRelay, RelayOutcome};
use crate::storage::DropboxStorage;
use anyhow::{anyhow, Result};
use std::sync::Arc;
use teloxide::{prelude::*, utils::command::BotCommands};
use tracing::{debug, info};

/// Greeting in relay mode
pub const RELAY_WELCOME_TEXT: &str =
    "Hello! I'm ready to work. Send or forward me any video or file.";

/// Hint for anything other than a command in authorization mode
pub const AUTH_USAGE_TEXT: &str =
    "Send /start to begin Dropbox authorization, then /auth <code> with the code Dropbox shows you.";

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Commands available in relay mode
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum RelayCommand {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
}

/// Commands available in authorization mode
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum AuthCommand {
    /// Hand out the Dropbox authorize URL
    #[command(description = "Begin Dropbox authorization.")]
    Start,
    /// Exchange the code Dropbox displayed for a refresh token
    #[command(description = "Finish authorization: /auth <code>.")]
    Auth(String),
}

/// Text sent when an authorization handshake begins
#[must_use]
pub fn auth_start_text(authorize_url: &str) -> String {
    format!(
        "Welcome! To connect Dropbox:\n\n\
         1. Open this link and allow access:\n{authorize_url}\n\n\
         2. Copy the code Dropbox shows you.\n\
         3. Send it back here as: /auth <code>"
    )
}

/// Text carrying the minted refresh token, or the error verbatim
#[must_use]
pub fn auth_result_text(result: &Result<String, AuthError>) -> String {
    match result {
        Ok(refresh_token) => format!(
            "✅ Success! Your Dropbox refresh token is:\n\n{refresh_token}\n\n\
             Save it as DROPBOX_REFRESH_TOKEN in the relay deployment's environment."
        ),
        Err(e) => format!("❌ Error: {e}"),
    }
}

/// Relay-mode `/start` handler
///
/// # Errors
///
/// Returns an error if the welcome message cannot be sent.
pub async fn relay_start(bot: Bot, msg: Message) -> Result<()> {
    info!("User {} initiated /start command.", get_user_id_safe(&msg));
    bot.send_message(msg.chat.id, RELAY_WELCOME_TEXT).await?;
    Ok(())
}

/// Relay handler for every non-command message
///
/// # Errors
///
/// Returns an error if relay credentials are missing or the first status
/// message cannot be sent. Pipeline failures are reported to the sender
/// instead.
pub async fn relay_media(
    bot: Bot,
    msg: Message,
    relay: Arc<MediaRelay>,
    settings: Arc<Settings>,
    http: reqwest::Client,
) -> Result<()> {
    let credentials = settings
        .relay_credentials()
        .ok_or_else(|| anyhow!("DROPBOX_REFRESH_TOKEN is missing"))?;

    let storage = DropboxStorage::new(credentials, http);
    let downloader = TelegramDownloader::new(bot.clone());
    let reporter = TelegramStatusReporter::new(bot, msg.chat.id);

    let outcome = relay
        .handle(classify_message(&msg), &downloader, &storage, &reporter)
        .await?;

    log_outcome(get_user_id_safe(&msg), &outcome);
    Ok(())
}

/// Summary line per relay; failures were already logged with their cause.
fn log_outcome(user_id: i64, outcome: &RelayOutcome) {
    match outcome {
        RelayOutcome::Delivered(_) => info!("Relay for user {user_id} delivered."),
        RelayOutcome::Failed(_) => {
            debug!("Relay for user {user_id} ended with a reported failure.");
        }
        RelayOutcome::Unsupported => {}
    }
}

/// Authorization-mode `/start` handler
///
/// # Errors
///
/// Returns an error if the authorize URL cannot be built, the dialogue cannot
/// be updated or the reply fails.
pub async fn auth_start(
    bot: Bot,
    msg: Message,
    dialogue: AuthDialogue,
    flow: Arc<AuthFlow>,
) -> Result<()> {
    info!(
        "User {} started Dropbox authorization.",
        get_user_id_safe(&msg)
    );
    let (state, url) = flow.start()?;
    dialogue
        .update(state)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;

    bot.send_message(msg.chat.id, auth_start_text(&url)).await?;
    Ok(())
}

/// Authorization-mode `/auth <code>` handler
///
/// # Errors
///
/// Returns an error if the dialogue cannot be read/updated or the reply fails.
pub async fn auth_complete(
    bot: Bot,
    msg: Message,
    code: String,
    dialogue: AuthDialogue,
    flow: Arc<AuthFlow>,
) -> Result<()> {
    let state = dialogue
        .get_or_default()
        .await
        .map_err(|e| anyhow!(e.to_string()))?;

    let (next, result) = flow.complete(&state, &code).await;
    dialogue
        .update(next)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;

    if result.is_ok() {
        info!(
            "Refresh token issued to user {}.",
            get_user_id_safe(&msg)
        );
    }
    bot.send_message(msg.chat.id, auth_result_text(&result))
        .await?;
    Ok(())
}

/// Authorization-mode fallback for anything that is not a known command
///
/// # Errors
///
/// Returns an error if the hint cannot be sent.
pub async fn auth_usage(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, AUTH_USAGE_TEXT).await?;
    Ok(())
}
