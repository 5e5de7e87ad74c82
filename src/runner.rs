use crate::auth::{AuthFlow, AuthState};
use crate::bot;
use crate::bot::handlers::{AuthCommand, RelayCommand};
use crate::bot::state::AuthDialogue;
use crate::config::{BotMode, Settings};
use crate::relay::MediaRelay;
use crate::storage::{DropboxStorage, FileStorage};
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info};

/// Run the handler set selected by `settings.bot_mode` until Ctrl+C.
pub async fn run_bot(settings: Arc<Settings>) {
    match settings.bot_mode {
        BotMode::Relay => run_relay_bot(settings).await,
        BotMode::Auth => run_auth_bot(settings).await,
    }
}

/// Relay mode: forward videos and documents to Dropbox.
pub async fn run_relay_bot(settings: Arc<Settings>) {
    let http = reqwest::Client::new();
    check_storage(&settings, &http).await;

    let relay = Arc::new(MediaRelay::new(settings.dropbox_upload_dir.clone()));
    info!("Uploads go to Dropbox folder '{}'.", relay.upload_dir());

    let bot = Bot::new(settings.telegram_token.clone());
    info!("Bot is running in relay mode...");

    Dispatcher::builder(bot, relay_handler())
        .dependencies(dptree::deps![settings, relay, http])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

/// Authorization mode: mint a refresh token for the relay configuration.
pub async fn run_auth_bot(settings: Arc<Settings>) {
    let flow = Arc::new(AuthFlow::new(
        settings.dropbox_app_key.clone(),
        settings.dropbox_app_secret.clone(),
        reqwest::Client::new(),
    ));
    let bot = Bot::new(settings.telegram_token.clone());
    info!("Bot is running in authorization mode...");

    Dispatcher::builder(bot, auth_handler())
        .dependencies(dptree::deps![
            settings,
            flow,
            InMemStorage::<AuthState>::new()
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn check_storage(settings: &Settings, http: &reqwest::Client) {
    let Some(credentials) = settings.relay_credentials() else {
        error!("Dropbox refresh token is missing; uploads will fail.");
        return;
    };
    let storage = DropboxStorage::new(credentials, http.clone());
    if let Err(e) = storage.check_connection().await {
        error!("Dropbox connection check returned error: {e}");
    }
}

fn relay_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<RelayCommand>()
                .endpoint(handle_relay_command),
        )
        .branch(dptree::endpoint(handle_relay_media))
}

fn auth_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<AuthState>, AuthState>()
        .branch(
            dptree::entry()
                .filter_command::<AuthCommand>()
                .endpoint(handle_auth_command),
        )
        .branch(dptree::endpoint(handle_auth_usage))
}

async fn handle_relay_command(
    bot: Bot,
    msg: Message,
    cmd: RelayCommand,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        RelayCommand::Start => bot::handlers::relay_start(bot, msg).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_relay_media(
    bot: Bot,
    msg: Message,
    relay: Arc<MediaRelay>,
    settings: Arc<Settings>,
    http: reqwest::Client,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::relay_media(bot, msg, relay, settings, http).await {
        error!("Media handler error: {}", e);
    }
    respond(())
}

async fn handle_auth_command(
    bot: Bot,
    msg: Message,
    cmd: AuthCommand,
    dialogue: AuthDialogue,
    flow: Arc<AuthFlow>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        AuthCommand::Start => bot::handlers::auth_start(bot, msg, dialogue, flow).await,
        AuthCommand::Auth(code) => {
            bot::handlers::auth_complete(bot, msg, code, dialogue, flow).await
        }
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_auth_usage(bot: Bot, msg: Message) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::auth_usage(bot, msg).await {
        error!("Usage hint error: {}", e);
    }
    respond(())
}
