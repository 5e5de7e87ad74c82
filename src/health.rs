//! Liveness endpoint for the hosting platform's health probe.

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Body returned by `GET /`
pub const HEALTH_BODY: &str = "Streaming Bot is alive and running!";

/// Router serving the liveness check
pub fn router() -> Router {
    Router::new().route("/", get(|| async { HEALTH_BODY }))
}

/// Serve the liveness endpoint on `0.0.0.0:port` until the process exits.
///
/// # Errors
///
/// Returns an error if the port cannot be bound or the server stops.
pub async fn serve(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Health endpoint listening on {addr}");
    axum::serve(listener, router()).await
}

/// Run [`serve`] in the background; failures are logged and never stop the bot.
pub fn spawn(port: u16) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = serve(port).await {
            error!("Health endpoint stopped: {e}");
        }
    })
}
