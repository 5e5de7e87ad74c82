#![deny(missing_docs)]
//! Telegram → Dropbox relay bot.
//!
//! Relay mode uploads videos and documents sent to the bot into Dropbox and
//! answers with a direct streaming link. Authorization mode walks an operator
//! through the Dropbox OAuth handshake to mint the refresh token relay mode
//! needs.

/// Dropbox OAuth code flow.
pub mod auth;
/// Telegram-specific handlers and adapters.
pub mod bot;
/// Configuration management.
pub mod config;
/// Liveness endpoint.
pub mod health;
/// Media relay pipeline.
pub mod relay;
/// Telegram runtime entrypoints for both modes.
pub mod runner;
/// Storage layer (Dropbox).
pub mod storage;
#[cfg(test)]
pub(crate) mod testing;
