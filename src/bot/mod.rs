/// Command definitions and endpoints for both modes
pub mod handlers;
/// Attachment extraction and download from Telegram messages
pub mod media;
/// Status message sending/editing through the Bot API
pub mod reporter;
/// Dialogue state for authorization mode
pub mod state;
