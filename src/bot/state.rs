use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

pub use crate::auth::AuthState;

/// Dialogue handle used by the authorization-mode endpoints
pub type AuthDialogue = Dialogue<AuthState, InMemStorage<AuthState>>;
