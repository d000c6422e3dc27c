//! Telegram bot integration and handlers

pub mod bot;
pub mod handlers;
pub mod webapp_auth;

// Re-exports for convenience
pub use bot::{create_bot, notify_admins, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use teloxide::Bot;
