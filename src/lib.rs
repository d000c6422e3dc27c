//! Scorebot - Telegram bot backing a web game leaderboard
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, and the HTTP server
//! - `storage`: SQLite pool, migrations, and the user data-access layer
//! - `game`: score submission and the leaderboard JSON API
//! - `telegram`: bot commands, handlers, and WebApp init data validation

pub mod cli;
pub mod core;
pub mod game;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult};
pub use storage::{create_pool, DbPool, UserDao};
