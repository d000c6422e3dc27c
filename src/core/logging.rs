//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file for the server, console only
//!   for one-shot commands)
//! - A configuration summary logged once at startup

use anyhow::Result;
use simplelog::*;
use std::fs::{File, OpenOptions};

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = open_log_file(log_file_path)?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Initialize a terminal-only logger.
///
/// Used by CLI commands that may run next to a live server and must not
/// touch its log file.
pub fn init_terminal_logger() -> Result<()> {
    TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))
}

/// Opens the log file for appending, creating it if needed.
fn open_log_file(log_file_path: &str) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .map_err(|e| anyhow::anyhow!("Failed to open log file: {}", e))
}

/// Logs the effective configuration at application startup
///
/// Secrets are never printed, only whether they are set.
pub fn log_startup_configuration(use_webhook: bool) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("Configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    if config::BOT_TOKEN.is_empty() {
        log::error!("❌ BOT_TOKEN: not set");
    } else {
        log::info!("✅ BOT_TOKEN: set");
    }

    match config::BASE_SITE.as_deref() {
        Some(base) => log::info!("✅ BASE_SITE: {}", base),
        None if use_webhook => log::error!("❌ BASE_SITE: not set (required in webhook mode)"),
        None => log::warn!("⚠️  BASE_SITE: not set, WebApp button disabled"),
    }

    log::info!("   Listen address: {}", config::listen_addr());
    log::info!("   Database: {}", config::DATABASE_PATH.as_str());
    log::info!("   Static dir: {}", config::STATIC_DIR.as_str());
    log::info!(
        "   Webhook secret: {}",
        if config::WEBHOOK_SECRET.is_some() { "set" } else { "not set" }
    );
    log::info!("   Admins: {}", config::ADMIN_IDS.len());
    log::info!("   Mode: {}", if use_webhook { "webhook" } else { "long polling" });
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_init_logger_creates_log_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        // A second init in the same process fails; either way the file exists.
        let _ = init_logger(path);

        assert!(temp_file.path().exists());
    }

    #[test]
    fn test_log_file_is_appended_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, "server line\n").unwrap();

        let mut file = open_log_file(path.to_str().unwrap()).unwrap();
        writeln!(file, "cli line").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "server line\ncli line\n");
    }

    #[test]
    fn test_init_logger_rejects_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("app.log");

        let result = init_logger(path.to_str().unwrap());

        assert!(result.is_err());
    }
}
