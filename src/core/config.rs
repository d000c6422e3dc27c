use once_cell::sync::Lazy;
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use url::Url;

use crate::core::error::{AppError, AppResult};

/// Path Telegram posts updates to, relative to `BASE_SITE`
pub const WEBHOOK_PATH: &str = "/webhook";

/// Path prefix static assets are served under
pub const STATIC_PREFIX: &str = "/static";

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Public base URL of this server, e.g. https://game.example.com
/// Read from BASE_SITE environment variable; required in webhook mode
pub static BASE_SITE: Lazy<Option<String>> = Lazy::new(|| env::var("BASE_SITE").ok().filter(|s| !s.is_empty()));

/// Interface the HTTP server binds to
/// Default: 0.0.0.0
pub static HOST: Lazy<IpAddr> = Lazy::new(|| {
    env::var("HOST")
        .ok()
        .and_then(|h| h.parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
});

/// Port the HTTP server listens on
/// Default: 8000
pub static PORT: Lazy<u16> = Lazy::new(|| env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8000));

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: database.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "database.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Directory holding the game's HTML/JS/CSS
/// Default: static
pub static STATIC_DIR: Lazy<String> = Lazy::new(|| env::var("STATIC_DIR").unwrap_or_else(|_| "static".to_string()));

/// Secret Telegram echoes back in X-Telegram-Bot-Api-Secret-Token
pub static WEBHOOK_SECRET: Lazy<Option<String>> =
    Lazy::new(|| env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()));

/// Telegram user IDs notified on startup and shutdown
/// Read from ADMIN_IDS as a comma-separated list
pub static ADMIN_IDS: Lazy<Vec<i64>> =
    Lazy::new(|| parse_admin_ids(&env::var("ADMIN_IDS").unwrap_or_default()));

/// Leaderboard configuration
pub mod leaderboard {
    /// Rows returned by the top-scores query when no limit is given
    pub const DEFAULT_LIMIT: usize = 20;

    /// Upper bound for a client-supplied limit
    pub const MAX_LIMIT: usize = 100;

    /// Rows shown by the /top bot command
    pub const BOT_TOP_LIMIT: usize = 10;

    /// Clamp a requested limit to 1..=MAX_LIMIT
    pub fn clamp_limit(requested: Option<usize>) -> usize {
        requested.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// Telegram WebApp authentication
pub mod auth {
    /// Maximum accepted age of WebApp init data (in seconds)
    pub const INIT_DATA_MAX_AGE_SECS: i64 = 86_400; // 24 hours

    /// Header carrying the raw init data string
    pub const INIT_DATA_HEADER: &str = "X-Telegram-Init-Data";
}

/// Database configuration
pub mod database {
    use std::time::Duration;

    /// Maximum number of connections in the pool
    pub const MAX_POOL_SIZE: u32 = 10;

    /// How long SQLite waits on a locked database (in seconds)
    pub const BUSY_TIMEOUT_SECS: u64 = 30;

    /// Busy timeout duration
    pub fn busy_timeout() -> Duration {
        Duration::from_secs(BUSY_TIMEOUT_SECS)
    }
}

/// Address the HTTP server binds to
pub fn listen_addr() -> SocketAddr {
    SocketAddr::new(*HOST, *PORT)
}

/// Join the public base URL with the webhook path.
///
/// A trailing slash on `base` is ignored so both `https://x.y` and
/// `https://x.y/` produce `https://x.y/webhook`.
pub fn build_webhook_url(base: &str) -> AppResult<Url> {
    let base = base.trim_end_matches('/');
    let url = Url::parse(&format!("{}{}", base, WEBHOOK_PATH))?;
    Ok(url)
}

/// Webhook URL derived from `BASE_SITE`
pub fn webhook_url() -> AppResult<Url> {
    let base = BASE_SITE
        .as_deref()
        .ok_or_else(|| AppError::Config("BASE_SITE must be set in webhook mode".to_string()))?;
    build_webhook_url(base)
}

/// URL of the game page, if it can be opened as a Telegram WebApp.
///
/// Telegram only accepts https URLs for WebApp buttons.
pub fn game_url(base: &str) -> Option<Url> {
    let base = base.trim_end_matches('/');
    let url = Url::parse(&format!("{}{}/index.html", base, STATIC_PREFIX)).ok()?;
    (url.scheme() == "https").then_some(url)
}

fn parse_admin_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            match s.parse() {
                Ok(id) => Some(id),
                Err(_) => {
                    log::warn!("Ignoring invalid admin id in ADMIN_IDS: {}", s);
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_build_webhook_url() {
        let url = build_webhook_url("https://game.example.com").unwrap();
        assert_eq!(url.as_str(), "https://game.example.com/webhook");
    }

    #[test]
    fn test_build_webhook_url_trailing_slash() {
        let url = build_webhook_url("https://game.example.com/").unwrap();
        assert_eq!(url.as_str(), "https://game.example.com/webhook");
    }

    #[test]
    fn test_build_webhook_url_rejects_garbage() {
        assert!(build_webhook_url("not a url").is_err());
    }

    #[test]
    fn test_game_url_requires_https() {
        assert!(game_url("http://localhost:8000").is_none());
        let url = game_url("https://game.example.com").unwrap();
        assert_eq!(url.as_str(), "https://game.example.com/static/index.html");
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(leaderboard::clamp_limit(None), leaderboard::DEFAULT_LIMIT);
        assert_eq!(leaderboard::clamp_limit(Some(0)), 1);
        assert_eq!(leaderboard::clamp_limit(Some(5)), 5);
        assert_eq!(leaderboard::clamp_limit(Some(10_000)), leaderboard::MAX_LIMIT);
    }

    #[test]
    fn test_parse_admin_ids() {
        assert_eq!(parse_admin_ids(""), Vec::<i64>::new());
        assert_eq!(parse_admin_ids("1, 2,,x,3"), vec![1, 2, 3]);
    }
}
