//! Bot initialization and admin notifications
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - Startup/shutdown notices for admins

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "start playing")]
    Start,
    #[command(description = "show the leaderboard")]
    Top,
    #[command(description = "show your rank and best score")]
    Me,
    #[command(description = "show this help")]
    Help,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Missing token, invalid BOT_API_URL, or HTTP client failure
pub fn create_bot() -> anyhow::Result<Bot> {
    if config::BOT_TOKEN.is_empty() {
        return Err(anyhow::anyhow!("BOT_TOKEN environment variable not set"));
    }

    let client = teloxide::net::default_reqwest_settings().build()?;
    let bot = Bot::with_client(config::BOT_TOKEN.as_str(), client);

    // Check if local Bot API server is configured
    let bot = if let Ok(bot_api_url) = std::env::var("BOT_API_URL") {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(&bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        bot.set_api_url(url)
    } else {
        bot
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

/// Sends `text` to every configured admin.
///
/// Failures are logged and otherwise ignored.
pub async fn notify_admins(bot: &Bot, text: &str) {
    for &admin_id in config::ADMIN_IDS.iter() {
        if let Err(e) = bot.send_message(ChatId(admin_id), text).await {
            log::warn!("Failed to notify admin {}: {}", admin_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_descriptions() {
        let command_list = Command::descriptions().to_string();

        assert!(command_list.contains("These commands are supported"));
        assert!(command_list.contains("/start"));
        assert!(command_list.contains("/top"));
        assert!(command_list.contains("/me"));
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("/top", "scorebot").unwrap(), Command::Top);
        assert_eq!(Command::parse("/me@scorebot", "scorebot").unwrap(), Command::Me);
        assert!(Command::parse("/unknown", "scorebot").is_err());
    }
}
