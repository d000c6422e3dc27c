//! Dispatcher schema and command handlers

use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, Message, WebAppInfo};
use teloxide::utils::command::BotCommands;
use url::Url;

use crate::core::config;
use crate::storage::users::{NewUser, RankedRecord, UserDao, UserRank};
use crate::telegram::bot::Command;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub users: UserDao,
    /// Game page opened by the "Play" button; `None` hides the button
    pub game_url: Option<Url>,
}

impl HandlerDeps {
    pub fn new(users: UserDao, game_url: Option<Url>) -> Self {
        Self { users, game_url }
    }
}

/// Creates the dispatcher schema for the bot.
///
/// The same tree is used in webhook and long polling mode.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_command::<Command>()
        .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                if let Err(e) = handle_command(&bot, &msg, cmd.clone(), &deps).await {
                    log::error!("Command {:?} failed in chat {}: {}", cmd, msg.chat.id, e);
                    let _ = bot
                        .send_message(msg.chat.id, "Something went wrong, please try again later.")
                        .await;
                }
                Ok(())
            }
        })
}

async fn handle_command(bot: &Bot, msg: &Message, cmd: Command, deps: &HandlerDeps) -> Result<(), HandlerError> {
    match cmd {
        Command::Start => handle_start(bot, msg, deps).await,
        Command::Top => handle_top(bot, msg, deps).await,
        Command::Me => handle_me(bot, msg, deps).await,
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
            Ok(())
        }
    }
}

/// Telegram user ID of the sender as stored in the database
fn sender_id(msg: &Message) -> Option<i64> {
    msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok())
}

/// /start — register the user on first contact and offer the game
async fn handle_start(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let (Some(telegram_id), Some(from)) = (sender_id(msg), msg.from.as_ref()) else {
        return Ok(());
    };

    let (user, created) = deps.users.get_or_add(NewUser::new(telegram_id, from.first_name.clone())).await?;
    let text = if created {
        format!(
            "Hi, {}! Press Play to start the game. Your best result goes to the leaderboard, /top shows it.",
            user.first_name
        )
    } else {
        format!(
            "Welcome back, {}! Your best score is {}. Beat it!",
            user.first_name, user.best_score
        )
    };

    let mut request = bot.send_message(msg.chat.id, text);
    if let Some(url) = deps.game_url.clone() {
        request = request.reply_markup(play_keyboard(url));
    }
    request.await?;
    Ok(())
}

/// /top — leaderboard
async fn handle_top(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let records = deps.users.get_top_scores(config::leaderboard::BOT_TOP_LIMIT).await?;
    bot.send_message(msg.chat.id, format_leaderboard(&records)).await?;
    Ok(())
}

/// /me — the sender's rank
async fn handle_me(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(telegram_id) = sender_id(msg) else {
        return Ok(());
    };

    let rank = deps.users.get_user_rank(telegram_id).await?;
    bot.send_message(msg.chat.id, format_rank(rank)).await?;
    Ok(())
}

fn play_keyboard(url: Url) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::web_app(
        "🎮 Play",
        WebAppInfo { url },
    )]])
}

/// Render the leaderboard as plain text, one player per line.
pub fn format_leaderboard(records: &[RankedRecord]) -> String {
    if records.is_empty() {
        return "The leaderboard is empty. Be the first to play!".to_string();
    }

    let mut text = String::from("🏆 Leaderboard\n\n");
    for record in records {
        let medal = match record.rank {
            1 => "🥇",
            2 => "🥈",
            3 => "🥉",
            _ => "  ",
        };
        text.push_str(&format!(
            "{} {}. {} — {}\n",
            medal, record.rank, record.first_name, record.best_score
        ));
    }
    text
}

/// Render a user's standing, or a hint to play when they have none.
pub fn format_rank(rank: Option<UserRank>) -> String {
    match rank {
        Some(UserRank { rank, best_score }) => {
            format!("Your rank: #{}\nYour best score: {}", rank, best_score)
        }
        None => "You are not on the leaderboard yet. Send /start to play!".to_string(),
    }
}
