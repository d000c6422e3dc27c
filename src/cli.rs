use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "scorebot")]
#[command(author, version, about = "Telegram bot and web game leaderboard", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot and the web server
    Run {
        /// Use long polling instead of the webhook (local development)
        #[arg(long)]
        polling: bool,
    },

    /// Apply database migrations and exit
    Migrate,

    /// Print the leaderboard
    Top {
        /// Number of players to show
        #[arg(short, long, default_value_t = crate::core::config::leaderboard::DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Print one player's rank
    Rank {
        /// Telegram ID of the player
        telegram_id: i64,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
