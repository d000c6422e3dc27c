use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tokio::net::TcpListener;
use tokio::signal;

use scorebot::cli::{Cli, Commands};
use scorebot::core::{config, init_logger, init_terminal_logger, log_startup_configuration, web_server};
use scorebot::storage::{create_pool, UserDao};
use scorebot::telegram::handlers::format_leaderboard;
use scorebot::telegram::{create_bot, notify_admins, schema, setup_bot_commands, HandlerDeps};

/// Main entry point
///
/// Parses CLI arguments and dispatches to the appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    // Load environment variables from .env before any config is read
    let _ = dotenv();

    // One-shot commands log to the terminal only so a running server keeps its log file
    match cli.command {
        None | Some(Commands::Run { .. }) => init_logger(&config::LOG_FILE_PATH)?,
        Some(_) => init_terminal_logger()?,
    }

    match cli.command {
        Some(Commands::Run { polling }) => run_bot(!polling).await,
        Some(Commands::Migrate) => {
            create_pool(&config::DATABASE_PATH)?;
            log::info!("Migrations applied");
            Ok(())
        }
        Some(Commands::Top { limit }) => {
            let users = open_users()?;
            let records = users.get_top_scores(limit).await?;
            println!("{}", format_leaderboard(&records));
            Ok(())
        }
        Some(Commands::Rank { telegram_id }) => {
            let users = open_users()?;
            match users.get_user_rank(telegram_id).await? {
                Some(rank) => println!("#{} with {} points", rank.rank, rank.best_score),
                None => println!("User {} not found", telegram_id),
            }
            Ok(())
        }
        None => {
            log::info!("No command specified, running bot in webhook mode");
            run_bot(true).await
        }
    }
}

fn open_users() -> Result<UserDao> {
    let pool = create_pool(&config::DATABASE_PATH)?;
    Ok(UserDao::new(Arc::new(pool)))
}

/// Run the bot and the web server until Ctrl-C
async fn run_bot(use_webhook: bool) -> Result<()> {
    let init_start = std::time::Instant::now();
    log::info!("Starting bot setup...");
    log_startup_configuration(use_webhook);

    let users = open_users()?;
    log::info!("Users in database: {}", users.count().await?);

    let bot = create_bot()?;
    let me = bot.get_me().await?;
    log::info!("Bot username: {:?}, Bot ID: {}", me.username, me.id);

    setup_bot_commands(&bot).await?;
    notify_admins(&bot, "🚀 Bot started").await;

    let game_url = config::BASE_SITE.as_deref().and_then(config::game_url);
    if game_url.is_none() {
        log::warn!("No https BASE_SITE configured, the Play button is hidden");
    }
    let handler = schema(HandlerDeps::new(users.clone(), game_url));
    let app = web_server::create_router(users, &config::BOT_TOKEN, &config::STATIC_DIR);

    let addr = config::listen_addr();
    let tcp = TcpListener::bind(addr).await?;

    if use_webhook {
        let url = config::webhook_url()?;
        let mut options = webhooks::Options::new(addr, url.clone()).drop_pending_updates();
        if let Some(secret) = config::WEBHOOK_SECRET.clone() {
            options = options.secret_token(secret);
        }

        // Sets the webhook now; `stop_flag` resolves once the listener is
        // stopped and the webhook has been deleted.
        let (listener, stop_flag, webhook_router) = webhooks::axum_to_router(bot.clone(), options).await?;
        log::info!("Webhook set to {}", url);

        let server = tokio::spawn(web_server::serve(tcp, webhook_router.merge(app), stop_flag));
        log::info!("Bot initialization complete in {:.2}s", init_start.elapsed().as_secs_f64());

        Dispatcher::builder(bot.clone(), handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch_with_listener(
                listener,
                LoggingErrorHandler::with_custom_text("An error from the update listener"),
            )
            .await;

        log::info!("Shutting down bot...");
        server.await??;
        log::info!("Webhook deleted");
    } else {
        let server = tokio::spawn(web_server::serve(tcp, app, async {
            let _ = signal::ctrl_c().await;
        }));
        log::info!("Bot initialization complete in {:.2}s", init_start.elapsed().as_secs_f64());
        log::info!("Starting bot in long polling mode");

        Dispatcher::builder(bot.clone(), handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        log::info!("Shutting down bot...");
        server.await??;
    }

    notify_admins(&bot, "🛑 Bot stopped").await;
    Ok(())
}
