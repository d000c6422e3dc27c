//! Public HTTP server: game page, static assets, game API, health check.
//!
//! The Telegram webhook route is not defined here; in webhook mode
//! teloxide hands back its own router, which `main` merges with this one.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::get,
    Router,
};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::core::config;
use crate::core::error::AppResult;
use crate::game::{create_game_router, GameState};
use crate::storage::users::UserDao;

/// Build the application router.
///
/// # Arguments
/// * `users` - Data-access handle shared by all game endpoints
/// * `bot_token` - Used to verify WebApp init data on score submissions
/// * `static_dir` - Directory served under `/static`
pub fn create_router(users: UserDao, bot_token: &str, static_dir: &str) -> Router {
    let game = create_game_router(GameState::new(users, bot_token));

    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .nest_service(config::STATIC_PREFIX, ServeDir::new(static_dir))
        .merge(game)
}

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    log::info!("Starting web server on http://{}", addr);
    log::info!("  /            - Game page (redirect)");
    log::info!("  /static/*    - Static assets");
    log::info!("  /api/records - Leaderboard (JSON)");
    log::info!("  /api/score   - Score submission (JSON)");
    log::info!("  /health      - Health check");

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    log::info!("Web server stopped");
    Ok(())
}

/// GET / — the game lives under /static
async fn index_handler() -> Redirect {
    Redirect::temporary(&format!("{}/index.html", config::STATIC_PREFIX))
}

/// GET /health — simple health check.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
