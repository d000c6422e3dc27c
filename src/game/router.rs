//! JSON API used by the web game.
//!
//! - `GET  /api/records?limit=N`        — leaderboard
//! - `GET  /api/records/{telegram_id}`  — one player's rank
//! - `POST /api/score`                  — submit a finished game

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::core::config;
use crate::core::error::AppError;
use crate::game::scores::{submit_score, ScoreOutcome};
use crate::storage::users::{RankedRecord, UserDao, UserRank};
use crate::telegram::webapp_auth::{self, WebAppUser};

/// Shared state for the game endpoints
#[derive(Clone)]
pub struct GameState {
    pub users: UserDao,
    pub bot_token: Arc<str>,
}

impl GameState {
    pub fn new(users: UserDao, bot_token: impl Into<Arc<str>>) -> Self {
        Self {
            users,
            bot_token: bot_token.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub score: i64,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(msg) => ApiError::BadRequest(msg),
            other => {
                log::error!("Game API request failed: {}", other);
                ApiError::Internal("internal error".to_string())
            }
        }
    }
}

/// Routes for the game API
pub fn create_game_router(state: GameState) -> Router {
    Router::new()
        .route("/api/records", get(handle_get_records))
        .route("/api/records/{telegram_id}", get(handle_get_rank))
        .route("/api/score", post(handle_submit_score))
        .with_state(state)
}

/// Authenticate the caller from the Telegram init data header
fn extract_player(headers: &HeaderMap, bot_token: &str) -> Result<WebAppUser, ApiError> {
    let init_data = headers
        .get(config::auth::INIT_DATA_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Telegram init data".to_string()))?;

    webapp_auth::validate_telegram_webapp_data(init_data, bot_token)
        .map_err(|e| ApiError::Unauthorized(format!("Invalid init data: {}", e)))
}

/// GET /api/records
async fn handle_get_records(
    State(state): State<GameState>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<Vec<RankedRecord>>, ApiError> {
    let limit = config::leaderboard::clamp_limit(query.limit);
    let records = state.users.get_top_scores(limit).await?;
    Ok(Json(records))
}

/// GET /api/records/{telegram_id}
async fn handle_get_rank(
    State(state): State<GameState>,
    Path(telegram_id): Path<i64>,
) -> Result<Json<UserRank>, ApiError> {
    state
        .users
        .get_user_rank(telegram_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("User {} not found", telegram_id)))
}

/// POST /api/score
async fn handle_submit_score(
    State(state): State<GameState>,
    headers: HeaderMap,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<ScoreOutcome>, ApiError> {
    let player = extract_player(&headers, &state.bot_token)?;
    let outcome = submit_score(&state.users, &player, req.score).await?;
    Ok(Json(outcome))
}
