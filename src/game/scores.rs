use serde::{Deserialize, Serialize};

use crate::core::error::{AppError, AppResult};
use crate::storage::users::{NewUser, UserDao};
use crate::telegram::webapp_auth::WebAppUser;

/// Result of a score submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub telegram_id: i64,
    pub best_score: i64,
    /// `true` when this submission raised the stored best score
    pub new_record: bool,
}

/// Record a finished game for `player`.
///
/// The player is created on their first submission. The stored best score
/// only ever goes up.
pub async fn submit_score(users: &UserDao, player: &WebAppUser, score: i64) -> AppResult<ScoreOutcome> {
    if score < 0 {
        return Err(AppError::Validation(format!("score must not be negative, got {}", score)));
    }

    let update = users
        .record_score(NewUser {
            telegram_id: player.id,
            first_name: player.first_name.clone(),
            best_score: score,
        })
        .await?;

    let outcome = ScoreOutcome {
        telegram_id: player.id,
        best_score: update.best_score,
        new_record: match update.previous_best {
            None => score > 0,
            Some(previous) => update.best_score > previous,
        },
    };

    if outcome.new_record {
        log::info!("New best score {} for user {}", outcome.best_score, outcome.telegram_id);
    }
    Ok(outcome)
}
