//! Web game backend: score submission and the leaderboard JSON API

pub mod router;
pub mod scores;

pub use router::{create_game_router, ApiError, GameState};
pub use scores::{submit_score, ScoreOutcome};
