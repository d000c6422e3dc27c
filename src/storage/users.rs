//! Data-access layer for `users` rows and score rankings.
//!
//! Every operation takes one pooled connection, runs on the blocking pool,
//! and propagates failures to the caller unchanged.

use rusqlite::{params, OptionalExtension, Row, ToSql, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::config;
use crate::core::error::AppResult;
use crate::storage::db::{with_connection, DbPool};

/// A persisted user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Telegram ID, primary key
    pub telegram_id: i64,
    /// Telegram first name, shown on the leaderboard
    pub first_name: String,
    /// Best score reached so far
    pub best_score: i64,
}

/// Field/value constraints for [`UserDao::find_one_or_none`].
///
/// Only the fields that are set become conditions; they are AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserFilter {
    pub telegram_id: Option<i64>,
    pub first_name: Option<String>,
    pub best_score: Option<i64>,
}

impl UserFilter {
    /// Filter on the primary key.
    pub fn by_telegram_id(telegram_id: i64) -> Self {
        Self {
            telegram_id: Some(telegram_id),
            ..Self::default()
        }
    }

    fn to_where_clause(&self) -> (String, Vec<Box<dyn ToSql + Send>>) {
        let mut conditions = Vec::new();
        let mut values: Vec<Box<dyn ToSql + Send>> = Vec::new();

        if let Some(id) = self.telegram_id {
            conditions.push("telegram_id = ?");
            values.push(Box::new(id));
        }
        if let Some(ref name) = self.first_name {
            conditions.push("first_name = ?");
            values.push(Box::new(name.clone()));
        }
        if let Some(score) = self.best_score {
            conditions.push("best_score = ?");
            values.push(Box::new(score));
        }

        if conditions.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), values)
        }
    }
}

/// Values for a new user row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub telegram_id: i64,
    pub first_name: String,
    #[serde(default)]
    pub best_score: i64,
}

impl NewUser {
    pub fn new(telegram_id: i64, first_name: impl Into<String>) -> Self {
        Self {
            telegram_id,
            first_name: first_name.into(),
            best_score: 0,
        }
    }
}

/// Leaderboard entry; `rank` is the 1-based position in the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedRecord {
    pub rank: usize,
    pub telegram_id: i64,
    pub first_name: String,
    pub best_score: i64,
}

/// Standing of one user across all records. Equal scores share a rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRank {
    pub rank: i64,
    pub best_score: i64,
}

/// Best score of one user before and after [`UserDao::record_score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreUpdate {
    /// `None` when the submission created the user
    pub previous_best: Option<i64>,
    pub best_score: i64,
}

fn parse_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        telegram_id: row.get(0)?,
        first_name: row.get(1)?,
        best_score: row.get(2)?,
    })
}

/// Async handle over the `users` table. Cheap to clone.
#[derive(Clone)]
pub struct UserDao {
    pool: Arc<DbPool>,
}

impl UserDao {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Returns the first user matching `filters`, or `None`.
    pub async fn find_one_or_none(&self, filters: UserFilter) -> AppResult<Option<User>> {
        with_connection(&self.pool, move |conn| {
            let (where_clause, values) = filters.to_where_clause();
            let sql = format!(
                "SELECT telegram_id, first_name, best_score FROM users{} LIMIT 1",
                where_clause
            );
            let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref() as &dyn ToSql).collect();

            let user = conn.query_row(&sql, params.as_slice(), parse_user).optional()?;
            Ok(user)
        })
        .await
    }

    /// Inserts a new user and returns the persisted row.
    ///
    /// The insert runs in a transaction that is rolled back on failure
    /// (e.g. a duplicate `telegram_id`); the error is returned as is.
    pub async fn add(&self, values: NewUser) -> AppResult<User> {
        with_connection(&self.pool, move |conn| {
            let tx = conn.transaction()?;

            let inserted = tx
                .execute(
                    "INSERT INTO users (telegram_id, first_name, best_score) VALUES (?1, ?2, ?3)",
                    params![values.telegram_id, values.first_name, values.best_score],
                )
                .and_then(|_| {
                    tx.query_row(
                        "SELECT telegram_id, first_name, best_score FROM users WHERE telegram_id = ?1",
                        params![values.telegram_id],
                        parse_user,
                    )
                });

            match inserted {
                Ok(user) => {
                    tx.commit()?;
                    log::info!("Created user {} ({})", user.telegram_id, user.first_name);
                    Ok(user)
                }
                Err(e) => {
                    if let Err(rollback_err) = tx.rollback() {
                        log::warn!("Rollback after failed insert also failed: {}", rollback_err);
                    }
                    Err(e.into())
                }
            }
        })
        .await
    }

    /// Returns the user with `values.telegram_id`, inserting it first if
    /// there is none. The flag is `true` when this call created the row.
    ///
    /// Unlike [`UserDao::add`] a concurrent insert of the same id is not an
    /// error.
    pub async fn get_or_add(&self, values: NewUser) -> AppResult<(User, bool)> {
        with_connection(&self.pool, move |conn| {
            let inserted = conn.execute(
                "INSERT INTO users (telegram_id, first_name, best_score) VALUES (?1, ?2, ?3)
                 ON CONFLICT(telegram_id) DO NOTHING",
                params![values.telegram_id, values.first_name, values.best_score],
            )?;
            let user = conn.query_row(
                "SELECT telegram_id, first_name, best_score FROM users WHERE telegram_id = ?1",
                params![values.telegram_id],
                parse_user,
            )?;
            if inserted > 0 {
                log::info!("Created user {} ({})", user.telegram_id, user.first_name);
            }
            Ok((user, inserted > 0))
        })
        .await
    }

    /// Creates the user with `values.best_score` or raises their stored
    /// best score to it, in one write transaction.
    ///
    /// The transaction takes the write lock up front, so concurrent calls
    /// for the same user are applied one after another.
    pub async fn record_score(&self, values: NewUser) -> AppResult<ScoreUpdate> {
        with_connection(&self.pool, move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let previous_best: Option<i64> = tx
                .query_row(
                    "SELECT best_score FROM users WHERE telegram_id = ?1",
                    params![values.telegram_id],
                    |row| row.get(0),
                )
                .optional()?;

            tx.execute(
                "INSERT INTO users (telegram_id, first_name, best_score) VALUES (?1, ?2, ?3)
                 ON CONFLICT(telegram_id) DO UPDATE SET
                     best_score = MAX(users.best_score, excluded.best_score),
                     updated_at = CASE WHEN excluded.best_score > users.best_score
                                       THEN CURRENT_TIMESTAMP ELSE users.updated_at END",
                params![values.telegram_id, values.first_name, values.best_score],
            )?;

            let best_score: i64 = tx.query_row(
                "SELECT best_score FROM users WHERE telegram_id = ?1",
                params![values.telegram_id],
                |row| row.get(0),
            )?;
            tx.commit()?;

            if previous_best.is_none() {
                log::info!("Created user {} ({})", values.telegram_id, values.first_name);
            }
            Ok(ScoreUpdate {
                previous_best,
                best_score,
            })
        })
        .await
    }

    /// Top `limit` users by best score, ranked by position in the result.
    ///
    /// Equal scores are ordered by `telegram_id` so pages are stable.
    pub async fn get_top_scores(&self, limit: usize) -> AppResult<Vec<RankedRecord>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        with_connection(&self.pool, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT telegram_id, first_name, best_score FROM users
                 ORDER BY best_score DESC, telegram_id ASC
                 LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], parse_user)?;

            let mut records = Vec::new();
            for (index, row) in rows.enumerate() {
                let user = row?;
                records.push(RankedRecord {
                    rank: index + 1,
                    telegram_id: user.telegram_id,
                    first_name: user.first_name,
                    best_score: user.best_score,
                });
            }
            Ok(records)
        })
        .await
    }

    /// Top scores with the default limit.
    pub async fn get_default_top_scores(&self) -> AppResult<Vec<RankedRecord>> {
        self.get_top_scores(config::leaderboard::DEFAULT_LIMIT).await
    }

    /// Competition rank of `telegram_id` across all users, or `None`.
    pub async fn get_user_rank(&self, telegram_id: i64) -> AppResult<Option<UserRank>> {
        with_connection(&self.pool, move |conn| {
            let rank = conn
                .query_row(
                    "SELECT rank, best_score FROM (
                        SELECT telegram_id, best_score,
                               RANK() OVER (ORDER BY best_score DESC) AS rank
                        FROM users
                     ) WHERE telegram_id = ?1",
                    params![telegram_id],
                    |row| {
                        Ok(UserRank {
                            rank: row.get(0)?,
                            best_score: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(rank)
        })
        .await
    }

    /// Raises the stored best score to `score` if it is higher.
    ///
    /// Returns the best score after the update, or `None` if the user
    /// does not exist.
    pub async fn update_best_score(&self, telegram_id: i64, score: i64) -> AppResult<Option<i64>> {
        with_connection(&self.pool, move |conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET best_score = MAX(best_score, ?1),
                     updated_at = CASE WHEN ?1 > best_score THEN CURRENT_TIMESTAMP ELSE updated_at END
                 WHERE telegram_id = ?2",
                params![score, telegram_id],
            )?;
            if changed == 0 {
                return Ok(None);
            }

            let best: i64 = conn.query_row(
                "SELECT best_score FROM users WHERE telegram_id = ?1",
                params![telegram_id],
                |row| row.get(0),
            )?;
            Ok(Some(best))
        })
        .await
    }

    /// Number of users.
    pub async fn count(&self) -> AppResult<i64> {
        with_connection(&self.pool, |conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AppError;
    use crate::storage::db::create_pool;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn make_dao() -> (TempDir, UserDao) {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let path = dir.path().join("users.sqlite");
        let pool = create_pool(path.to_str().unwrap()).expect("failed to create pool");
        (dir, UserDao::new(Arc::new(pool)))
    }

    async fn add_user(dao: &UserDao, id: i64, name: &str, score: i64) {
        dao.add(NewUser {
            telegram_id: id,
            first_name: name.to_string(),
            best_score: score,
        })
        .await
        .unwrap();
    }

    // ==================== find_one_or_none() ====================

    #[tokio::test]
    async fn test_find_missing_user_returns_none() {
        let (_dir, dao) = make_dao();
        let found = dao.find_one_or_none(UserFilter::by_telegram_id(42)).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_find_by_telegram_id() {
        let (_dir, dao) = make_dao();
        add_user(&dao, 1, "Alice", 10).await;
        add_user(&dao, 2, "Bob", 20).await;

        let found = dao.find_one_or_none(UserFilter::by_telegram_id(2)).await.unwrap();

        assert_eq!(
            found,
            Some(User {
                telegram_id: 2,
                first_name: "Bob".to_string(),
                best_score: 20,
            })
        );
    }

    #[tokio::test]
    async fn test_find_combines_filters() {
        let (_dir, dao) = make_dao();
        add_user(&dao, 1, "Alice", 10).await;
        add_user(&dao, 2, "Alice", 30).await;

        let filter = UserFilter {
            first_name: Some("Alice".to_string()),
            best_score: Some(30),
            ..UserFilter::default()
        };
        let found = dao.find_one_or_none(filter).await.unwrap().unwrap();
        assert_eq!(found.telegram_id, 2);

        let filter = UserFilter {
            telegram_id: Some(1),
            best_score: Some(30),
            ..UserFilter::default()
        };
        assert!(dao.find_one_or_none(filter).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_filter_matches_any_row() {
        let (_dir, dao) = make_dao();
        assert!(dao.find_one_or_none(UserFilter::default()).await.unwrap().is_none());

        add_user(&dao, 7, "Carol", 0).await;
        assert!(dao.find_one_or_none(UserFilter::default()).await.unwrap().is_some());
    }

    // ==================== add() ====================

    #[tokio::test]
    async fn test_add_returns_persisted_user() {
        let (_dir, dao) = make_dao();
        let user = dao.add(NewUser::new(5, "Dave")).await.unwrap();

        assert_eq!(user.telegram_id, 5);
        assert_eq!(user.first_name, "Dave");
        assert_eq!(user.best_score, 0);
        assert_eq!(dao.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_duplicate_fails_and_leaves_row_unchanged() {
        let (_dir, dao) = make_dao();
        add_user(&dao, 1, "Alice", 10).await;

        let result = dao
            .add(NewUser {
                telegram_id: 1,
                first_name: "Mallory".to_string(),
                best_score: 999,
            })
            .await;

        assert!(matches!(result, Err(AppError::Database(_))));
        assert_eq!(dao.count().await.unwrap(), 1);
        let stored = dao.find_one_or_none(UserFilter::by_telegram_id(1)).await.unwrap().unwrap();
        assert_eq!(stored.first_name, "Alice");
        assert_eq!(stored.best_score, 10);
    }

    // ==================== get_top_scores() ====================

    #[tokio::test]
    async fn test_inserted_user_appears_in_top_scores() {
        let (_dir, dao) = make_dao();
        add_user(&dao, 99, "Eve", 5).await;

        let top = dao.get_default_top_scores().await.unwrap();

        assert_eq!(
            top,
            vec![RankedRecord {
                rank: 1,
                telegram_id: 99,
                first_name: "Eve".to_string(),
                best_score: 5,
            }]
        );
    }

    #[tokio::test]
    async fn test_top_scores_are_non_increasing() {
        let (_dir, dao) = make_dao();
        for (id, score) in [(1, 40), (2, 10), (3, 90), (4, 10), (5, 70)] {
            add_user(&dao, id, &format!("player{}", id), score).await;
        }

        let top = dao.get_top_scores(20).await.unwrap();

        assert_eq!(top.len(), 5);
        assert!(top.windows(2).all(|w| w[0].best_score >= w[1].best_score));
        let ranks: Vec<usize> = top.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_top_scores_rank_is_positional_for_ties() {
        let (_dir, dao) = make_dao();
        add_user(&dao, 1, "A", 50).await;
        add_user(&dao, 2, "B", 50).await;

        let top = dao.get_top_scores(20).await.unwrap();

        assert_eq!(top[0].rank, 1);
        assert_eq!(top[0].telegram_id, 1);
        assert_eq!(top[1].rank, 2);
        assert_eq!(top[1].telegram_id, 2);
    }

    #[tokio::test]
    async fn test_top_scores_respects_limit() {
        let (_dir, dao) = make_dao();
        for id in 1..=5 {
            add_user(&dao, id, "p", id * 10).await;
        }

        let top = dao.get_top_scores(3).await.unwrap();

        assert_eq!(top.len(), 3);
        assert_eq!(top[0].best_score, 50);
        assert_eq!(top[2].best_score, 30);
    }

    // ==================== get_user_rank() ====================

    #[tokio::test]
    async fn test_single_user_has_rank_one() {
        let (_dir, dao) = make_dao();
        add_user(&dao, 1, "Solo", 3).await;

        let rank = dao.get_user_rank(1).await.unwrap();

        assert_eq!(rank, Some(UserRank { rank: 1, best_score: 3 }));
    }

    #[tokio::test]
    async fn test_rank_of_missing_user_is_none() {
        let (_dir, dao) = make_dao();
        add_user(&dao, 1, "Solo", 3).await;

        assert_eq!(dao.get_user_rank(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tied_scores_share_rank() {
        let (_dir, dao) = make_dao();
        add_user(&dao, 1, "A", 100).await;
        add_user(&dao, 2, "B", 80).await;
        add_user(&dao, 3, "C", 80).await;
        add_user(&dao, 4, "D", 10).await;

        assert_eq!(dao.get_user_rank(1).await.unwrap().unwrap().rank, 1);
        assert_eq!(dao.get_user_rank(2).await.unwrap().unwrap().rank, 2);
        assert_eq!(dao.get_user_rank(3).await.unwrap().unwrap().rank, 2);
        assert_eq!(dao.get_user_rank(4).await.unwrap().unwrap().rank, 4);
    }

    // ==================== update_best_score() ====================

    #[tokio::test]
    async fn test_update_best_score_only_raises() {
        let (_dir, dao) = make_dao();
        add_user(&dao, 1, "A", 50).await;

        assert_eq!(dao.update_best_score(1, 30).await.unwrap(), Some(50));
        assert_eq!(dao.update_best_score(1, 75).await.unwrap(), Some(75));
        assert_eq!(dao.get_user_rank(1).await.unwrap().unwrap().best_score, 75);
    }

    // ==================== get_or_add() / record_score() ====================

    #[tokio::test]
    async fn test_get_or_add_keeps_existing_row() {
        let (_dir, dao) = make_dao();
        add_user(&dao, 1, "Alice", 40).await;

        let (user, created) = dao.get_or_add(NewUser::new(1, "Mallory")).await.unwrap();

        assert!(!created);
        assert_eq!(user.first_name, "Alice");
        assert_eq!(user.best_score, 40);

        let (user, created) = dao.get_or_add(NewUser::new(2, "Bob")).await.unwrap();
        assert!(created);
        assert_eq!(user.best_score, 0);
    }

    #[tokio::test]
    async fn test_record_score_creates_then_raises() {
        let (_dir, dao) = make_dao();

        let first = dao
            .record_score(NewUser {
                telegram_id: 1,
                first_name: "A".to_string(),
                best_score: 30,
            })
            .await
            .unwrap();
        assert_eq!(
            first,
            ScoreUpdate {
                previous_best: None,
                best_score: 30,
            }
        );

        let lower = dao
            .record_score(NewUser {
                telegram_id: 1,
                first_name: "A".to_string(),
                best_score: 10,
            })
            .await
            .unwrap();
        assert_eq!(lower.previous_best, Some(30));
        assert_eq!(lower.best_score, 30);
        assert_eq!(dao.count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_concurrent_first_inserts_do_not_fail() {
        let (_dir, dao) = make_dao();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dao = dao.clone();
                tokio::spawn(async move { dao.get_or_add(NewUser::new(77, "Racer")).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            let (_, was_created) = handle.await.unwrap().unwrap();
            if was_created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(dao.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_best_score_for_missing_user() {
        let (_dir, dao) = make_dao();
        assert_eq!(dao.update_best_score(404, 10).await.unwrap(), None);
    }
}
