use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::sync::Arc;

use crate::core::config;
use crate::core::error::AppResult;
use crate::storage::migrations::run_migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool and applies the embedded schema migrations
/// on the first connection.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Example
///
/// ```no_run
/// use scorebot::storage::create_pool;
///
/// let pool = create_pool("database.sqlite")?;
/// # Ok::<(), scorebot::core::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.busy_timeout(config::database::busy_timeout()));
    let pool = Pool::builder().max_size(config::database::MAX_POOL_SIZE).build(manager)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;

    log::info!("Database ready at {}", database_path);
    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Run a blocking closure against a pooled connection on tokio's blocking pool.
///
/// This is how every async data-access method reaches SQLite: one pooled
/// connection per call, released when the closure returns.
pub async fn with_connection<T, F>(pool: &Arc<DbPool>, f: F) -> AppResult<T>
where
    F: FnOnce(&mut DbConnection) -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    let pool = Arc::clone(pool);
    tokio::task::spawn_blocking(move || {
        let mut conn = get_connection(&pool)?;
        f(&mut conn)
    })
    .await?
}
