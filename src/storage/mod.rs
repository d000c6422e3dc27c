//! Database, migrations, and the user data-access layer

pub mod db;
pub mod migrations;
pub mod users;

// Re-exports for convenience
pub use db::{create_pool, get_connection, with_connection, DbConnection, DbPool};
pub use users::UserDao;
