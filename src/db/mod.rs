mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::notify::Notifier;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the database pool, credentials and notifier
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Shared secret gating `POST /keys/issue`
    pub issuance_key: String,
    /// Shared secret gating the admin endpoints
    pub admin_key: String,
    /// Out-of-band delivery for issued keys and transfer codes
    pub notifier: Arc<Notifier>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
