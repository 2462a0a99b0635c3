pub mod connection;
pub mod listings;
pub mod scan_runs;
pub mod shared_listings;

pub use connection::{init_db, Database};

/// SQLite-backed listing pool and shared-listing store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pub(crate) db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}
