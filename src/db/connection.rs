use rusqlite::Connection;
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::Duration;

use tracing::info;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

// Per-thread connections, one per database path.
thread_local! {
    static DB_CONNS: RefCell<HashMap<String, Connection>> = RefCell::new(HashMap::new());
}

#[derive(Debug, Clone)]
pub struct Database {
    path: String,
}

impl Database {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Provides this thread's connection to the closure, opening it on first use.
    /// Must not be called re-entrantly from inside `f`.
    pub fn with_conn<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E>,
        E: From<rusqlite::Error>,
    {
        DB_CONNS.with(|cell| {
            let mut conns = cell.borrow_mut();
            let conn = match conns.entry(self.path.clone()) {
                Entry::Occupied(slot) => slot.into_mut(),
                Entry::Vacant(slot) => {
                    let conn = Connection::open(&self.path)?;
                    // Scheduler and HTTP workers share the file.
                    conn.busy_timeout(Duration::from_secs(5))?;
                    slot.insert(conn)
                }
            };
            f(conn)
        })
    }
}

/// Applies the bundled schema. Safe to run on every start.
pub fn init_db(db: &Database) -> Result<(), rusqlite::Error> {
    db.with_conn(|conn| conn.execute_batch(SCHEMA_SQL))?;
    info!(path = %db.path(), "Database schema applied");
    Ok(())
}
