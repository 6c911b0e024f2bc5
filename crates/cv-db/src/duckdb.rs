//! DuckDB engine implementation
//!
//! Stands in for the replicated engine on a single process: every handle
//! returned by [`DuckDbEngine::open`] is a clone of one root connection, so
//! all of them share the same database instance, the way every member of a
//! real cluster shares the replicated database.

use crate::database::Database;
use crate::error::{DbError, DbResult};
use crate::traits::Engine;
use async_trait::async_trait;
use duckdb::Connection;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::watch;

/// DuckDB engine
pub struct DuckDbEngine {
    root: Mutex<Connection>,
    ready: watch::Sender<bool>,
}

impl DuckDbEngine {
    /// Create a new in-memory DuckDB engine
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Create a new DuckDB engine from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| DbError::ConnectionError(format!("{e}: {}", path.display())))?;
        Ok(Self::from_connection(conn))
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn from_connection(conn: Connection) -> Self {
        let (ready, _) = watch::channel(true);
        Self {
            root: Mutex::new(conn),
            ready,
        }
    }

    /// Mark the engine as able (or unable) to serve transactions, as a leader
    /// election would.
    pub fn set_ready(&self, ready: bool) {
        self.ready.send_replace(ready);
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }
}

#[async_trait]
impl Engine for DuckDbEngine {
    async fn ready(&self) -> DbResult<()> {
        let mut rx = self.ready.subscribe();
        loop {
            let ready = *rx.borrow_and_update();
            if ready {
                return Ok(());
            }
            rx.changed().await.map_err(|_| DbError::NotReady)?;
        }
    }

    async fn open(&self) -> DbResult<Database> {
        let root = self
            .root
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))?;
        let conn = root
            .try_clone()
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Database::new(conn))
    }

    fn engine_type(&self) -> &'static str {
        "duckdb"
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
