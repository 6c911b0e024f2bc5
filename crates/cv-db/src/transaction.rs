//! Explicit `BEGIN` / `COMMIT` / `ROLLBACK` helpers over a DuckDB connection.

use crate::error::DbError;
use duckdb::Connection;

pub fn begin(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch("BEGIN TRANSACTION")
        .map_err(|e| DbError::TransactionError(format!("BEGIN failed: {e}")))
}

/// Commit the open transaction, rolling back if the commit itself fails.
///
/// A failed commit caused by a conflicting writer is reported as
/// [`DbError::Busy`] so callers can retry it.
pub fn commit(conn: &Connection) -> Result<(), DbError> {
    if let Err(commit_err) = conn.execute_batch("COMMIT") {
        let _ = conn.execute_batch("ROLLBACK");
        return Err(match DbError::from(commit_err) {
            busy @ DbError::Busy(_) => busy,
            other => DbError::TransactionError(format!("COMMIT failed: {other}")),
        });
    }
    Ok(())
}

pub fn rollback(conn: &Connection) {
    if let Err(e) = conn.execute_batch("ROLLBACK") {
        log::debug!("ROLLBACK failed: {e}");
    }
}

/// Execute `body` within a transaction, rolling back on error.
pub fn with_transaction<F, T, E>(conn: &Connection, body: F) -> Result<T, E>
where
    F: FnOnce(&Connection) -> Result<T, E>,
    E: From<DbError>,
{
    begin(conn)?;

    match body(conn) {
        Ok(value) => {
            commit(conn)?;
            Ok(value)
        }
        Err(err) => {
            rollback(conn);
            Err(err)
        }
    }
}

#[cfg(test)]
#[path = "transaction_test.rs"]
mod tests;
