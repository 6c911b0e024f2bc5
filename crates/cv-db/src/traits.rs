//! Engine trait definition

use crate::database::Database;
use crate::error::DbResult;
use async_trait::async_trait;

/// The replicated SQL engine, seen from one member.
///
/// Convoy only needs two things from it: to know when it can serve
/// transactions (it has a leader), and a connection handle to run them on.
/// Every handle opened from the same engine sees the same replicated data.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Resolve once the engine can serve transactions.
    ///
    /// Callers bound this wait with their own timeout.
    async fn ready(&self) -> DbResult<()>;

    /// Open a connection handle onto the replicated database.
    async fn open(&self) -> DbResult<Database>;

    /// Engine type identifier for logging
    fn engine_type(&self) -> &'static str;
}
