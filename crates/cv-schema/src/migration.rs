//! Versioned schema migration engine.
//!
//! A [`Schema`] is an ordered sequence of [`Update`]s numbered contiguously
//! from 1, plus a table of override updates. Applied versions are tracked in
//! the `schemas` table; a database without that table is at version 0.
//!
//! Two entry points bring a database up to date:
//!
//! - [`Schema::ensure`] applies each pending update in its own transaction;
//! - [`Schema::ensure_with_check`] first runs a [`VersionCheck`] strategy and
//!   then applies every pending update, all inside one transaction, so the
//!   strategy's writes and the updates commit together. When the strategy
//!   aborts gracefully its own writes are still committed and only the
//!   pending updates are skipped.

use crate::ddl;
use crate::error::{SchemaError, SchemaResult};
use cv_db::transaction::{begin, commit, rollback, with_transaction};
use cv_db::DbResult;
use duckdb::Connection;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Name of the version-tracking table.
pub const VERSION_TABLE: &str = "schemas";

type StepFn = dyn Fn(&Connection) -> DbResult<()> + Send + Sync;

/// One schema update: a transactional unit of DDL/DML moving the database
/// from version N-1 to version N.
#[derive(Clone)]
pub struct Update {
    name: String,
    step: Arc<StepFn>,
}

impl std::fmt::Debug for Update {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Update").field("name", &self.name).finish()
    }
}

impl Update {
    /// An update that executes a batch of SQL statements.
    pub fn sql(name: impl Into<String>, sql: &'static str) -> Self {
        Self::from_fn(name, move |conn| {
            conn.execute_batch(sql)?;
            Ok(())
        })
    }

    /// An update implemented in Rust.
    pub fn from_fn<F>(name: impl Into<String>, step: F) -> Self
    where
        F: Fn(&Connection) -> DbResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            step: Arc::new(step),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, conn: &Connection, version: u32) -> SchemaResult<()> {
        (self.step)(conn).map_err(|source| SchemaError::Migration { version, source })
    }
}

/// Verdict of a [`VersionCheck`] strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Go ahead and apply pending updates.
    Proceed,
    /// Valid reason to stop this attempt. Writes made by the strategy are
    /// committed; pending updates are not applied.
    GracefulAbort,
}

/// Result of bringing a database up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// Updates `from + 1 ..= to` were applied (none when `from == to`).
    Applied { from: u32, to: u32 },
    /// A check strategy stopped the attempt before any pending update ran.
    /// `current` is the version after any overrides the strategy applied.
    GracefulAbort { current: u32 },
}

impl EnsureOutcome {
    /// Version of the database after the call.
    pub fn version(&self) -> u32 {
        match *self {
            EnsureOutcome::Applied { to, .. } => to,
            EnsureOutcome::GracefulAbort { current } => current,
        }
    }

    /// Number of versions the call moved the database forward.
    pub fn applied(&self) -> u32 {
        match *self {
            EnsureOutcome::Applied { from, to } => to.saturating_sub(from),
            EnsureOutcome::GracefulAbort { .. } => 0,
        }
    }
}

/// Strategy run by [`Schema::ensure_with_check`] inside the migration
/// transaction, before any update DDL.
///
/// `current` is the version recorded in the database when the transaction
/// started. A strategy may run overrides ([`Schema::execute_overrides`]) and
/// write rows. Those writes commit on [`CheckOutcome::Proceed`] once the
/// updates succeed, and on [`CheckOutcome::GracefulAbort`] on their own. An
/// error from the strategy or from an update rolls everything back.
pub trait VersionCheck {
    type Error: From<SchemaError>;

    fn check(
        &mut self,
        conn: &Connection,
        current: u32,
        schema: &Schema,
    ) -> Result<CheckOutcome, Self::Error>;
}

/// Ordered updates and overrides.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    updates: BTreeMap<u32, Update>,
    overrides: BTreeMap<u32, Update>,
}

impl Schema {
    /// Build a schema, checking that updates are numbered 1..=N without gaps
    /// and that every override replaces an existing update.
    pub fn new(
        updates: BTreeMap<u32, Update>,
        overrides: BTreeMap<u32, Update>,
    ) -> SchemaResult<Self> {
        for (expected, &found) in (1..).zip(updates.keys()) {
            if found != expected {
                return Err(SchemaError::NonContiguous { expected, found });
            }
        }

        if let Some(&version) = overrides.keys().find(|v| !updates.contains_key(v)) {
            return Err(SchemaError::OrphanOverride { version });
        }

        Ok(Self { updates, overrides })
    }

    /// The built-in updates and overrides shipped with Convoy.
    pub fn builtin() -> Self {
        Self {
            updates: ddl::builtin_updates(),
            overrides: ddl::builtin_overrides(),
        }
    }

    /// Graft host-application updates after the current maximum.
    ///
    /// `extra` is taken in key order and renumbered contiguously, so the host
    /// only has to order its own updates. Call before the schema is first used.
    pub fn append(&mut self, extra: BTreeMap<u32, Update>) {
        let mut version = self.version();
        for update in extra.into_values() {
            version += 1;
            log::debug!("Appending schema update v{version:03} ({})", update.name());
            self.updates.insert(version, update);
        }
    }

    /// Latest version this schema knows about.
    pub fn version(&self) -> u32 {
        self.updates.keys().next_back().copied().unwrap_or(0)
    }

    pub fn has_override(&self, version: u32) -> bool {
        self.overrides.contains_key(&version)
    }

    /// Apply every pending update, each in its own transaction.
    ///
    /// A failing update stops the call; the database stays at the last
    /// committed version.
    pub fn ensure(&self, conn: &Connection) -> SchemaResult<EnsureOutcome> {
        with_transaction(conn, ensure_version_table)?;
        let from = current_version(conn)?;
        self.check_not_ahead(from)?;

        for (&version, update) in self.updates.range(from + 1..) {
            with_transaction(conn, |tx| self.apply_update(tx, version, update))?;
        }

        Ok(EnsureOutcome::Applied {
            from,
            to: self.version().max(from),
        })
    }

    /// Run `check`, then apply every pending update, in a single transaction.
    ///
    /// [`CheckOutcome::GracefulAbort`] commits what the strategy wrote, skips
    /// the pending updates and is reported as [`EnsureOutcome::GracefulAbort`],
    /// not as an error. Members that are waiting on each other then see each
    /// other's latest versioning rows on their next attempt.
    pub fn ensure_with_check<C>(
        &self,
        conn: &Connection,
        check: &mut C,
    ) -> Result<EnsureOutcome, C::Error>
    where
        C: VersionCheck,
    {
        begin(conn).map_err(SchemaError::from)?;

        match self.ensure_checked(conn, check) {
            Ok(outcome) => {
                commit(conn).map_err(SchemaError::from)?;
                Ok(outcome)
            }
            Err(err) => {
                rollback(conn);
                Err(err)
            }
        }
    }

    fn ensure_checked<C>(&self, conn: &Connection, check: &mut C) -> Result<EnsureOutcome, C::Error>
    where
        C: VersionCheck,
    {
        ensure_version_table(conn)?;
        let from = current_version(conn)?;

        let verdict = check.check(conn, from, self)?;

        // Overrides run by the check may have moved the version forward.
        let current = current_version(conn)?;
        if verdict == CheckOutcome::GracefulAbort {
            log::debug!("Schema check aborted the update at v{current:03}");
            return Ok(EnsureOutcome::GracefulAbort { current });
        }
        self.check_not_ahead(current)?;

        for (&version, update) in self.updates.range(current + 1..) {
            self.apply_update(conn, version, update)?;
        }

        Ok(EnsureOutcome::Applied {
            from,
            to: self.version().max(current),
        })
    }

    /// Run the override for the next version, if there is one, instead of
    /// the regular update.
    ///
    /// Chained overrides (V+1, V+2, ...) all fire. The version of each
    /// override is recorded, so the regular update it replaces is never also
    /// applied. Must run inside the caller's transaction, with the version
    /// table present.
    pub fn execute_overrides(&self, conn: &Connection) -> SchemaResult<Vec<u32>> {
        let mut current = current_version(conn)?;
        let mut applied = Vec::new();

        for (&version, update) in &self.overrides {
            if version != current + 1 {
                continue;
            }

            log::info!(
                "Applying schema override v{version:03} ({}) in place of the regular update",
                update.name()
            );
            update.apply(conn, version)?;
            record_version(conn, version)?;
            current = version;
            applied.push(version);
        }

        Ok(applied)
    }

    fn apply_update(&self, conn: &Connection, version: u32, update: &Update) -> SchemaResult<()> {
        log::debug!("Applying schema update v{version:03} ({})", update.name());
        update.apply(conn, version)?;
        record_version(conn, version)
    }

    fn check_not_ahead(&self, current: u32) -> SchemaResult<()> {
        if current > self.version() {
            return Err(SchemaError::VersionAhead {
                current,
                latest: self.version(),
            });
        }
        Ok(())
    }
}

/// Create the version-tracking table if it does not exist.
fn ensure_version_table(conn: &Connection) -> SchemaResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schemas (
             version    INTEGER   NOT NULL PRIMARY KEY,
             updated_at TIMESTAMP NOT NULL DEFAULT now()
         );",
    )?;
    Ok(())
}

fn version_table_exists(conn: &Connection) -> SchemaResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM information_schema.tables
         WHERE table_schema = 'main' AND table_name = ?",
        duckdb::params![VERSION_TABLE],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Highest applied version, or 0 if the version table does not exist.
pub fn current_version(conn: &Connection) -> SchemaResult<u32> {
    if !version_table_exists(conn)? {
        return Ok(0);
    }

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schemas",
        [],
        |row| row.get(0),
    )?;
    u32::try_from(version).map_err(|e| SchemaError::Decode {
        table: VERSION_TABLE,
        column: "version",
        message: e.to_string(),
    })
}

fn record_version(conn: &Connection, version: u32) -> SchemaResult<()> {
    conn.execute(
        "INSERT INTO schemas (version, updated_at) VALUES (?, now())",
        duckdb::params![i64::from(version)],
    )
    .map_err(|e| SchemaError::Migration {
        version,
        source: e.into(),
    })?;
    Ok(())
}

#[cfg(test)]
#[path = "migration_test.rs"]
mod tests;
