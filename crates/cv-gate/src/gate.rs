//! The open/join decision procedure.
//!
//! [`VersionGate::open`] walks one member through engine readiness, opening
//! the database handle, and bringing the schema up to date. A bootstrapping
//! member (first of a new cluster) applies updates directly. Every other
//! member runs [`ClusterVersionCheck`] inside the migration transaction and
//! only proceeds when the whole cluster agrees on schema version and API
//! extensions.

use crate::check::ClusterVersionCheck;
use crate::error::{GateError, GateResult};
use cv_core::{Canceller, ExtensionSet, GateConfig};
use cv_db::{Database, Engine, RetryPolicy};
use cv_schema::{EnsureOutcome, Schema};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

/// Where a member is in the open procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    WaitingForEngineReady,
    Opening,
    Bootstrap,
    JoinCheck,
    /// Schema is current and the database is open.
    Proceeding,
    WaitingForPeers,
    Failed,
}

/// Result of one [`VersionGate::open`] attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Open,
    /// Some member is behind this one. The wait has already been served;
    /// call `open` again.
    WaitingForPeers,
}

/// Per-member gate in front of the replicated database.
pub struct VersionGate<E: Engine> {
    engine: Arc<E>,
    config: GateConfig,
    schema: Arc<Schema>,
    db: Mutex<Option<Database>>,
    state: Mutex<GateState>,
    last_error: Mutex<Option<String>>,
    open_signal: Canceller,
    upgrade: Notify,
    shutdown: Canceller,
}

impl<E: Engine> std::fmt::Debug for VersionGate<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionGate")
            .field("engine", &self.engine.engine_type())
            .field("address", &self.config.address)
            .field("state", &self.state())
            .finish()
    }
}

impl<E: Engine> VersionGate<E> {
    /// Create a gate for the member described by `config`.
    ///
    /// `schema` must already carry any host-application updates.
    pub fn new(engine: Arc<E>, config: GateConfig, schema: Schema) -> GateResult<Self> {
        config.validate()?;
        Ok(Self {
            engine,
            config,
            schema: Arc::new(schema),
            db: Mutex::new(None),
            state: Mutex::new(GateState::Idle),
            last_error: Mutex::new(None),
            open_signal: Canceller::new(),
            upgrade: Notify::new(),
            shutdown: Canceller::new(),
        })
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn state(&self) -> GateState {
        *lock(&self.state)
    }

    /// Message of the error that last moved the gate to
    /// [`GateState::Failed`]. Cleared when a new attempt starts.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    /// Whether the database has been opened with a current schema.
    pub fn is_open(&self) -> bool {
        self.open_signal.is_cancelled()
    }

    /// Resolve once the database is open.
    pub async fn wait_open(&self) {
        self.open_signal.cancelled().await;
    }

    /// Handle onto the open database.
    pub fn database(&self) -> GateResult<Database> {
        lock(&self.db).clone().ok_or(GateError::NotOpen)
    }

    /// Signal that another member has upgraded, cutting a peer wait short.
    ///
    /// A notification sent while no `open` is waiting is kept for the next
    /// wait.
    pub fn notify_upgrade(&self) {
        log::debug!("Received upgrade notification for {}", self.config.address);
        self.upgrade.notify_one();
    }

    /// Unblock every wait of this gate with [`GateError::Cancelled`].
    ///
    /// Database work issued afterwards is attempted once, without backoff.
    pub fn shutdown(&self) {
        if self.shutdown.cancel() {
            log::info!("Shutting down version gate for {}", self.config.address);
        }
    }

    pub(crate) fn shutdown_signal(&self) -> &Canceller {
        &self.shutdown
    }

    /// Open the database and bring its schema up to date.
    ///
    /// With `bootstrap` the schema is updated unconditionally. Otherwise
    /// this member's versioning info is recorded and compared against every
    /// non-pending member first; see [`crate::check::compare_versions`].
    pub async fn open(&self, extensions: &ExtensionSet, bootstrap: bool) -> GateResult<OpenOutcome> {
        if self.is_open() {
            return Ok(OpenOutcome::Open);
        }

        match self.try_open(extensions, bootstrap).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                *lock(&self.last_error) = Some(err.to_string());
                self.set_state(GateState::Failed);
                log::error!("Failed to open database for {}: {err}", self.config.address);
                Err(err)
            }
        }
    }

    async fn try_open(&self, extensions: &ExtensionSet, bootstrap: bool) -> GateResult<OpenOutcome> {
        *lock(&self.last_error) = None;
        self.set_state(GateState::WaitingForEngineReady);
        self.wait_engine_ready().await?;

        self.set_state(GateState::Opening);
        let db = self
            .engine
            .open()
            .await
            .map_err(GateError::Open)?
            .with_retry_policy(RetryPolicy::from(&self.config.retry))
            .with_shutdown(self.shutdown.clone());

        let outcome = if bootstrap {
            self.set_state(GateState::Bootstrap);
            self.bootstrap(&db).await?
        } else {
            self.set_state(GateState::JoinCheck);
            self.join(&db, extensions).await?
        };

        match outcome {
            EnsureOutcome::Applied { from, to } => {
                log::info!(
                    "Database open for {} at schema v{to:03} (was v{from:03})",
                    self.config.address
                );
                *lock(&self.db) = Some(db);
                self.set_state(GateState::Proceeding);
                self.open_signal.cancel();
                Ok(OpenOutcome::Open)
            }
            EnsureOutcome::GracefulAbort { .. } => {
                self.set_state(GateState::WaitingForPeers);
                self.wait_for_peers().await?;
                Ok(OpenOutcome::WaitingForPeers)
            }
        }
    }

    async fn wait_engine_ready(&self) -> GateResult<()> {
        let timeout = self.config.ready_timeout();
        tokio::select! {
            ready = tokio::time::timeout(timeout, self.engine.ready()) => match ready {
                Ok(result) => result.map_err(GateError::from),
                Err(_) => Err(GateError::EngineNotReady {
                    timeout_ms: self.config.ready_timeout_ms,
                }),
            },
            _ = self.shutdown.cancelled() => Err(GateError::Cancelled),
        }
    }

    async fn bootstrap(&self, db: &Database) -> GateResult<EnsureOutcome> {
        db.retry(|| {
            let schema = Arc::clone(&self.schema);
            db.run(move |conn| schema.ensure(conn).map_err(GateError::from))
        })
        .await
    }

    async fn join(&self, db: &Database, extensions: &ExtensionSet) -> GateResult<EnsureOutcome> {
        let check = ClusterVersionCheck::new(self.config.address.clone(), extensions.clone());
        db.retry(|| {
            let schema = Arc::clone(&self.schema);
            let mut check = check.clone();
            db.run(move |conn| schema.ensure_with_check(conn, &mut check))
        })
        .await
    }

    async fn wait_for_peers(&self) -> GateResult<()> {
        log::warn!(
            "Waiting for other cluster members to upgrade their versions (address {})",
            self.config.address
        );
        tokio::select! {
            _ = self.upgrade.notified() => {
                log::debug!("Upgrade notification received, retrying open");
                Ok(())
            }
            _ = tokio::time::sleep(self.config.peer_wait_timeout()) => Ok(()),
            _ = self.shutdown.cancelled() => Err(GateError::Cancelled),
        }
    }

    fn set_state(&self, state: GateState) {
        let mut current = lock(&self.state);
        if *current != state {
            log::debug!("Version gate {}: {:?} -> {state:?}", self.config.address, *current);
            *current = state;
        }
    }
}

/// The guarded values stay consistent across a panic, so a poisoned lock is
/// recovered rather than propagated.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
#[path = "gate_test.rs"]
mod tests;
