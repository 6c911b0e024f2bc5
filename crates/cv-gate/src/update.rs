//! Cluster-wide auto-update trigger.

use crate::error::{GateError, GateResult};
use crate::gate::VersionGate;
use cv_db::Engine;
use rand::Rng;
use std::time::Duration;
use tokio::process::Command;

/// Pick a random delay in `[0, max)`, whole milliseconds.
pub fn update_jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}

impl<E: Engine> VersionGate<E> {
    /// Run the executable named by the configured environment variable so
    /// that the whole cluster gets upgraded.
    ///
    /// The call is spread out by a random delay so members that notice a
    /// newer peer at the same time do not all update at once. An unset or
    /// empty variable is a no-op.
    pub async fn trigger_update(&self) -> GateResult<()> {
        if !self.is_open() {
            return Err(GateError::NotOpen);
        }

        let env = &self.config().schema_update_env;
        let executable = match std::env::var(env) {
            Ok(value) if !value.is_empty() => value,
            _ => {
                log::warn!("No {env} variable set, skipping auto-update");
                return Ok(());
            }
        };

        let wait = update_jitter(self.config().update_jitter_max());
        log::info!("Triggering cluster auto-update in {wait:?} with {executable}");
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = self.shutdown_signal().cancelled() => return Err(GateError::Cancelled),
        }

        log::info!("Triggering cluster auto-update now");
        let output = Command::new(&executable)
            .output()
            .await
            .map_err(|e| GateError::UpdateFailed {
                executable: executable.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let err = GateError::UpdateFailed {
                executable,
                message: format!("{}: {}", output.status, stderr.trim()),
            };
            log::error!("{err}");
            return Err(err);
        }

        log::info!("Triggering cluster auto-update succeeded");
        Ok(())
    }
}
