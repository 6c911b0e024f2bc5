//! Cross-member version comparison run inside the migration transaction.

use crate::error::{GateError, GateResult};
use cv_core::ExtensionSet;
use cv_schema::{
    CheckOutcome, MemberStore, MemberVersioningInfo, Schema, VersionCheck, VersioningInfo,
};
use duckdb::Connection;

/// What the comparison against the cluster concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every member agrees with this one.
    Proceed,
    /// This member is ahead of the member at `address`; wait for it.
    PeersBehind { address: String },
}

/// Classify the local versioning info against each member in order.
///
/// The first member that forces a decision wins:
///
/// - same extensions, same schema: keep scanning;
/// - same extensions, local schema newer: the peer is behind;
/// - same extensions, local schema older: [`GateError::ClusterVersionMismatch`];
/// - different extensions and the local set is not larger:
///   [`GateError::ClusterExtensionMismatch`];
/// - different extensions and the local set is larger: the peer is behind.
pub fn compare_versions(
    local: &VersioningInfo,
    members: &[MemberVersioningInfo],
) -> GateResult<Verdict> {
    for member in members {
        let peer = &member.info;

        if local.extensions.is_same_version(&peer.extensions).is_ok() {
            if local.schema_version == peer.schema_version {
                continue;
            }
            if local.schema_version > peer.schema_version {
                return Ok(Verdict::PeersBehind {
                    address: member.address.clone(),
                });
            }
            return Err(GateError::ClusterVersionMismatch {
                expected: peer.schema_version,
                actual: local.schema_version,
            });
        }

        if local.extensions.version() <= peer.extensions.version() {
            return Err(GateError::ClusterExtensionMismatch {
                expected: peer.extensions.version(),
                actual: local.extensions.version(),
            });
        }

        return Ok(Verdict::PeersBehind {
            address: member.address.clone(),
        });
    }

    Ok(Verdict::Proceed)
}

/// [`VersionCheck`] used when joining or restarting into an existing cluster.
///
/// Records this member's schema version and extensions in its membership
/// row, then compares against every non-pending member.
#[derive(Debug, Clone)]
pub struct ClusterVersionCheck {
    address: String,
    extensions: ExtensionSet,
    behind: Option<String>,
}

impl ClusterVersionCheck {
    pub fn new(address: impl Into<String>, extensions: ExtensionSet) -> Self {
        Self {
            address: address.into(),
            extensions,
            behind: None,
        }
    }

    /// Address of the member found behind by the last check, if any.
    pub fn behind(&self) -> Option<&str> {
        self.behind.as_deref()
    }
}

impl VersionCheck for ClusterVersionCheck {
    type Error = GateError;

    fn check(
        &mut self,
        conn: &Connection,
        current: u32,
        schema: &Schema,
    ) -> GateResult<CheckOutcome> {
        self.behind = None;

        let overridden = schema.execute_overrides(conn)?;
        if !overridden.is_empty() {
            log::info!("Upgraded database from v{current:03} through overrides {overridden:?}");
        }

        let local = VersioningInfo {
            schema_version: schema.version(),
            extensions: self.extensions.clone(),
        };

        let store = MemberStore::new(conn);
        store
            .update_versioning_info(&self.address, local.schema_version, &local.extensions)
            .map_err(|source| GateError::MemberUpdate {
                address: self.address.clone(),
                source,
            })?;

        let members = store.list_versioning_info()?;
        match compare_versions(&local, &members)? {
            Verdict::Proceed => Ok(CheckOutcome::Proceed),
            Verdict::PeersBehind { address } => {
                log::info!(
                    "Cluster member {address} is behind schema v{:03} with {} extensions",
                    local.schema_version,
                    local.extensions.version()
                );
                self.behind = Some(address);
                Ok(CheckOutcome::GracefulAbort)
            }
        }
    }
}

#[cfg(test)]
#[path = "check_test.rs"]
mod tests;
