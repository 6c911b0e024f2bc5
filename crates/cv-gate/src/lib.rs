//! cv-gate - Version gate for Convoy
//!
//! Decides, each time a member opens the replicated database, whether it may
//! apply schema updates now, must wait for other members to catch up, or is
//! itself behind the cluster and has to be upgraded.

pub mod check;
pub mod error;
pub mod gate;
pub mod update;

pub use check::{compare_versions, ClusterVersionCheck, Verdict};
pub use error::{GateError, GateResult};
pub use gate::{GateState, OpenOutcome, VersionGate};
pub use update::update_jitter;
