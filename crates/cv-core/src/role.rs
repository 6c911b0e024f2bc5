//! Cluster member roles.

use serde::{Deserialize, Serialize};

/// Role of a cluster member as recorded in the membership table.
///
/// Roles are opaque to the version gate except for [`Role::PENDING`], which
/// marks a member that is mid-join or mid-removal. A pending member's row is
/// not trustworthy and is left out of every version comparison.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    /// Sentinel for members about to be added or removed.
    pub const PENDING: &'static str = "PENDING";

    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }

    /// The pending role.
    pub fn pending() -> Self {
        Self(Self::PENDING.to_string())
    }

    pub fn is_pending(&self) -> bool {
        self.0 == Self::PENDING
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(role: &str) -> Self {
        Self::new(role)
    }
}

impl From<String> for Role {
    fn from(role: String) -> Self {
        Self(role)
    }
}
