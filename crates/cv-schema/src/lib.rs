//! Schema management for Convoy.
//!
//! Provides the versioned migration engine (regular updates, overrides,
//! host-appended updates, and the in-transaction check strategy), the
//! built-in DDL for the membership table, and the `MemberStore` repository
//! over that table.

pub mod ddl;
pub mod error;
pub mod members;
pub mod migration;

pub use error::{SchemaError, SchemaResult};
pub use members::{
    ClusterMember, ClusterMemberInfo, MemberFilter, MemberStore, MemberVersioningInfo,
    VersioningInfo, MEMBERS_TABLE,
};
pub use migration::{
    current_version, CheckOutcome, EnsureOutcome, Schema, Update, VersionCheck, VERSION_TABLE,
};
