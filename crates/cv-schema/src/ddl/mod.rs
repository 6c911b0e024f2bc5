//! Built-in schema updates.
//!
//! Each update is a numbered `.sql` file embedded via `include_str!` and
//! consumed by [`crate::migration::Schema::builtin`].

use crate::migration::Update;
use std::collections::BTreeMap;

/// Regular updates, keyed by the version they produce.
pub fn builtin_updates() -> BTreeMap<u32, Update> {
    BTreeMap::from([
        (1, Update::sql("initial", include_str!("v001_initial.sql"))),
        (
            2,
            Update::sql("api_extensions", include_str!("v002_api_extensions.sql")),
        ),
    ])
}

/// Overrides, keyed by the version whose regular update they replace.
///
/// Version 2 is reached by reshaping the table when a cluster already running
/// version 1 is upgraded; only a fresh database takes the `ALTER TABLE` route.
pub fn builtin_overrides() -> BTreeMap<u32, Update> {
    BTreeMap::from([(
        2,
        Update::sql(
            "api_extensions_reshape",
            include_str!("v002_api_extensions_override.sql"),
        ),
    )])
}
