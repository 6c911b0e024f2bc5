//! Extension registry.
//!
//! An [`ExtensionSet`] records the optional capabilities a cluster member
//! supports. Capabilities come in two disjoint namespaces:
//!
//! - *internal* extensions describe the coordination layer itself and are
//!   prefixed with `internal:` (e.g. `internal:runtime_extension_v1`);
//! - *external* extensions describe the service hosted on top of the cluster
//!   (e.g. `custom_encapsulation_ip`).
//!
//! The set is built once at process start and then only grows through
//! [`ExtensionSet::register`]. Members persist a snapshot of their set in the
//! membership table; comparisons always run against such snapshots.

use crate::error::{CoreError, CoreResult, ExtensionKind};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// Internal extensions every process ships with.
pub const BUILTIN_INTERNAL_EXTENSIONS: &[&str] = &["internal:runtime_extension_v1"];

const INTERNAL_FORMAT: &str = "internal:<extension>";
const EXTERNAL_FORMAT: &str = "<extension>";

fn internal_pattern() -> &'static Regex {
    static INTERNAL_RE: OnceLock<Regex> = OnceLock::new();
    INTERNAL_RE.get_or_init(|| {
        Regex::new(r"^internal:[a-z0-9]+(?:_[a-z0-9]+)*$").expect("valid regex literal")
    })
}

fn external_pattern() -> &'static Regex {
    static EXTERNAL_RE: OnceLock<Regex> = OnceLock::new();
    EXTERNAL_RE
        .get_or_init(|| Regex::new(r"^[a-z0-9]+(?:_[a-z0-9]+)*$").expect("valid regex literal"))
}

/// Validate an identifier against the internal `internal:<extension>` pattern.
pub fn validate_internal_extension(extension: &str) -> CoreResult<()> {
    if internal_pattern().is_match(extension) {
        Ok(())
    } else {
        Err(CoreError::InvalidExtensionFormat {
            kind: ExtensionKind::Internal,
            extension: extension.to_string(),
            expected: INTERNAL_FORMAT,
        })
    }
}

/// Validate an identifier against the external `<extension>` pattern.
///
/// The empty string is rejected, as are identifiers made only of structure
/// (`_`, `__`) or starting/ending with an underscore.
pub fn validate_external_extension(extension: &str) -> CoreResult<()> {
    if external_pattern().is_match(extension) {
        Ok(())
    } else {
        Err(CoreError::InvalidExtensionFormat {
            kind: ExtensionKind::External,
            extension: extension.to_string(),
            expected: EXTERNAL_FORMAT,
        })
    }
}

/// A validated, namespaced set of capability identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    internal: BTreeSet<String>,
    external: BTreeSet<String>,
}

impl ExtensionSet {
    /// Create the process registry, seeded with [`BUILTIN_INTERNAL_EXTENSIONS`].
    pub fn new() -> CoreResult<Self> {
        Self::with_internal(BUILTIN_INTERNAL_EXTENSIONS.iter().copied())
    }

    /// Create a set with no extensions at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a set seeded with the given internal extensions.
    ///
    /// Fails if any identifier does not match `internal:<extension>`.
    pub fn with_internal<I, S>(internal: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = Self::empty();
        for extension in internal {
            let extension = extension.into();
            validate_internal_extension(&extension)?;
            set.internal.insert(extension);
        }
        Ok(set)
    }

    /// Build a set from an unordered list mixing internal and external
    /// identifiers, such as the wire form returned by another member.
    ///
    /// Each identifier is classified by the pattern it matches.
    pub fn from_list<I, S>(extensions: I) -> CoreResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = Self::empty();
        for extension in extensions {
            set.insert_classified(extension.as_ref())?;
        }
        Ok(set)
    }

    /// Rebuild a set from its two storage columns.
    ///
    /// Identifiers are classified by pattern rather than by the column they
    /// were read from, so rows written with the columns swapped still parse.
    /// Empty fields (including an empty or NULL column) are skipped.
    pub fn parse_from_storage(internal_csv: &str, external_csv: &str) -> CoreResult<Self> {
        let mut set = Self::empty();
        for extension in internal_csv.split(',').chain(external_csv.split(',')) {
            let extension = extension.trim();
            if extension.is_empty() {
                continue;
            }
            set.insert_classified(extension)?;
        }
        Ok(set)
    }

    fn insert_classified(&mut self, extension: &str) -> CoreResult<()> {
        if external_pattern().is_match(extension) {
            self.external.insert(extension.to_string());
        } else if internal_pattern().is_match(extension) {
            self.internal.insert(extension.to_string());
        } else {
            return Err(CoreError::InvalidExtensionFormat {
                kind: ExtensionKind::Unknown,
                extension: extension.to_string(),
                expected: "<extension> or internal:<extension>",
            });
        }
        Ok(())
    }

    /// Whether `extension` is present in either subset.
    pub fn has(&self, extension: &str) -> bool {
        self.external.contains(extension) || self.internal.contains(extension)
    }

    /// Register new external extensions.
    ///
    /// The whole batch is validated before anything is inserted: a duplicate
    /// (already registered, or repeated within the batch) or a malformed
    /// identifier leaves the set unchanged.
    pub fn register<I, S>(&mut self, extensions: I) -> CoreResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut batch = BTreeSet::new();
        for extension in extensions {
            let extension = extension.into();
            if self.external.contains(&extension) || batch.contains(&extension) {
                return Err(CoreError::DuplicateExtension { extension });
            }
            validate_external_extension(&extension)?;
            batch.insert(extension);
        }

        log::debug!("Registering external extensions: {:?}", batch);
        self.external.extend(batch);
        Ok(())
    }

    /// Number of extensions across both subsets.
    ///
    /// Used as the tie-breaker when two members' sets differ: the member
    /// knowing more capabilities is considered ahead.
    pub fn version(&self) -> usize {
        self.internal.len() + self.external.len()
    }

    /// Internal extensions, in sorted order.
    pub fn internal(&self) -> impl Iterator<Item = &str> {
        self.internal.iter().map(String::as_str)
    }

    /// External extensions, in sorted order.
    pub fn external(&self) -> impl Iterator<Item = &str> {
        self.external.iter().map(String::as_str)
    }

    /// Union of both subsets, for API responses.
    pub fn serialize_for_wire(&self) -> Vec<String> {
        self.internal
            .iter()
            .chain(self.external.iter())
            .cloned()
            .collect()
    }

    /// Comma-joined `(internal, external)` columns for the membership table.
    pub fn serialize_for_storage(&self) -> (String, String) {
        (join(&self.internal), join(&self.external))
    }

    /// Check that `other` carries exactly the same extensions as `self`.
    ///
    /// Counts are compared per subset first. Once both subsets have equal
    /// sizes, checking that every identifier of `self` is contained in the
    /// matching subset of `other` is enough to prove the subsets are equal:
    /// an injective containment between finite sets of the same size is a
    /// bijection. The check is therefore evaluated in one direction but
    /// symmetric in effect.
    pub fn is_same_version(&self, other: &ExtensionSet) -> CoreResult<()> {
        if self.internal.len() != other.internal.len()
            || self.external.len() != other.external.len()
        {
            return Err(CoreError::IncompatibleRegistries {
                reason: format!(
                    "different number of extensions (internal {} vs {}, external {} vs {})",
                    self.internal.len(),
                    other.internal.len(),
                    self.external.len(),
                    other.external.len()
                ),
            });
        }

        if let Some(missing) = self.internal.difference(&other.internal).next() {
            return Err(CoreError::IncompatibleRegistries {
                reason: format!("target registry does not support internal extension {missing:?}"),
            });
        }

        if let Some(missing) = self.external.difference(&other.external).next() {
            return Err(CoreError::IncompatibleRegistries {
                reason: format!("target registry does not support external extension {missing:?}"),
            });
        }

        Ok(())
    }
}

fn join(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
#[path = "extensions_test.rs"]
mod tests;
