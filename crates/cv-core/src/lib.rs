//! cv-core - Core library for Convoy
//!
//! This crate provides the extension registry compared between cluster
//! members, member roles, gate configuration parsing, and the one-shot
//! cancellation signal shared by the other Convoy components.

pub mod canceller;
pub mod config;
pub mod error;
pub mod extensions;
pub mod role;

pub use canceller::Canceller;
pub use config::{GateConfig, RetryConfig};
pub use error::{CoreError, CoreResult, ExtensionKind};
pub use extensions::{
    validate_external_extension, validate_internal_extension, ExtensionSet,
    BUILTIN_INTERNAL_EXTENSIONS,
};
pub use role::Role;
