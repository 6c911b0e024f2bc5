//! cv-db - Database abstraction layer for Convoy
//!
//! This crate provides the `Engine` trait standing in for the replicated SQL
//! engine, a DuckDB implementation of it, the `Database` connection handle,
//! and the transaction retry policies.

pub mod database;
pub mod duckdb;
pub mod error;
pub mod retry;
pub mod traits;
pub mod transaction;

pub use database::Database;
pub use duckdb::DuckDbEngine;
pub use error::{DbError, DbResult};
pub use retry::{retry_once_on_deadline, RetryPolicy, Retryable};
pub use traits::Engine;
pub use transaction::with_transaction;
