//! Error types for Corridor operations.
//!
//! This module defines the canonical error type used throughout Corridor.
//! All subsystems return `Result<T, CorridorError>` for error handling.
//!
//! Policy violations (blocked writes, destructive commands, stale files) are
//! NOT errors in this sense: they are structured `ToolResult` outcomes built
//! by `core::recovery`. `CorridorError` covers internal failures only, and
//! the pipeline swallows even those rather than crash the host agent.

use std::io;
use thiserror::Error;

/// Canonical error type for all Corridor operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
/// Many variants auto-convert from library errors via `#[from]`.
#[derive(Error, Debug)]
pub enum CorridorError {
    /// I/O error (auto-converts from `std::io::Error`)
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// SQLite ledger error (auto-converts from `rusqlite::Error`)
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parse error from the declarative intent store
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Path resolution or validation error
    #[error("Path error: {0}")]
    PathError(String),

    /// A shared lock was poisoned by a panicking thread
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// Resource not found (missing intent, session, record)
    #[error("Not found: {0}")]
    NotFound(String),

    /// A hook body failed internally
    #[error("Hook error: {0}")]
    HookError(String),

    /// Journal or ledger validation failure
    #[error("Validation error: {0}")]
    ValidationError(String),
}
