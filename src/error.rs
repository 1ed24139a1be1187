//! Error types for the jarforge CLI.
//!
//! # Error Message Style Guide
//!
//! All error messages follow a consistent format for clarity and actionability:
//!
//! - **Format**: `"<operation> failed: <reason>"` or `"<entity> not found: <identifier>"`
//! - **Case**: All lowercase (Rust convention for error messages)
//! - **Context**: Include relevant identifiers (path, target, key) when available
//!
//! ```text
//! "config operation failed: parse pack file: jarforge.toml: unknown field `cpus`"
//! "stub directory not found: tried --stub-dir, JARFORGE_STUB_DIR, ..."
//! "pack failed: 1 of 3 targets failed"
//! ```
//!
//! Engine errors from [`jarforge_pack`] pass through unchanged via
//! [`Error::Pack`]; they already carry the path or platform involved.

use jarforge_pack::PackError;
use thiserror::Error;

/// Result type alias using jarforge's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the jarforge commands.
#[derive(Error, Debug)]
pub enum Error {
    /// Error from the assembly engine.
    #[error(transparent)]
    Pack(#[from] PackError),

    /// Configuration operation failed.
    #[error("config operation failed: {operation}: {reason}")]
    Config {
        /// The operation that failed (e.g., "load pack file", "parse target").
        operation: String,
        /// The reason for the failure.
        reason: String,
    },

    /// No stub directory could be located.
    #[error("stub directory not found: {0}")]
    StubDirNotFound(String),

    /// At least one target of a multi-target run failed.
    #[error("pack failed: {failed} of {total} targets failed")]
    TargetsFailed {
        /// Number of targets that failed.
        failed: usize,
        /// Number of targets requested.
        total: usize,
    },

    /// Output could not be rendered.
    #[error("output rendering failed: {0}")]
    Render(String),

    /// IO error wrapper.
    #[error("io operation failed: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a config operation error.
    pub fn config(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a targets-failed error.
    pub fn targets_failed(failed: usize, total: usize) -> Self {
        Self::TargetsFailed { failed, total }
    }
}
