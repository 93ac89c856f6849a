//! Error types for campus-core.
//!
//! The simulation itself is total: filters fail open, unknown records are
//! ignored and out-of-range controls are clamped. Errors only come from the
//! file-backed sinks and from parsing names supplied by a caller.

use thiserror::Error;

/// Errors raised by core sinks and lookups.
#[derive(Debug, Error)]
pub enum CoreError {
    /// IO error from a file-backed sink or storage.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No dataset family with this name.
    #[error("Unknown series kind: {0}")]
    UnknownSeries(String),

    /// No report format with this name.
    #[error("Unknown report kind: {0}")]
    UnknownReport(String),

    /// No dashboard view with this name.
    #[error("Unknown view: {0}")]
    UnknownView(String),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
