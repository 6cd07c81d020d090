//! Error types for the chainlog audit log.
//!
//! All fallible operations return `AuditResult<T>`. Chain mismatches found by
//! the verifier are not errors: they are reported as values inside
//! `VerificationReport` so the whole scan is never aborted silently.

use std::path::PathBuf;

use thiserror::Error;

/// The unified error type for appending, verifying, and configuring a log.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The log file could not be created, opened, read, or appended to.
    ///
    /// Fatal to the call that triggered it. Appends are never retried
    /// internally.
    #[error("audit log I/O failed for '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record or its details could not be serialized to JSON.
    #[error("audit record serialization failed: {reason}")]
    Serialization { reason: String },

    /// The last line of the log could not be read back while locating the
    /// previous chain hash. Only raised in strict tail mode.
    #[error("audit log tail at '{}' is unreadable: {reason}", path.display())]
    CorruptTail { path: PathBuf, reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The caller supplied an event the log refuses to record.
    #[error("invalid audit event: {reason}")]
    InvalidEvent { reason: String },

    /// A notification forwarder failed to deliver a record summary.
    #[error("record forwarding failed: {reason}")]
    Forward { reason: String },
}

impl AuditError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            reason: e.to_string(),
        }
    }
}

/// Convenience alias used throughout the chainlog crates.
pub type AuditResult<T> = Result<T, AuditError>;
