//! Trait seams between the audit log and the rest of the system.
//!
//! - `AuditAppender`: trusted sink, commits one record per call
//! - `RecordForwarder`: optional notification sink for committed records
//!
//! Collaborators (command handlers, permission checks) depend on these
//! traits only. They supply an event, an actor, and details; they never see
//! how the record is chained or signed.

use chainlog_contracts::{
    error::AuditResult,
    record::{AuditEntry, LogRecord},
};

use crate::forward::ForwardSummary;

/// The append side of the audit log.
///
/// Every call commits exactly one record or fails. A failed append is fatal
/// to that call and is never retried by the implementation; the caller
/// decides whether to abort the audited action or continue.
pub trait AuditAppender: Send + Sync {
    /// Append one entry and return the committed record.
    ///
    /// Implementations must treat this as append-only: records written here
    /// are never modified or deleted.
    fn append(&self, entry: AuditEntry) -> AuditResult<LogRecord>;
}

/// A destination for summaries of committed records, e.g. a moderation
/// channel.
///
/// Which fields are shown is decided by `ForwardSummary`; forwarders only
/// deliver it.
pub trait RecordForwarder: Send + Sync {
    fn forward(&self, summary: &ForwardSummary) -> AuditResult<()>;
}
