//! The recorder: append first, then optionally forward.
//!
//!   AuditEntry → AuditAppender::append → LogRecord → [RecordForwarder::forward]
//!
//! The append result is authoritative. Forwarding is best effort: a failed
//! forward is logged and the committed record is still returned, because the
//! record is already on disk and the audited action must not be reported as
//! unaudited.

use tracing::{debug, warn};

use chainlog_contracts::{
    error::AuditResult,
    record::{AuditEntry, LogRecord},
};

use crate::{
    forward::ForwardSummary,
    traits::{AuditAppender, RecordForwarder},
};

/// Single entry point collaborators call to audit an action.
pub struct AuditRecorder {
    appender: Box<dyn AuditAppender>,
    forwarder: Option<Box<dyn RecordForwarder>>,
}

impl AuditRecorder {
    /// A recorder that only appends.
    pub fn new(appender: Box<dyn AuditAppender>) -> Self {
        Self {
            appender,
            forwarder: None,
        }
    }

    /// Also forward a summary of every committed record.
    pub fn with_forwarder(mut self, forwarder: Box<dyn RecordForwarder>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Append `entry` and, if configured, forward its summary.
    ///
    /// # Errors
    ///
    /// Returns `Err` only when the append fails. Forwarding errors are
    /// logged with `warn!` and swallowed.
    pub fn record(&self, entry: AuditEntry) -> AuditResult<LogRecord> {
        let record = self.appender.append(entry)?;

        if let Some(forwarder) = &self.forwarder {
            let summary = ForwardSummary::from_record(&record);
            match forwarder.forward(&summary) {
                Ok(()) => debug!(
                    event = %record.event,
                    chain_hash = %record.chain_hash,
                    "audit record forwarded"
                ),
                Err(e) => warn!(
                    event = %record.event,
                    chain_hash = %record.chain_hash,
                    error = %e,
                    "audit record committed but forwarding failed"
                ),
            }
        }

        Ok(record)
    }
}
