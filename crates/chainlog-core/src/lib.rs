//! # chainlog-core
//!
//! The collaborator-facing side of the chainlog audit log.
//!
//! This crate provides:
//! - The two seams (`AuditAppender`, `RecordForwarder`)
//! - The `AuditRecorder` that appends and then forwards
//! - `ForwardSummary`, the compact shape shown in notification channels
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chainlog_core::AuditRecorder;
//! use chainlog_contracts::record::{Actor, AuditEntry};
//!
//! let recorder = AuditRecorder::new(Box::new(appender)).with_forwarder(Box::new(channel));
//! let record = recorder.record(
//!     AuditEntry::new("staff_assign").actor(Actor::new(42u64, "alice")),
//! )?;
//! ```

pub mod forward;
pub mod recorder;
pub mod traits;

pub use forward::ForwardSummary;
pub use recorder::AuditRecorder;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Value};

    use chainlog_contracts::{
        error::{AuditError, AuditResult},
        record::{Actor, ActorId, AuditEntry, LogRecord, SENTINEL_HASH},
    };

    use crate::{
        forward::SUMMARY_CHAR_LIMIT,
        traits::{AuditAppender, RecordForwarder},
        AuditRecorder, ForwardSummary,
    };

    // ── Mocks ─────────────────────────────────────────────────────────────────

    /// Commits every entry with fixed hashes, or fails when `fail` is set.
    struct MockAppender {
        fail: bool,
        appended: Arc<Mutex<Vec<String>>>,
    }

    impl AuditAppender for MockAppender {
        fn append(&self, entry: AuditEntry) -> AuditResult<LogRecord> {
            if self.fail {
                return Err(AuditError::io(
                    "audit.log",
                    std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
                ));
            }
            self.appended.lock().unwrap().push(entry.event.clone());
            Ok(LogRecord {
                timestamp: "2024-01-01T00:00:00.000000Z".to_string(),
                event: entry.event,
                critical: entry.critical,
                actor_id: entry.actor.as_ref().map(|a| a.id.clone()),
                actor_label: entry.actor.map(|a| a.label),
                details: entry.details,
                prev_chain_hash: SENTINEL_HASH.to_string(),
                chain_hash: "ab".repeat(32),
                signature: "cd".repeat(32),
            })
        }
    }

    /// Captures forwarded summaries, or fails every call.
    struct MockForwarder {
        fail: bool,
        seen: Arc<Mutex<Vec<ForwardSummary>>>,
    }

    impl RecordForwarder for MockForwarder {
        fn forward(&self, summary: &ForwardSummary) -> AuditResult<()> {
            if self.fail {
                return Err(AuditError::Forward {
                    reason: "channel unavailable".to_string(),
                });
            }
            self.seen.lock().unwrap().push(summary.clone());
            Ok(())
        }
    }

    fn appender(fail: bool) -> (Box<MockAppender>, Arc<Mutex<Vec<String>>>) {
        let appended = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(MockAppender {
                fail,
                appended: Arc::clone(&appended),
            }),
            appended,
        )
    }

    fn forwarder(fail: bool) -> (Box<MockForwarder>, Arc<Mutex<Vec<ForwardSummary>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(MockForwarder {
                fail,
                seen: Arc::clone(&seen),
            }),
            seen,
        )
    }

    // ── Recorder ──────────────────────────────────────────────────────────────

    #[test]
    fn record_without_forwarder_returns_committed_record() {
        let (app, appended) = appender(false);
        let recorder = AuditRecorder::new(app);

        let record = recorder
            .record(AuditEntry::new("login").actor(Actor::new(42u64, "alice")))
            .unwrap();

        assert_eq!(record.event, "login");
        assert_eq!(record.actor_id, Some(ActorId::Numeric(42)));
        assert_eq!(*appended.lock().unwrap(), vec!["login".to_string()]);
    }

    #[test]
    fn record_forwards_summary_after_append() {
        let (app, _) = appender(false);
        let (fwd, seen) = forwarder(false);
        let recorder = AuditRecorder::new(app).with_forwarder(fwd);

        let record = recorder
            .record(AuditEntry::new("staff_assign").detail("role", "mod").critical(true))
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].event, "staff_assign");
        assert!(seen[0].critical);
        assert_eq!(seen[0].chain_hash, record.chain_hash);
    }

    #[test]
    fn forward_failure_does_not_fail_the_record() {
        let (app, appended) = appender(false);
        let (fwd, _) = forwarder(true);
        let recorder = AuditRecorder::new(app).with_forwarder(fwd);

        let record = recorder.record(AuditEntry::new("ban")).unwrap();
        assert_eq!(record.event, "ban");
        assert_eq!(appended.lock().unwrap().len(), 1);
    }

    #[test]
    fn append_failure_propagates_and_skips_forwarding() {
        let (app, _) = appender(true);
        let (fwd, seen) = forwarder(false);
        let recorder = AuditRecorder::new(app).with_forwarder(fwd);

        let err = recorder.record(AuditEntry::new("ban")).unwrap_err();
        assert!(matches!(err, AuditError::Io { .. }));
        assert!(seen.lock().unwrap().is_empty());
    }

    // ── Summary ───────────────────────────────────────────────────────────────

    fn sample_record(details: Value) -> LogRecord {
        LogRecord {
            timestamp: "2024-01-01T00:00:00.000000Z".to_string(),
            event: "permission_denied".to_string(),
            critical: false,
            actor_id: Some(ActorId::Numeric(7)),
            actor_label: Some("bob".to_string()),
            details: details.as_object().cloned().unwrap_or_default(),
            prev_chain_hash: SENTINEL_HASH.to_string(),
            chain_hash: "ef".repeat(32),
            signature: "12".repeat(32),
        }
    }

    #[test]
    fn summary_omits_signature() {
        let summary = ForwardSummary::from_record(&sample_record(json!({"permission": "kick"})));
        let rendered: Value = serde_json::from_str(&summary.render()).unwrap();

        assert_eq!(rendered["user"], json!("bob"));
        assert_eq!(rendered["uid"], json!(7));
        assert_eq!(rendered["details"]["permission"], json!("kick"));
        assert!(rendered.get("signature_hmac_sha256").is_none());
        assert!(!summary.render().contains(&"12".repeat(32)));
    }

    #[test]
    fn summary_truncates_on_char_boundary() {
        let long = "é".repeat(3000);
        let summary = ForwardSummary::from_record(&sample_record(json!({"note": long})));
        let rendered = summary.render();

        assert_eq!(rendered.chars().count(), SUMMARY_CHAR_LIMIT);
        let block = summary.render_code_block();
        assert!(block.starts_with("```json\n"));
        assert!(block.ends_with("\n```"));
    }
}
