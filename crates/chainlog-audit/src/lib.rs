//! # chainlog-audit
//!
//! Append-only, SHA-256 hash-chained, HMAC-signed audit log stored as JSON
//! Lines, plus an offline verifier.
//!
//! ## Overview
//!
//! Each record's `chain_hash` is `SHA256(prev_chain_hash || canonical_payload)`.
//! Editing, inserting, or reordering any record breaks the chain at that
//! line, which `FileVerifier` reports with the expected and found hashes.
//!
//! Truncating the tail is *not* detectable from the file alone: the
//! remaining prefix is still a valid chain. Compare
//! `VerificationReport::terminal_hash` against an externally kept checkpoint
//! to catch that.
//!
//! With no signing secret configured, records are chained but unsigned
//! (empty `signature_hmac_sha256`). An empty signature means "unsigned", not
//! "broken".
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chainlog_audit::{FileAppender, FileVerifier};
//! use chainlog_contracts::{config::AuditConfig, record::{Actor, AuditEntry}};
//! use chainlog_core::traits::AuditAppender;
//!
//! let config = AuditConfig::default().apply_env()?;
//! let appender = FileAppender::new(&config);
//! appender.append(AuditEntry::new("login").actor(Actor::new(42u64, "alice")))?;
//!
//! let report = FileVerifier::from_config(&config).verify(&config.log_path)?;
//! assert!(report.is_success());
//! ```

pub mod appender;
pub mod canonical;
pub mod chain;
pub mod tail;
pub mod verifier;

pub use appender::FileAppender;
pub use canonical::{canonical_json, canonical_payload};
pub use chain::{chain_hash, sign, verify_signature};
pub use verifier::FileVerifier;

// ── Tests ─────────────────────────────────────────────────────────────────────
