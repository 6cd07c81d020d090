//! File-backed implementation of `AuditAppender`.
//!
//! `FileAppender` keeps no chain state in memory. Every append re-reads the
//! last record's `chain_hash` from disk, builds and signs the new record, and
//! writes it as one complete line with a single `write_all`, followed by a
//! flush and `sync_data`.
//!
//! # Concurrent writers
//!
//! The read-last-hash-then-append sequence runs under an exclusive advisory
//! lock (`fs2::FileExt::lock_exclusive`) on the log file itself. Threads,
//! separate `FileAppender`s and other processes that go through this type
//! therefore cannot fork the chain. The lock is advisory: a writer that
//! ignores it can still interleave.
//!
//! # Unsigned mode
//!
//! Without a secret every record carries an empty `signature_hmac_sha256`.
//! That is fail-open by choice: the chain still exposes insertion, reordering
//! and mid-file edits, but anyone able to write the file could rewrite the
//! whole tail with a self-consistent chain. Only a signature under a secret
//! the attacker does not hold rules that out.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use tracing::{debug, info, warn};

use chainlog_contracts::{
    config::{AuditConfig, SigningSecret},
    error::{AuditError, AuditResult},
    record::{AuditEntry, BasePayload, LogRecord, SENTINEL_HASH},
};
use chainlog_core::traits::AuditAppender;

use crate::{
    canonical::canonical_payload,
    chain::{chain_hash, sign},
    tail::{lookup_prev_chain_hash, TailLookup, TAIL_BLOCK_SIZE},
};

/// Source of record timestamps.
pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Appends hash-chained, optionally signed records to a JSON Lines file.
pub struct FileAppender {
    path: PathBuf,
    secret: Option<SigningSecret>,
    strict_tail: bool,
    block_size: usize,
    clock: Clock,
}

impl FileAppender {
    /// Create an appender for `config.log_path`.
    ///
    /// Nothing is touched on disk until the first append.
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            path: config.log_path.clone(),
            secret: config.secret.clone(),
            strict_tail: config.strict_tail,
            block_size: TAIL_BLOCK_SIZE,
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the wall clock, e.g. with a fixed instant in tests.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Change the block size of the backward tail scan.
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether new records are HMAC-signed.
    pub fn is_signing(&self) -> bool {
        self.secret.is_some()
    }

    /// Open (creating if needed) the log and take the exclusive lock.
    ///
    /// The lock is released when the returned handle is dropped.
    fn open_locked(&self) -> AuditResult<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| AuditError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| AuditError::io(&self.path, e))?;
        file.lock_exclusive()
            .map_err(|e| AuditError::io(&self.path, e))?;
        Ok(file)
    }

    /// Resolve the previous chain hash, and whether the file needs a newline
    /// before the next record.
    ///
    /// A new or blank file starts a new chain. So does an unreadable tail
    /// unless `strict_tail` is set, in which case the append fails.
    fn prev_chain_hash(&self, log: &mut File) -> AuditResult<(String, bool)> {
        let lookup = lookup_prev_chain_hash(log, self.block_size);
        let needs_separator = lookup.needs_separator();

        let prev = match lookup {
            TailLookup::Found { chain_hash, .. } => chain_hash,
            TailLookup::Empty { .. } => {
                info!(path = %self.path.display(), "starting new audit chain");
                SENTINEL_HASH.to_string()
            }
            TailLookup::Legacy { .. } => {
                info!(
                    path = %self.path.display(),
                    "last audit line predates chain hashing; starting new chain"
                );
                SENTINEL_HASH.to_string()
            }
            TailLookup::Unreadable { reason, .. } => {
                if self.strict_tail {
                    return Err(AuditError::CorruptTail {
                        path: self.path.clone(),
                        reason,
                    });
                }
                warn!(
                    path = %self.path.display(),
                    reason = %reason,
                    "audit log tail unreadable; restarting chain at sentinel"
                );
                SENTINEL_HASH.to_string()
            }
        };

        Ok((prev, needs_separator))
    }

    fn write_line(&self, log: &mut File, bytes: &[u8]) -> AuditResult<()> {
        log.write_all(bytes)
            .and_then(|()| log.flush())
            .and_then(|()| log.sync_data())
            .map_err(|e| AuditError::io(&self.path, e))
    }
}

impl AuditAppender for FileAppender {
    /// Build, sign, chain, and persist one record.
    ///
    /// The timestamp comes from the appender's clock, never from the caller.
    /// Returns the committed record exactly as written.
    fn append(&self, entry: AuditEntry) -> AuditResult<LogRecord> {
        if entry.event.trim().is_empty() {
            return Err(AuditError::InvalidEvent {
                reason: "event name must not be empty".to_string(),
            });
        }

        let mut log = self.open_locked()?;

        let base = BasePayload::new(
            (self.clock)(),
            entry.event,
            entry.actor.as_ref(),
            entry.details,
            entry.critical,
        );
        let canonical = canonical_payload(&base)?;

        let (prev, needs_separator) = self.prev_chain_hash(&mut log)?;
        let this_hash = chain_hash(&prev, &canonical);
        let signature = self
            .secret
            .as_ref()
            .map(|secret| sign(secret, &canonical))
            .unwrap_or_default();

        let record = LogRecord::from_parts(base, prev, this_hash, signature);

        let mut line = Vec::with_capacity(512);
        if needs_separator {
            line.push(b'\n');
        }
        line.extend_from_slice(record.to_json_line()?.as_bytes());
        line.push(b'\n');
        self.write_line(&mut log, &line)?;
        FileExt::unlock(&log).map_err(|e| AuditError::io(&self.path, e))?;

        debug!(
            event = %record.event,
            critical = record.critical,
            signed = record.is_signed(),
            chain_hash = %record.chain_hash,
            "audit record appended"
        );

        Ok(record)
    }
}
