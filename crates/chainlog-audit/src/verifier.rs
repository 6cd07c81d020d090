//! Offline verification of a persisted audit log.
//!
//! The verifier streams the file line by line, recomputes each chain-bearing
//! record's hash from its stored payload, and stops at the first divergence.
//! It only reads, so it may run while the appender is active; a final line
//! without its newline is treated as an append still in flight.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use chainlog_contracts::{
    config::{AuditConfig, SigningSecret},
    error::{AuditError, AuditResult},
    record::{fields, BasePayload, SENTINEL_HASH},
    report::{ChainBreak, VerificationOutcome, VerificationReport},
};

use crate::{
    canonical::canonical_json,
    chain::{chain_hash, verify_signature},
};

/// Checks chain continuity and, when a secret is configured, signatures.
#[derive(Debug, Clone, Default)]
pub struct FileVerifier {
    secret: Option<SigningSecret>,
    require_signatures: bool,
}

/// Running state of one scan.
struct Scan {
    line: u64,
    expected_prev: String,
    verified: u64,
    legacy_skipped: u64,
    unsigned: u64,
    pending_tail: bool,
}

impl Scan {
    fn new() -> Self {
        Self {
            line: 0,
            expected_prev: SENTINEL_HASH.to_string(),
            verified: 0,
            legacy_skipped: 0,
            unsigned: 0,
            pending_tail: false,
        }
    }

    fn finish(self, outcome: VerificationOutcome) -> VerificationReport {
        VerificationReport {
            verified: self.verified,
            legacy_skipped: self.legacy_skipped,
            unsigned: self.unsigned,
            pending_tail: self.pending_tail,
            terminal_hash: self.expected_prev,
            outcome,
        }
    }
}

/// What to do with one complete or partial line.
enum LineVerdict {
    Continue,
    Stop(VerificationOutcome),
}

impl FileVerifier {
    /// A verifier that checks chain hashes and, with a secret, signatures.
    ///
    /// `require_signatures` only has an effect when `secret` is set.
    pub fn new(secret: Option<SigningSecret>, require_signatures: bool) -> Self {
        Self {
            secret,
            require_signatures,
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.secret.clone(), config.require_signatures)
    }

    /// Verify the log at `path`.
    ///
    /// Returns `Err` only if the file cannot be opened or read. Every kind of
    /// divergence is reported through `VerificationReport::outcome`.
    pub fn verify(&self, path: &Path) -> AuditResult<VerificationReport> {
        let file = File::open(path).map_err(|e| AuditError::io(path, e))?;
        let report = self
            .verify_reader(BufReader::new(file))
            .map_err(|e| AuditError::io(path, e))?;

        if report.is_success() {
            info!(
                path = %path.display(),
                verified = report.verified,
                legacy_skipped = report.legacy_skipped,
                unsigned = report.unsigned,
                pending_tail = report.pending_tail,
                "audit log verified"
            );
        } else {
            warn!(
                path = %path.display(),
                line = ?report.failed_line(),
                verified = report.verified,
                "audit log verification failed"
            );
        }
        Ok(report)
    }

    /// Verify a log from any buffered reader.
    pub fn verify_reader<R: BufRead>(&self, mut reader: R) -> std::io::Result<VerificationReport> {
        let mut scan = Scan::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            scan.line += 1;
            let terminated = buf.last() == Some(&b'\n');

            match self.check_line(&mut scan, &buf, terminated) {
                LineVerdict::Continue => {}
                LineVerdict::Stop(outcome) => return Ok(scan.finish(outcome)),
            }
        }

        Ok(scan.finish(VerificationOutcome::Intact))
    }

    fn check_line(&self, scan: &mut Scan, raw: &[u8], terminated: bool) -> LineVerdict {
        let parsed = std::str::from_utf8(raw)
            .map_err(|e| e.to_string())
            .and_then(|text| {
                let text = text.trim();
                if text.is_empty() {
                    return Ok(None);
                }
                match serde_json::from_str::<Value>(text) {
                    Ok(Value::Object(entry)) => Ok(Some(entry)),
                    Ok(_) => Err("line is not a JSON object".to_string()),
                    Err(e) => Err(e.to_string()),
                }
            });

        let entry = match parsed {
            Ok(Some(entry)) => entry,
            Ok(None) => return LineVerdict::Continue,
            Err(reason) if !terminated => {
                debug!(line = scan.line, reason = %reason, "trailing partial line not yet verifiable");
                scan.pending_tail = true;
                return LineVerdict::Continue;
            }
            Err(reason) => {
                return LineVerdict::Stop(VerificationOutcome::Malformed {
                    line: scan.line,
                    reason,
                })
            }
        };

        if !entry.contains_key(fields::CHAIN_HASH) || !entry.contains_key(fields::PREV_CHAIN_HASH) {
            scan.legacy_skipped += 1;
            return LineVerdict::Continue;
        }

        self.check_chained(scan, &entry)
    }

    fn check_chained(&self, scan: &mut Scan, entry: &Map<String, Value>) -> LineVerdict {
        let base = BasePayload::value_from_stored(entry);
        let canonical = match canonical_json(&base) {
            Ok(bytes) => bytes,
            Err(e) => {
                return LineVerdict::Stop(VerificationOutcome::Malformed {
                    line: scan.line,
                    reason: e.to_string(),
                })
            }
        };
        let expected_chain = chain_hash(&scan.expected_prev, &canonical);

        let found_prev = entry.get(fields::PREV_CHAIN_HASH).and_then(Value::as_str);
        let found_chain = entry.get(fields::CHAIN_HASH).and_then(Value::as_str);

        if found_prev != Some(scan.expected_prev.as_str()) || found_chain != Some(expected_chain.as_str()) {
            return LineVerdict::Stop(VerificationOutcome::ChainBroken(ChainBreak {
                line: scan.line,
                expected_prev: scan.expected_prev.clone(),
                found_prev: found_prev.map(str::to_string),
                expected_chain,
                found_chain: found_chain.map(str::to_string),
            }));
        }

        let signature = entry
            .get(fields::SIGNATURE)
            .and_then(Value::as_str)
            .unwrap_or("");

        if signature.is_empty() {
            scan.unsigned += 1;
            if self.secret.is_some() && self.require_signatures {
                return LineVerdict::Stop(VerificationOutcome::MissingSignature { line: scan.line });
            }
        } else if let Some(secret) = &self.secret {
            if !verify_signature(secret, &canonical, signature) {
                return LineVerdict::Stop(VerificationOutcome::SignatureMismatch { line: scan.line });
            }
        }

        scan.expected_prev = expected_chain;
        scan.verified += 1;
        LineVerdict::Continue
    }
}
