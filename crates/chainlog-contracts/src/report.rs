//! Verification report types.
//!
//! The verifier never throws on a broken chain. It returns a
//! `VerificationReport` whose `outcome` names the first point of divergence,
//! with enough context (line, expected and found hashes) for an operator to
//! locate the tampering.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where and how the hash chain diverged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBreak {
    /// 1-based line number in the log file, blank lines included.
    pub line: u64,
    /// The `chain_hash` of the last verified record (or the sentinel).
    pub expected_prev: String,
    /// The `prev_chain_hash` actually stored on the line, if it is a string.
    pub found_prev: Option<String>,
    /// The chain hash recomputed from the stored payload.
    pub expected_chain: String,
    /// The `chain_hash` actually stored on the line, if it is a string.
    pub found_chain: Option<String>,
}

/// How a verification scan ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationOutcome {
    /// Every chain-bearing record links and hashes correctly.
    Intact,

    /// A record's `prev_chain_hash` or `chain_hash` does not match.
    ChainBroken(ChainBreak),

    /// A signed record's HMAC does not match the configured secret.
    SignatureMismatch { line: u64 },

    /// An unsigned record was found while signatures are required.
    MissingSignature { line: u64 },

    /// A complete (newline-terminated) line is not a JSON object.
    Malformed { line: u64, reason: String },
}

/// The result of scanning one log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Chain-bearing records that passed every check.
    pub verified: u64,

    /// Records written before chain hashing was introduced. Skipped without
    /// affecting the chain.
    pub legacy_skipped: u64,

    /// Verified records with an empty signature.
    pub unsigned: u64,

    /// The file ends in a partial line that could not be parsed yet. Not
    /// treated as corruption; a writer may still be mid-append.
    pub pending_tail: bool,

    /// `chain_hash` of the last verified record, or the sentinel when none
    /// was verified. Suitable for external checkpointing, since truncating
    /// the tail of a log cannot be detected from the file alone.
    pub terminal_hash: String,

    pub outcome: VerificationOutcome,
}

impl VerificationReport {
    /// True when the scan found no divergence.
    pub fn is_success(&self) -> bool {
        self.outcome == VerificationOutcome::Intact
    }

    /// The line at which verification stopped, if it failed.
    pub fn failed_line(&self) -> Option<u64> {
        match &self.outcome {
            VerificationOutcome::Intact => None,
            VerificationOutcome::ChainBroken(b) => Some(b.line),
            VerificationOutcome::SignatureMismatch { line }
            | VerificationOutcome::MissingSignature { line }
            | VerificationOutcome::Malformed { line, .. } => Some(*line),
        }
    }
}

fn or_missing(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("<missing>")
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            VerificationOutcome::Intact => {
                write!(
                    f,
                    "OK (verified {} chained entries, {} unsigned, skipped {} legacy entries)",
                    self.verified, self.unsigned, self.legacy_skipped
                )?;
                if self.pending_tail {
                    write!(f, "; trailing partial line not yet verifiable")?;
                }
                Ok(())
            }
            VerificationOutcome::ChainBroken(b) => {
                writeln!(f, "FAIL: chain broken at line {}", b.line)?;
                writeln!(f, "   expected prev={}", b.expected_prev)?;
                writeln!(f, "   found    prev={}", or_missing(&b.found_prev))?;
                writeln!(f, "   expected chain={}", b.expected_chain)?;
                write!(f, "   found    chain={}", or_missing(&b.found_chain))
            }
            VerificationOutcome::SignatureMismatch { line } => {
                write!(f, "FAIL: signature mismatch at line {}", line)
            }
            VerificationOutcome::MissingSignature { line } => {
                write!(f, "FAIL: unsigned record at line {} while signatures are required", line)
            }
            VerificationOutcome::Malformed { line, reason } => {
                write!(f, "FAIL: malformed record at line {}: {}", line, reason)
            }
        }
    }
}
