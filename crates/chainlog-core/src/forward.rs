//! Compact record summaries for notification channels.
//!
//! Chat channels have tight message limits and should not echo signatures,
//! so a forwarded record is reduced to a short, readable shape before it
//! leaves the process.

use serde::Serialize;
use serde_json::{Map, Value};

use chainlog_contracts::record::{ActorId, LogRecord};

/// Character budget for the rendered summary body.
pub const SUMMARY_CHAR_LIMIT: usize = 1800;

/// The fields of a record that are safe to show in a shared channel.
///
/// The HMAC signature is deliberately left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForwardSummary {
    pub ts: String,
    pub event: String,
    pub user: Option<String>,
    pub uid: Option<ActorId>,
    pub critical: bool,
    pub details: Map<String, Value>,
    pub chain_hash: String,
    pub prev_chain_hash: String,
}

impl ForwardSummary {
    pub fn from_record(record: &LogRecord) -> Self {
        Self {
            ts: record.timestamp.clone(),
            event: record.event.clone(),
            user: record.actor_label.clone(),
            uid: record.actor_id.clone(),
            critical: record.critical,
            details: record.details.clone(),
            chain_hash: record.chain_hash.clone(),
            prev_chain_hash: record.prev_chain_hash.clone(),
        }
    }

    /// Pretty JSON, cut to `SUMMARY_CHAR_LIMIT` characters.
    ///
    /// Truncation counts characters, not bytes, so multi-byte text is never
    /// split.
    pub fn render(&self) -> String {
        let pretty = serde_json::to_string_pretty(self).unwrap_or_else(|e| {
            format!("{{\"event\": {:?}, \"error\": {:?}}}", self.event, e.to_string())
        });
        match pretty.char_indices().nth(SUMMARY_CHAR_LIMIT) {
            Some((cut, _)) => pretty[..cut].to_string(),
            None => pretty,
        }
    }

    /// `render()` wrapped in a fenced JSON block for markdown chat clients.
    pub fn render_code_block(&self) -> String {
        format!("```json\n{}\n```", self.render())
    }
}
