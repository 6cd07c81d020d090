//! Audit record types.
//!
//! A `LogRecord` is one line of the JSON Lines log. Its first six fields form
//! the `BasePayload`, the only part of a record that is hashed and signed.
//! The remaining three fields (`prev_chain_hash`, `chain_hash`, signature)
//! are derived from the payload at append time and never supplied by callers.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `prev_chain_hash` of the first record in every log.
///
/// 64 hex zeros. Also used as the starting point when the previous record
/// cannot be located.
pub const SENTINEL_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Stored JSON field names. Fixed by the on-disk format.
pub mod fields {
    pub const TIMESTAMP: &str = "timestamp";
    pub const EVENT: &str = "event";
    pub const CRITICAL: &str = "critical";
    pub const ACTOR_ID: &str = "user_id";
    pub const ACTOR_LABEL: &str = "username";
    pub const DETAILS: &str = "details";
    pub const PREV_CHAIN_HASH: &str = "prev_chain_hash";
    pub const CHAIN_HASH: &str = "chain_hash";
    pub const SIGNATURE: &str = "signature_hmac_sha256";
}

/// Render a UTC instant in the log's fixed timestamp format,
/// e.g. `2024-01-01T00:00:00.000000Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Opaque identifier of the acting principal.
///
/// Chat platforms hand out numeric ids; other collaborators may use strings.
/// Both are stored as plain JSON values.
///
/// `Other` holds any stored id that is neither an unsigned integer nor a
/// string (e.g. `-5` or `1.5` written by another producer), so such records
/// still load and re-serialize to the exact value that was hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActorId {
    Numeric(u64),
    Text(String),
    Other(Value),
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorId::Numeric(id) => write!(f, "{}", id),
            ActorId::Text(id) => f.write_str(id),
            ActorId::Other(id) => write!(f, "{}", id),
        }
    }
}

impl From<u64> for ActorId {
    fn from(id: u64) -> Self {
        ActorId::Numeric(id)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        ActorId::Text(id.to_string())
    }
}

impl From<String> for ActorId {
    fn from(id: String) -> Self {
        ActorId::Text(id)
    }
}

/// The principal performing an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    /// Human-readable rendering, e.g. a display name.
    pub label: String,
}

impl Actor {
    pub fn new(id: impl Into<ActorId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// The signable portion of a record.
///
/// `timestamp` is always produced by the appender at call time, never taken
/// from the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasePayload {
    pub timestamp: String,
    pub event: String,
    pub critical: bool,
    #[serde(rename = "user_id")]
    pub actor_id: Option<ActorId>,
    #[serde(rename = "username")]
    pub actor_label: Option<String>,
    pub details: Map<String, Value>,
}

impl BasePayload {
    /// Build the payload for an event happening at `at`.
    pub fn new(
        at: DateTime<Utc>,
        event: impl Into<String>,
        actor: Option<&Actor>,
        details: Map<String, Value>,
        critical: bool,
    ) -> Self {
        Self {
            timestamp: format_timestamp(at),
            event: event.into(),
            critical,
            actor_id: actor.map(|a| a.id.clone()),
            actor_label: actor.map(|a| a.label.clone()),
            details,
        }
    }

    /// The payload as a JSON object keyed by the stored field names.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(fields::TIMESTAMP.into(), Value::String(self.timestamp.clone()));
        map.insert(fields::EVENT.into(), Value::String(self.event.clone()));
        map.insert(fields::CRITICAL.into(), Value::Bool(self.critical));
        map.insert(
            fields::ACTOR_ID.into(),
            match &self.actor_id {
                Some(ActorId::Numeric(id)) => Value::from(*id),
                Some(ActorId::Text(id)) => Value::String(id.clone()),
                Some(ActorId::Other(id)) => id.clone(),
                None => Value::Null,
            },
        );
        map.insert(
            fields::ACTOR_LABEL.into(),
            self.actor_label.clone().map(Value::String).unwrap_or(Value::Null),
        );
        map.insert(fields::DETAILS.into(), Value::Object(self.details.clone()));
        Value::Object(map)
    }

    /// Rebuild the signable payload from a stored JSON object, exactly as it
    /// was presented to the hash at append time.
    ///
    /// Fields are copied verbatim so that any stored value, including ones a
    /// typed `BasePayload` could not hold, is hashed as found. A missing
    /// `critical` defaults to `false` and a missing `details` to `{}`; any
    /// other missing field becomes `null`.
    pub fn value_from_stored(entry: &Map<String, Value>) -> Value {
        let field = |name: &str| entry.get(name).cloned().unwrap_or(Value::Null);

        let mut map = Map::new();
        map.insert(fields::TIMESTAMP.into(), field(fields::TIMESTAMP));
        map.insert(fields::EVENT.into(), field(fields::EVENT));
        map.insert(
            fields::CRITICAL.into(),
            entry
                .get(fields::CRITICAL)
                .cloned()
                .unwrap_or(Value::Bool(false)),
        );
        map.insert(fields::ACTOR_ID.into(), field(fields::ACTOR_ID));
        map.insert(fields::ACTOR_LABEL.into(), field(fields::ACTOR_LABEL));
        map.insert(
            fields::DETAILS.into(),
            entry
                .get(fields::DETAILS)
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new())),
        );
        Value::Object(map)
    }
}

/// One committed, append-only entry of the audit log.
///
/// Serializes to a single JSON object using the on-disk field names
/// (`user_id`, `username`, `signature_hmac_sha256`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    /// UTC event time, e.g. `2024-01-01T00:00:00.000000Z`.
    pub timestamp: String,

    /// Short symbolic event name, e.g. `staff_assign`.
    pub event: String,

    /// Escalation hint for downstream consumers. Has no effect on hashing
    /// beyond being part of the payload.
    pub critical: bool,

    /// The acting principal's id, or `None` for system-initiated actions.
    #[serde(rename = "user_id")]
    pub actor_id: Option<ActorId>,

    /// The acting principal's display label, or `None`.
    #[serde(rename = "username")]
    pub actor_label: Option<String>,

    /// Arbitrary JSON details. Opaque to the log.
    #[serde(default)]
    pub details: Map<String, Value>,

    /// `chain_hash` of the preceding record, or `SENTINEL_HASH`.
    pub prev_chain_hash: String,

    /// SHA-256 (hex) over `prev_chain_hash` followed by the canonical payload.
    pub chain_hash: String,

    /// HMAC-SHA256 (hex) over the canonical payload, or empty when no
    /// signing secret was configured at append time.
    ///
    /// An empty value means "unsigned", not "broken".
    #[serde(rename = "signature_hmac_sha256", default)]
    pub signature: String,
}

impl LogRecord {
    /// Assemble a committed record from its payload and derived hashes.
    pub fn from_parts(
        base: BasePayload,
        prev_chain_hash: String,
        chain_hash: String,
        signature: String,
    ) -> Self {
        Self {
            timestamp: base.timestamp,
            event: base.event,
            critical: base.critical,
            actor_id: base.actor_id,
            actor_label: base.actor_label,
            details: base.details,
            prev_chain_hash,
            chain_hash,
            signature,
        }
    }

    /// The signable portion of this record.
    pub fn base_payload(&self) -> BasePayload {
        BasePayload {
            timestamp: self.timestamp.clone(),
            event: self.event.clone(),
            critical: self.critical,
            actor_id: self.actor_id.clone(),
            actor_label: self.actor_label.clone(),
            details: self.details.clone(),
        }
    }

    /// Whether the record carries an HMAC signature.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Serialize as one compact JSON line, without the trailing newline.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse one JSON line back into a record.
    pub fn from_json_line(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line.trim())
    }
}

/// What a collaborator asks the log to record.
///
/// ```rust,ignore
/// let entry = AuditEntry::new("permission_denied")
///     .actor(Actor::new(42u64, "alice"))
///     .detail("permission", "staff_assign")
///     .critical(true);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub event: String,
    pub actor: Option<Actor>,
    pub details: Map<String, Value>,
    pub critical: bool,
}

impl AuditEntry {
    /// A non-critical, system-initiated entry with empty details.
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            actor: None,
            details: Map::new(),
            critical: false,
        }
    }

    pub fn actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Replace the whole details mapping.
    pub fn details(mut self, details: Map<String, Value>) -> Self {
        self.details = details;
        self
    }

    /// Insert a single details key.
    pub fn detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }
}
