//! Audit log configuration.
//!
//! `AuditConfig` is built once per process and injected into the appender
//! and verifier. Layers, lowest precedence first:
//!
//! 1. Built-in defaults (`logs/audit.log`, unsigned, lenient tail).
//! 2. An optional TOML file (`from_file` / `from_toml_str`).
//! 3. Process environment (`apply_env`).
//!
//! The signing secret is only ever taken from the environment. It is never
//! written to TOML, to `Debug` output, or to the log itself.
//!
//! Example TOML:
//! ```toml
//! log_path = "/var/lib/bot/audit.log"
//! strict_tail = false
//! require_signatures = true
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};

/// Log file location used when nothing else is configured.
pub const DEFAULT_LOG_PATH: &str = "logs/audit.log";

/// Environment variable overriding `log_path`.
pub const ENV_LOG_PATH: &str = "CHAINLOG_PATH";
/// Environment variable holding the HMAC signing secret.
pub const ENV_HMAC_SECRET: &str = "CHAINLOG_HMAC_SECRET";
/// Environment variable enabling `strict_tail`.
pub const ENV_STRICT_TAIL: &str = "CHAINLOG_STRICT_TAIL";
/// Environment variable enabling `require_signatures`.
pub const ENV_REQUIRE_SIGNATURES: &str = "CHAINLOG_REQUIRE_SIGNATURES";

/// HMAC key material. Redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret(Vec<u8>);

impl SigningSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningSecret(<redacted>)")
    }
}

/// Configuration shared by the appender and the verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Path of the JSON Lines log file.
    pub log_path: PathBuf,

    /// HMAC secret. `None` puts the log in unsigned mode: records are still
    /// hash-chained, but their signature field is empty.
    #[serde(skip)]
    pub secret: Option<SigningSecret>,

    /// Fail appends when the last line of the log cannot be read back,
    /// instead of restarting the chain at the sentinel.
    pub strict_tail: bool,

    /// Treat unsigned records as verification failures when a secret is
    /// configured.
    pub require_signatures: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            secret: None,
            strict_tail: false,
            require_signatures: false,
        }
    }
}

impl AuditConfig {
    /// Unsigned, lenient configuration for the log at `log_path`.
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            ..Self::default()
        }
    }

    /// Set the signing secret.
    pub fn with_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = Some(SigningSecret::new(secret));
        self
    }

    /// Parse `s` as TOML.
    ///
    /// Returns `AuditError::Config` if the TOML is malformed or contains
    /// unknown keys.
    pub fn from_toml_str(s: &str) -> AuditResult<Self> {
        toml::from_str(s).map_err(|e| AuditError::Config {
            reason: format!("failed to parse audit config TOML: {}", e),
        })
    }

    /// Read and parse the TOML file at `path`.
    pub fn from_file(path: &Path) -> AuditResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| AuditError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Overlay values from the process environment.
    pub fn apply_env(self) -> AuditResult<Self> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup.
    ///
    /// An empty `CHAINLOG_HMAC_SECRET` counts as unset.
    pub fn apply_env_from<F>(mut self, lookup: F) -> AuditResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_LOG_PATH).filter(|p| !p.trim().is_empty()) {
            self.log_path = PathBuf::from(path);
        }
        if let Some(secret) = lookup(ENV_HMAC_SECRET).filter(|s| !s.is_empty()) {
            self.secret = Some(SigningSecret::new(secret.into_bytes()));
        }
        if let Some(raw) = lookup(ENV_STRICT_TAIL) {
            self.strict_tail = parse_flag(ENV_STRICT_TAIL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REQUIRE_SIGNATURES) {
            self.require_signatures = parse_flag(ENV_REQUIRE_SIGNATURES, &raw)?;
        }
        Ok(self)
    }

    /// Whether new records will carry an HMAC signature.
    pub fn is_signing(&self) -> bool {
        self.secret.is_some()
    }
}

fn parse_flag(key: &str, raw: &str) -> AuditResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AuditError::Config {
            reason: format!("{} must be a boolean flag, got '{}'", key, other),
        }),
    }
}
