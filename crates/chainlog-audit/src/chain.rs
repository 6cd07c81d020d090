//! Hash-chain and signature primitives.
//!
//! Hash input layout (bytes, in order):
//!   1. previous record's `chain_hash` as UTF-8 bytes (64 ASCII hex chars)
//!   2. canonical JSON of the base payload
//!
//! Signature input is the canonical JSON alone. The secret is process
//! configuration and never stored in the log.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use chainlog_contracts::config::SigningSecret;

type HmacSha256 = Hmac<Sha256>;

/// Compute the chain hash binding `canonical` to the previous record.
///
/// Returns a lowercase 64-character hex string.
pub fn chain_hash(prev_chain_hash: &str, canonical: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_chain_hash.as_bytes());
    hasher.update(canonical);
    hex::encode(hasher.finalize())
}

fn keyed(secret: &SigningSecret) -> HmacSha256 {
    // HMAC pads or hashes the key to the block size, so no key length is
    // ever rejected.
    HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any length"))
}

/// HMAC-SHA256 of `canonical` under `secret`, lowercase hex.
pub fn sign(secret: &SigningSecret, canonical: &[u8]) -> String {
    let mut mac = keyed(secret);
    mac.update(canonical);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a stored hex signature in constant time.
///
/// Anything that is not valid hex fails verification.
pub fn verify_signature(secret: &SigningSecret, canonical: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let mut mac = keyed(secret);
    mac.update(canonical);
    mac.verify_slice(&expected).is_ok()
}
