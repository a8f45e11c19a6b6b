//! # Idempotency Keys
//!
//! Every sale carries an `offline_id` generated on the terminal. Before the
//! sale is sent, that id is turned into the idempotency key the server uses
//! to accept a transaction at most once.
//!
//! ## Key Derivation (version 1)
//! ```text
//! offline_id ──► parses as a UUID? ──yes──► lower-case hyphenated form
//!                       │
//!                       no (legacy free-form id, e.g. "T1-000042")
//!                       │
//!                       ▼
//!       UUID v5( IDEMPOTENCY_NAMESPACE, "offline-id:v1:" + offline_id )
//! ```
//!
//! The namespace and the prefix are a versioned contract. Changing either
//! maps already-queued legacy sales to new keys, and the server would then
//! accept them a second time.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for name-based keys. Never change.
pub const IDEMPOTENCY_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a4e_8b3d_4c7a_9e51_0d2b_7f48_a3c6);

/// Prefix hashed ahead of legacy ids. Bump the version to change the scheme.
pub const LEGACY_ID_PREFIX: &str = "offline-id:v1:";

/// A canonical, UUID-shaped idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdempotencyKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the idempotency key for an offline id.
///
/// Pure and deterministic: the same input yields the same key in every
/// process, on every terminal. Surrounding whitespace is ignored.
pub fn idempotency_key(offline_id: &str) -> IdempotencyKey {
    let trimmed = offline_id.trim();
    let uuid = match Uuid::try_parse(trimmed) {
        Ok(parsed) => parsed,
        Err(_) => {
            let name = format!("{LEGACY_ID_PREFIX}{trimmed}");
            Uuid::new_v5(&IDEMPOTENCY_NAMESPACE, name.as_bytes())
        }
    };
    IdempotencyKey(uuid.hyphenated().to_string())
}

/// Generate a fresh offline id for a sale that arrived without one.
pub fn new_offline_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_ids_are_canonicalised() {
        let lower = "3f2b8c1e-9a4d-4e6f-8b2a-1c3d5e7f9a0b";
        assert_eq!(idempotency_key(lower).as_str(), lower);
        assert_eq!(
            idempotency_key("3F2B8C1E-9A4D-4E6F-8B2A-1C3D5E7F9A0B").as_str(),
            lower
        );
        assert_eq!(
            idempotency_key("3f2b8c1e9a4d4e6f8b2a1c3d5e7f9a0b").as_str(),
            lower
        );
        assert_eq!(idempotency_key(&format!("  {lower}\n")).as_str(), lower);
    }

    #[test]
    fn test_legacy_ids_are_deterministic() {
        let a = idempotency_key("T1-000042");
        let b = idempotency_key("T1-000042");
        assert_eq!(a, b);
        assert_ne!(a, idempotency_key("T1-000043"));

        let parsed = Uuid::parse_str(a.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 5);
    }

    #[test]
    fn test_legacy_key_matches_documented_derivation() {
        let expected =
            Uuid::new_v5(&IDEMPOTENCY_NAMESPACE, b"offline-id:v1:legacy-7").to_string();
        assert_eq!(idempotency_key("legacy-7").as_str(), expected);
    }

    #[test]
    fn test_new_offline_id_is_its_own_key() {
        let id = new_offline_id();
        assert_eq!(idempotency_key(&id).as_str(), id);
    }
}
