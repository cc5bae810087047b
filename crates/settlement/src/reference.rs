//! Deterministic settlement references.
//!
//! The externally visible reference is derived from the idempotency key
//! and the acting principal. A retried request therefore produces the
//! same reference, and the unique constraint on the domain record turns
//! the crash-between-commit-and-save window into a fast `Conflict`
//! instead of a duplicate posting.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Derives a unique reference for a settlement record.
#[must_use]
pub fn derive_reference(prefix: &str, idempotency_key: &str, principal: Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    hasher.update(idempotency_key.as_bytes());
    hasher.update(principal.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    format!("{prefix}-{}", &hash[..20])
}
