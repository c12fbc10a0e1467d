//! Content fingerprints used as ETags.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hashes the compact JSON encoding of `payload` with SHA-256 and returns
/// 64 lowercase hex characters.
///
/// Struct fields serialize in declaration order and JSON objects in the
/// order their keys were inserted (or parsed), so the same payload always
/// hashes to the same value.
///
/// # Examples
///
/// ```
/// use parkhero::fingerprint::fingerprint;
///
/// let tag = fingerprint(&serde_json::json!({ "garages": [] })).unwrap();
/// assert_eq!(tag.len(), 64);
/// ```
pub fn fingerprint<T: Serialize + ?Sized>(payload: &T) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
