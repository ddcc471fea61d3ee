//! Stable key generation for tree nodes
//!
//! Two kinds of keys address nodes in a populated tree:
//!
//! - Content keys ([`hash_key`]) are derived from semantic content (ancestor
//!   chain plus rendered text). Identical content always yields the same
//!   key, which is what lets incremental updates reuse existing nodes.
//! - Random keys ([`random_key`]) are minted when content-based continuity
//!   does not apply, e.g. for track rows that must never merge.
//!
//! Both produce fixed-shape lowercase-hex ASCII strings suitable as map keys.

use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Hash an ordered sequence of string parts into a content key.
///
/// Order-sensitive and collision-resistant: each part is length-prefixed
/// before hashing, so `["ab", "c"]` and `["a", "bc"]` produce different
/// keys. Returns 64 hex characters.
pub fn hash_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    to_hex(&hasher.finalize())
}

/// Generate a fresh random key from the process entropy source.
///
/// Collision probability against any previously generated key is
/// negligible (128 bits). Returns 32 hex characters.
pub fn random_key() -> String {
    let bytes: [u8; 16] = rand::random();
    to_hex(&bytes)
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
