//! Hashing & Identity - deterministic fingerprints for blocks and chains
//!
//! A block's identity is a SHA-256 digest over its (input, output) pair.
//! Recomputing the hash from current content must reproduce the stored bytes,
//! which is what tamper detection in the audit engine relies on. This is an
//! integrity check, not a non-repudiation scheme.

use sha2::{Digest, Sha256};

/// Size of a content hash in bytes
pub const HASH_SIZE: usize = 32;

/// A 32-byte content fingerprint
pub type ContentHash = [u8; HASH_SIZE];

/// Compute the content hash of an input/output pair.
///
/// Deterministic: the same pair always yields the same 32 bytes. Lengths are
/// mixed in ahead of the content so ("ab", "c") and ("a", "bc") cannot
/// collide by concatenation.
pub fn content_hash(input: &str, output: &str) -> ContentHash {
    let mut hasher = Sha256::new();

    hasher.update((input.len() as u64).to_le_bytes());
    hasher.update(input.as_bytes());
    hasher.update((output.len() as u64).to_le_bytes());
    hasher.update(output.as_bytes());

    hasher.finalize().into()
}

/// Render a hash as lowercase hex (diagnostics and audit reports)
pub fn to_hex(hash: &ContentHash) -> String {
    let mut s = String::with_capacity(HASH_SIZE * 2);
    for byte in hash {
        s.push_str(&format!("{:02x}", byte));
    }
    s
}
