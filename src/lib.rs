//! # memchain
//!
//! An append-mostly, fixed-capacity associative memory: a chain of blocks
//! that records input→output observations, fingerprints each one, and
//! answers queries by confidence-weighted retrieval.
//!
//! ## Core Concept
//!
//! A [`Chain`] owns up to [`MAX_BLOCKS`] blocks by value. Each [`Block`]
//! carries a SHA-256 content hash, linkage to its predecessor, provenance
//! metadata and a confidence score in [0, 1] that decays over time. The
//! store stays bounded: maintenance passes reclaim capacity instead of the
//! chain growing.
//!
//! ## Components
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | Hashing & identity | [`hash`] | deterministic block/chain fingerprints |
//! | Block model | [`block`] | the unit of memory |
//! | Chain container | [`chain`] | capacity-bounded ownership, `learn`/`cleanup` |
//! | Reasoning | [`reason`] | exact, fuzzy and multi-hop retrieval |
//! | Maintenance | [`maintenance`] | decay, prune, dedupe, compress, trim, compact |
//! | Integrity & audit | [`audit`] | verification, trust score, fingerprint, diff |
//! | Signing | [`sign`] | injected signature capability over block identity |
//! | Export | [`export`] | JSON/binary round-trip persistence |
//!
//! ## Concurrency
//!
//! Single-threaded and synchronous. Nothing here locks; callers that share a
//! chain across threads must serialize externally (an `Arc<Mutex<Chain>>` is
//! the usual shape).
//!
//! ## Example
//!
//! ```rust
//! use memchain::{Chain, UNKNOWN};
//! # fn main() -> memchain::Result<()> {
//!
//! let mut chain = Chain::new();
//! chain.learn("greeting", "hello")?;
//! chain.learn("hello", "world")?;
//!
//! assert_eq!(chain.reason("greeting"), "hello");
//! assert_eq!(chain.reason_chain("greeting", 2), "world");
//! assert_eq!(chain.reason("absent"), UNKNOWN);
//!
//! // decay weakens everything mutable; prune reclaims the invalid
//! chain.decay_confidence(0.1);
//! chain.prune(0.2);
//!
//! assert!(chain.verify());
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod block;
pub mod chain;
pub mod error;
pub mod export;
pub mod hash;
pub mod maintenance;
pub mod reason;
pub mod sign;

// Re-exports
pub use crate::audit::{verify_block, AuditIssue, AuditReport, ChainStats, TypeBucket};
pub use crate::block::{
    tokenize, Block, BlockAttributes, BlockClassification, BlockIdentity, BlockIo, BlockTime,
    BlockType, Millis, DEFAULT_CONFIDENCE, DEVICE_ID_SIZE, MAX_IO_LEN, MAX_REFS, MAX_TAGS,
    MAX_TOKENS, SIGNATURE_SIZE,
};
pub use crate::chain::{Chain, MAX_BLOCKS};
pub use crate::error::{Error, Result};
pub use crate::hash::{content_hash, ContentHash, HASH_SIZE};
pub use crate::maintenance::MIN_CONFIDENCE;
pub use crate::reason::{BlockMatch, UNKNOWN};
pub use crate::sign::{
    verify_block_signature, BlockSigner, BlockVerifier, Ed25519Signer, Ed25519Verifier,
};
