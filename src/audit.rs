//! Integrity & Audit engine
//!
//! Per-block and whole-chain verification, anomaly audit, trust scoring,
//! chain fingerprinting and chain diffing. Corruption is reported, never
//! silently repaired: a failed check surfaces as `false` or as an audit
//! issue.

use crate::block::{Block, BlockType};
use crate::chain::Chain;
use crate::hash::{to_hex, ContentHash};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// One anomaly found by [`Chain::audit`]
#[derive(Debug, Clone, PartialEq)]
pub enum AuditIssue {
    /// Stored hash does not match recomputed content hash
    HashMismatch { index: usize },
    /// Two blocks share the same content hash
    DuplicateHash { first: usize, second: usize },
    /// A block was created before its predecessor
    NonMonotonicTimestamp { index: usize },
    /// A valid block sits below the given confidence floor
    LowConfidence { index: usize, confidence: f32 },
    /// Declared signature length disagrees with the stored bytes
    SignatureLengthMismatch { index: usize },
    /// `prev_hash` does not match the predecessor's stored hash
    BrokenLinkage { index: usize },
}

impl fmt::Display for AuditIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HashMismatch { index } => {
                write!(f, "block {}: stored hash does not match content", index)
            }
            Self::DuplicateHash { first, second } => {
                write!(f, "blocks {} and {}: duplicate content hash", first, second)
            }
            Self::NonMonotonicTimestamp { index } => {
                write!(f, "block {}: created before its predecessor", index)
            }
            Self::LowConfidence { index, confidence } => {
                write!(f, "block {}: low confidence {:.3}", index, confidence)
            }
            Self::SignatureLengthMismatch { index } => {
                write!(f, "block {}: signature length mismatch", index)
            }
            Self::BrokenLinkage { index } => {
                write!(f, "block {}: prev_hash does not match predecessor", index)
            }
        }
    }
}

/// Outcome of an audit scan: a diagnostic side effect, not authoritative
/// state. The chain itself is never mutated by auditing.
#[derive(Debug, Clone, Default)]
pub struct AuditReport {
    pub issues: Vec<AuditIssue>,
}

impl AuditReport {
    pub fn issue_count(&self) -> usize {
        self.issues.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.issues.is_empty() {
            return writeln!(f, "audit: clean");
        }
        writeln!(f, "audit: {} issue(s)", self.issues.len())?;
        for issue in &self.issues {
            writeln!(f, "  - {}", issue)?;
        }
        Ok(())
    }
}

/// Per-bucket aggregate in [`ChainStats`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeBucket {
    pub count: usize,
    pub mean_confidence: f32,
}

/// Structured chain aggregates, bucketed by block type
#[derive(Debug, Clone, Default)]
pub struct ChainStats {
    pub total: usize,
    pub valid_count: usize,
    pub mean_confidence: f32,
    pub immutable_ratio: f32,
    pub by_type: HashMap<BlockType, TypeBucket>,
}

/// Recompute a block's hash and check structural sanity: a valid block has
/// non-empty input and a confidence within [0, 1].
pub fn verify_block(block: &Block) -> bool {
    if !block.hash_matches() {
        return false;
    }
    if block.attributes.valid && block.io.input.is_empty() {
        return false;
    }
    let c = block.attributes.confidence;
    (0.0..=1.0).contains(&c)
}

impl Chain {
    /// True iff every block passes [`verify_block`]. Gate imported or
    /// deserialized chains through this before trusting them.
    pub fn verify(&self) -> bool {
        self.blocks.iter().all(verify_block)
    }

    /// Scan for anomalies: tampered or duplicate hashes, broken linkage,
    /// non-monotonic timestamps, low-confidence blocks and malformed
    /// signatures. Findings are logged and returned; nothing is fixed.
    pub fn audit(&self) -> AuditReport {
        let mut report = AuditReport::default();
        let mut seen_hashes: HashMap<ContentHash, usize> = HashMap::new();

        for (index, block) in self.blocks.iter().enumerate() {
            if !block.hash_matches() {
                report.issues.push(AuditIssue::HashMismatch { index });
            }

            match seen_hashes.get(&block.identity.hash) {
                Some(&first) => report.issues.push(AuditIssue::DuplicateHash {
                    first,
                    second: index,
                }),
                None => {
                    seen_hashes.insert(block.identity.hash, index);
                }
            }

            if index > 0 {
                let prev = &self.blocks[index - 1];
                if block.time.created_at < prev.time.created_at {
                    report
                        .issues
                        .push(AuditIssue::NonMonotonicTimestamp { index });
                }
                if let Some(link) = block.identity.prev_hash {
                    if link != prev.identity.hash {
                        report.issues.push(AuditIssue::BrokenLinkage { index });
                    }
                }
            }

            if block.attributes.valid && block.attributes.confidence < crate::MIN_CONFIDENCE {
                report.issues.push(AuditIssue::LowConfidence {
                    index,
                    confidence: block.attributes.confidence,
                });
            }

            if block.identity.sig_len as usize != block.identity.signature.len() {
                report
                    .issues
                    .push(AuditIssue::SignatureLengthMismatch { index });
            }
        }

        for issue in &report.issues {
            warn!(chain = %self.id, %issue, "audit finding");
        }
        report
    }

    /// Average confidence over blocks that are both valid and immutable,
    /// 0.0 if none qualify. Mutable blocks are deliberately excluded so the
    /// score reflects only durable knowledge.
    pub fn trust_score(&self) -> f32 {
        let trusted: Vec<f32> = self
            .blocks
            .iter()
            .filter(|b| b.attributes.valid && b.attributes.immutable)
            .map(|b| b.attributes.confidence)
            .collect();
        if trusted.is_empty() {
            return 0.0;
        }
        trusted.iter().sum::<f32>() / trusted.len() as f32
    }

    /// A single 32-byte digest of the whole chain state: block count, every
    /// block's hash and creation time, and a content-length summary.
    /// Deterministic for a given state, so two copies of a chain can be
    /// compared without shipping full contents.
    pub fn fingerprint(&self) -> ContentHash {
        let mut hasher = Sha256::new();
        hasher.update((self.blocks.len() as u64).to_le_bytes());
        for block in &self.blocks {
            hasher.update(block.identity.hash);
            hasher.update(block.time.created_at.to_le_bytes());
            hasher.update((block.io.input.len() as u64).to_le_bytes());
            hasher.update((block.io.output.len() as u64).to_le_bytes());
        }
        hasher.finalize().into()
    }

    /// Hex rendering of [`Chain::fingerprint`] for logs and reports
    pub fn fingerprint_hex(&self) -> String {
        to_hex(&self.fingerprint())
    }

    /// Count blocks that differ positionally between two chains, plus the
    /// difference in length. Two blocks differ when their hashes or their
    /// (input, output) contents disagree.
    pub fn diff_count(&self, other: &Chain) -> usize {
        let common = self.blocks.len().min(other.blocks.len());
        let mut differing = 0usize;
        for i in 0..common {
            let a = &self.blocks[i];
            let b = &other.blocks[i];
            if a.identity.hash != b.identity.hash || a.io != b.io {
                differing += 1;
            }
        }
        differing + self.blocks.len().abs_diff(other.blocks.len())
    }

    /// Aggregate counts and confidence, bucketed by block type
    pub fn stats(&self) -> ChainStats {
        let total = self.blocks.len();
        let valid_count = self.blocks.iter().filter(|b| b.attributes.valid).count();
        let immutable = self
            .blocks
            .iter()
            .filter(|b| b.attributes.immutable)
            .count();

        let mean_confidence = if total == 0 {
            0.0
        } else {
            self.blocks
                .iter()
                .map(|b| b.attributes.confidence)
                .sum::<f32>()
                / total as f32
        };

        let mut sums: HashMap<BlockType, (usize, f32)> = HashMap::new();
        for block in &self.blocks {
            let entry = sums.entry(block.block_type).or_default();
            entry.0 += 1;
            entry.1 += block.attributes.confidence;
        }
        let by_type = sums
            .into_iter()
            .map(|(t, (count, sum))| {
                (
                    t,
                    TypeBucket {
                        count,
                        mean_confidence: sum / count as f32,
                    },
                )
            })
            .collect();

        ChainStats {
            total,
            valid_count,
            mean_confidence,
            immutable_ratio: if total == 0 {
                0.0
            } else {
                immutable as f32 / total as f32
            },
            by_type,
        }
    }
}
