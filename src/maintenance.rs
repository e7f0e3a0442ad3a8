//! Maintenance engine - decay, prune, deduplicate, compress, trim, compact
//!
//! These operations mutate the chain in place to enforce invariants and
//! reclaim capacity. Immutable blocks are exempt from anything that would
//! alter their content, validity or confidence.
//!
//! Physical removal goes through one choke point ([`Chain::remove_marked`])
//! that renumbers block indices, rewrites weak cross/forward references
//! through an old→new index map (links to removed blocks are dropped), and
//! re-links `prev_index`/`prev_hash` for the survivors.

use crate::block::now_millis;
use crate::chain::Chain;
use crate::hash::content_hash;
use std::collections::HashMap;
use tracing::debug;

/// Confidence below which a decayed block is marked invalid
pub const MIN_CONFIDENCE: f32 = 0.05;

impl Chain {
    /// Subtract `rate` from every mutable block's confidence, clamped at 0.
    ///
    /// A block whose confidence falls below [`MIN_CONFIDENCE`] is marked
    /// invalid but not removed; a later prune or compact pass reclaims it.
    pub fn decay_confidence(&mut self, rate: f32) {
        let mut invalidated = 0usize;
        for block in &mut self.blocks {
            if block.attributes.immutable {
                continue;
            }
            block.attributes.confidence = (block.attributes.confidence - rate).max(0.0);
            if block.attributes.confidence < MIN_CONFIDENCE && block.attributes.valid {
                block.attributes.valid = false;
                invalidated += 1;
            }
        }
        self.updated_at = now_millis();
        debug!(rate, invalidated, "decay pass complete");
    }

    /// Physically remove blocks that are invalid, expired, or below
    /// `min_confidence`. Immutable blocks are exempt. Survivors keep their
    /// relative order. Returns the removed count.
    pub fn prune(&mut self, min_confidence: f32) -> usize {
        self.sweep_expired();
        let marks: Vec<bool> = self
            .blocks
            .iter()
            .map(|b| {
                !b.attributes.immutable
                    && (!b.attributes.valid
                        || b.attributes.expired
                        || b.attributes.confidence < min_confidence)
            })
            .collect();
        let removed = self.remove_marked(&marks);
        debug!(min_confidence, removed, "prune pass complete");
        removed
    }

    /// Remove later blocks whose (input, output) pair exactly duplicates an
    /// earlier valid block's. The first-seen block survives and absorbs the
    /// duplicate's usage count. Returns the removed count.
    pub fn deduplicate(&mut self) -> usize {
        let mut seen: HashMap<(String, String), usize> = HashMap::new();
        let mut marks = vec![false; self.blocks.len()];
        let mut absorb: Vec<(usize, u32)> = Vec::new();

        for (index, block) in self.blocks.iter().enumerate() {
            if !block.is_live() {
                continue;
            }
            let key = (block.io.input.clone(), block.io.output.clone());
            match seen.get(&key) {
                Some(&first) => {
                    marks[index] = true;
                    absorb.push((first, block.attributes.usage_count));
                }
                None => {
                    seen.insert(key, index);
                }
            }
        }

        for (first, usage) in absorb {
            let keeper = &mut self.blocks[first].attributes;
            keeper.usage_count = keeper.usage_count.saturating_add(usage);
            keeper.deduplicated = true;
        }

        let removed = self.remove_marked(&marks);
        debug!(removed, "dedupe pass complete");
        removed
    }

    /// Normalize whitespace in every mutable block's input/output in place.
    ///
    /// Content that changes gets a recomputed hash and fresh tokens and is
    /// marked compressed; the successor's `prev_hash` link is refreshed so
    /// chain linkage stays coherent. Returns the number of blocks modified.
    /// Running twice in a row modifies nothing the second time.
    pub fn compress(&mut self) -> usize {
        let mut modified = 0usize;
        let now = now_millis();

        for i in 0..self.blocks.len() {
            if self.blocks[i].attributes.immutable {
                continue;
            }
            let input = normalize_whitespace(&self.blocks[i].io.input);
            let output = normalize_whitespace(&self.blocks[i].io.output);
            if input == self.blocks[i].io.input && output == self.blocks[i].io.output {
                continue;
            }

            let block = &mut self.blocks[i];
            block.io = crate::block::BlockIo::new(&input, &output);
            block.identity.hash = content_hash(&block.io.input, &block.io.output);
            block.attributes.compressed = true;
            block.time.updated_at = now;
            let new_hash = block.identity.hash;

            if let Some(next) = self.blocks.get_mut(i + 1) {
                next.identity.prev_hash = Some(new_hash);
            }
            modified += 1;
        }

        if modified > 0 {
            self.updated_at = now;
        }
        debug!(modified, "compress pass complete");
        modified
    }

    /// Retain only the `max_blocks` most valuable blocks.
    ///
    /// Immutable blocks are always retained. Mutable blocks are ranked by
    /// confidence plus a recency fraction and the weakest are removed.
    /// Returns the removed count.
    pub fn trim(&mut self, max_blocks: usize) -> usize {
        if self.blocks.len() <= max_blocks {
            return 0;
        }

        let len = self.blocks.len();
        let mut ranked: Vec<(usize, f32)> = self
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| !b.attributes.immutable)
            .map(|(i, b)| {
                let recency = (i + 1) as f32 / len as f32;
                (i, b.attributes.confidence + recency)
            })
            .collect();
        // Weakest first; equal scores drop the older block first
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

        let immutable_count = len - ranked.len();
        let keep_target = max_blocks.max(immutable_count);
        let to_remove = len - keep_target;

        let mut marks = vec![false; len];
        for (index, _) in ranked.iter().take(to_remove) {
            marks[*index] = true;
        }

        let removed = self.remove_marked(&marks);
        debug!(max_blocks, removed, "trim pass complete");
        removed
    }

    /// Eliminate gaps: physically remove every block no longer counting as
    /// live knowledge (invalid, pruned or expired), moving survivors to the
    /// front in their original order. Returns the number of blocks that
    /// changed position.
    pub fn compact(&mut self) -> usize {
        self.sweep_expired();
        let marks: Vec<bool> = self.blocks.iter().map(|b| !b.is_live()).collect();

        // Survivors ahead of the first gap stay in place
        let first_gap = marks.iter().position(|&m| m);
        let relocated = match first_gap {
            Some(gap) => marks[gap..].iter().filter(|&&m| !m).count(),
            None => 0,
        };

        let removed = self.remove_marked(&marks);
        debug!(removed, relocated, "compact pass complete");
        relocated
    }

    /// Flag blocks whose expiry time has passed. Never touches immutable
    /// blocks (they cannot carry an expiry in the first place).
    fn sweep_expired(&mut self) {
        let now = now_millis();
        for block in &mut self.blocks {
            if !block.attributes.immutable && block.is_expired(now) {
                block.attributes.expired = true;
            }
        }
    }

    /// Remove all blocks marked `true`, renumbering indices and weak
    /// references for the survivors. Returns the removed count.
    fn remove_marked(&mut self, marks: &[bool]) -> usize {
        debug_assert_eq!(marks.len(), self.blocks.len());
        let removed = marks.iter().filter(|&&m| m).count();
        if removed == 0 {
            return 0;
        }

        // old index → new index for survivors
        let mut index_map: Vec<Option<usize>> = vec![None; marks.len()];
        let mut next = 0usize;
        for (old, &mark) in marks.iter().enumerate() {
            if !mark {
                index_map[old] = Some(next);
                next += 1;
            }
        }

        let mut old_index = 0;
        self.blocks.retain(|_| {
            let keep = !marks[old_index];
            old_index += 1;
            keep
        });

        let remap = |index: usize| index_map.get(index).copied().flatten();
        for (new_index, block) in self.blocks.iter_mut().enumerate() {
            block.identity.block_index = new_index;
            block.classification.derived_from =
                block.classification.derived_from.and_then(remap);
            let cross: Vec<usize> = block
                .classification
                .cross_refs
                .iter()
                .filter_map(|&r| remap(r))
                .collect();
            block.classification.cross_refs = cross;
            let forward: Vec<usize> = block
                .classification
                .forward_refs
                .iter()
                .filter_map(|&r| remap(r))
                .collect();
            block.classification.forward_refs = forward;
        }

        // Re-link survivors so prev_index/prev_hash reflect the new order
        for i in 0..self.blocks.len() {
            if i == 0 {
                self.blocks[0].identity.prev_index = None;
                self.blocks[0].identity.prev_hash = None;
            } else {
                let prev_hash = self.blocks[i - 1].identity.hash;
                self.blocks[i].identity.prev_index = Some(i - 1);
                self.blocks[i].identity.prev_hash = Some(prev_hash);
            }
        }

        self.updated_at = now_millis();
        removed
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::DEFAULT_CONFIDENCE;

    #[test]
    fn test_decay_clamps_at_zero() {
        let mut chain = Chain::new();
        chain.learn("a", "b").unwrap();

        chain.decay_confidence(0.2);
        let c = chain.blocks[0].attributes.confidence;
        assert!((c - (DEFAULT_CONFIDENCE - 0.2)).abs() < 1e-6);

        chain.decay_confidence(0.9);
        assert_eq!(chain.blocks[0].attributes.confidence, 0.0);
    }

    #[test]
    fn test_decay_invalidates_below_threshold() {
        let mut chain = Chain::new();
        chain.learn("a", "b").unwrap();
        chain.decay_confidence(0.48);

        let block = &chain.blocks[0];
        assert!(block.attributes.confidence < MIN_CONFIDENCE);
        assert!(!block.attributes.valid);
        // marked invalid, not removed
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_decay_skips_immutable() {
        let mut chain = Chain::new();
        let idx = chain.learn("a", "b").unwrap();
        chain.mark_immutable(idx).unwrap();
        chain.decay_confidence(0.9);

        let block = &chain.blocks[0];
        assert_eq!(block.attributes.confidence, DEFAULT_CONFIDENCE);
        assert!(block.attributes.valid);
    }

    #[test]
    fn test_prune_removes_exactly_the_weak() {
        let mut chain = Chain::new();
        chain.learn("weak", "w").unwrap();
        chain.learn("strong", "s").unwrap();
        chain.learn("dead", "d").unwrap();
        chain.blocks[0].attributes.confidence = 0.1;
        chain.blocks[1].attributes.confidence = 0.9;
        chain.blocks[2].attributes.valid = false;

        let removed = chain.prune(0.3);
        assert_eq!(removed, 2);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain.blocks[0].io.input, "strong");
        assert_eq!(chain.blocks[0].identity.block_index, 0);
    }

    #[test]
    fn test_prune_exempts_immutable() {
        let mut chain = Chain::new();
        let idx = chain.learn("keep", "me").unwrap();
        chain.mark_immutable(idx).unwrap();
        chain.blocks[0].attributes.confidence = 0.0;

        assert_eq!(chain.prune(0.5), 0);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_prune_removes_expired() {
        let mut chain = Chain::new();
        chain.learn("old", "gone").unwrap();
        chain.set_expiry(0, 1).unwrap();

        assert_eq!(chain.prune(0.0), 1);
        assert!(chain.is_empty());
    }

    #[test]
    fn test_prune_idempotent() {
        let mut chain = Chain::new();
        chain.learn("a", "b").unwrap();
        chain.blocks[0].attributes.confidence = 0.01;

        assert_eq!(chain.prune(0.3), 1);
        assert_eq!(chain.prune(0.3), 0);
    }

    #[test]
    fn test_deduplicate_keeps_first() {
        let mut chain = Chain::new();
        chain.learn("k", "v").unwrap();
        chain.learn("other", "x").unwrap();
        chain.learn("k", "v").unwrap();
        chain.blocks[0].attributes.usage_count = 3;
        chain.blocks[2].attributes.usage_count = 2;
        let first_hash = chain.blocks[0].identity.hash;

        let removed = chain.deduplicate();
        assert_eq!(removed, 1);
        assert_eq!(chain.len(), 2);
        // earlier block's identity preserved, duplicate's usage absorbed
        assert_eq!(chain.blocks[0].identity.hash, first_hash);
        assert_eq!(chain.blocks[0].attributes.usage_count, 5);
        assert!(chain.blocks[0].attributes.deduplicated);
    }

    #[test]
    fn test_deduplicate_different_outputs_kept() {
        let mut chain = Chain::new();
        chain.learn("k", "v1").unwrap();
        chain.learn("k", "v2").unwrap();

        assert_eq!(chain.deduplicate(), 0);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_compress_normalizes_and_rehashes() {
        let mut chain = Chain::new();
        chain.learn("hello   world", "a\tb").unwrap();
        chain.learn("tidy", "already").unwrap();

        let modified = chain.compress();
        assert_eq!(modified, 1);

        let block = &chain.blocks[0];
        assert_eq!(block.io.input, "hello world");
        assert_eq!(block.io.output, "a b");
        assert!(block.attributes.compressed);
        assert!(block.hash_matches());
        // successor linkage refreshed
        assert_eq!(
            chain.blocks[1].identity.prev_hash,
            Some(chain.blocks[0].identity.hash)
        );

        // second pass is a no-op
        assert_eq!(chain.compress(), 0);
    }

    #[test]
    fn test_compress_skips_immutable() {
        let mut chain = Chain::new();
        let idx = chain.learn("spaced   out", "v").unwrap();
        chain.mark_immutable(idx).unwrap();

        assert_eq!(chain.compress(), 0);
        assert_eq!(chain.blocks[0].io.input, "spaced   out");
    }

    #[test]
    fn test_trim_keeps_most_valuable() {
        let mut chain = Chain::new();
        for i in 0..6 {
            chain.learn(&format!("k{}", i), "v").unwrap();
        }
        chain.blocks[0].attributes.confidence = 0.95;
        for block in chain.blocks.iter_mut().skip(1) {
            block.attributes.confidence = 0.1;
        }

        let removed = chain.trim(3);
        assert_eq!(removed, 3);
        assert_eq!(chain.len(), 3);
        // high confidence survives despite being the oldest
        assert!(chain.blocks.iter().any(|b| b.io.input == "k0"));
        // most recent of the weak ones survives on recency
        assert!(chain.blocks.iter().any(|b| b.io.input == "k5"));
    }

    #[test]
    fn test_trim_retains_immutable() {
        let mut chain = Chain::new();
        for i in 0..4 {
            chain.learn(&format!("k{}", i), "v").unwrap();
        }
        chain.mark_immutable(0).unwrap();
        chain.mark_immutable(1).unwrap();

        chain.trim(1);
        assert_eq!(chain.len(), 2);
        assert!(chain.blocks.iter().all(|b| b.attributes.immutable));
    }

    #[test]
    fn test_trim_noop_when_under_limit() {
        let mut chain = Chain::new();
        chain.learn("a", "b").unwrap();
        assert_eq!(chain.trim(10), 0);
    }

    #[test]
    fn test_compact_removes_gaps_preserving_order() {
        let mut chain = Chain::new();
        for i in 0..5 {
            chain.learn(&format!("k{}", i), "v").unwrap();
        }
        chain.blocks[1].attributes.valid = false;
        chain.blocks[3].attributes.valid = false;

        let relocated = chain.compact();
        assert_eq!(relocated, 2); // k2 and k4 moved forward
        assert_eq!(chain.len(), 3);
        let inputs: Vec<&str> = chain.blocks.iter().map(|b| b.io.input.as_str()).collect();
        assert_eq!(inputs, vec!["k0", "k2", "k4"]);
        // indices renumbered, timestamps still ascending
        for (i, block) in chain.blocks.iter().enumerate() {
            assert_eq!(block.identity.block_index, i);
        }
        assert!(chain
            .blocks
            .windows(2)
            .all(|w| w[0].time.created_at <= w[1].time.created_at));
    }

    #[test]
    fn test_compact_preserves_live_count() {
        let mut chain = Chain::new();
        for i in 0..4 {
            chain.learn(&format!("k{}", i), "v").unwrap();
        }
        chain.blocks[0].attributes.valid = false;
        let live_before = chain.blocks.iter().filter(|b| b.is_live()).count();

        chain.compact();
        assert_eq!(chain.len(), live_before);
        // idempotent: nothing moves the second time
        assert_eq!(chain.compact(), 0);
    }

    #[test]
    fn test_removal_renumbers_weak_refs() {
        let mut chain = Chain::new();
        chain.learn("k0", "v").unwrap();
        chain.learn("k1", "v1").unwrap();
        chain.learn("k2", "v2").unwrap();
        // k2 derived from k0, cross-linked to k1 and k0
        chain.blocks[2].classification.derived_from = Some(0);
        chain.blocks[2].classification.add_cross_ref(0);
        chain.blocks[2].classification.add_cross_ref(1);
        chain.blocks[1].attributes.valid = false;

        chain.compact();
        assert_eq!(chain.len(), 2);
        let survivor = &chain.blocks[1];
        assert_eq!(survivor.io.input, "k2");
        assert_eq!(survivor.classification.derived_from, Some(0));
        // the link to the removed block is dropped, k0's link renumbered
        assert_eq!(survivor.classification.cross_refs, vec![0]);
        // chain linkage rebuilt over the survivors
        assert_eq!(survivor.identity.prev_index, Some(0));
        assert_eq!(
            survivor.identity.prev_hash,
            Some(chain.blocks[0].identity.hash)
        );
    }
}
