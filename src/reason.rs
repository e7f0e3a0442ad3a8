//! Matching & Reasoning engine
//!
//! Exact and fuzzy lookup over the chain, confidence-weighted best-match
//! selection, and multi-hop reasoning traversal. Absence of knowledge is a
//! normal outcome here: queries answer with the [`UNKNOWN`] sentinel, never
//! an error.

use crate::block::Block;
use crate::chain::Chain;
use std::cmp::Ordering;

/// Sentinel answer when no block matches a query
pub const UNKNOWN: &str = "Unknown";

/// A resolved match with the evidence the caller needs to decide whether to
/// trust it or fall back.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockMatch {
    pub output: String,
    pub confidence: f32,
    pub block_index: usize,
    /// Edit distance between the query and the matched input (0 = exact)
    pub distance: usize,
}

impl Chain {
    /// Return the output of the most recent live block whose input equals the
    /// query exactly, or [`UNKNOWN`]. Bumps the matched block's usage count.
    pub fn reason(&mut self, input: &str) -> String {
        match self.exact_match_index(input) {
            Some(index) => {
                self.touch(index);
                self.blocks[index].io.output.clone()
            }
            None => UNKNOWN.to_string(),
        }
    }

    /// Exact lookup that also reports confidence and the matched block.
    pub fn reason_verbose(&mut self, input: &str) -> Option<BlockMatch> {
        let index = self.exact_match_index(input)?;
        self.touch(index);
        let block = &self.blocks[index];
        Some(BlockMatch {
            output: block.io.output.clone(),
            confidence: block.attributes.confidence,
            block_index: index,
            distance: 0,
        })
    }

    /// Approximate lookup by edit distance when no exact match exists.
    ///
    /// A candidate is acceptable when at most half of the query's characters
    /// differ (`distance * 2 <= query chars`). Ties on distance break by
    /// higher confidence, then by recency. Returns [`UNKNOWN`] when nothing
    /// is within the bound.
    pub fn fuzzy_reason(&mut self, input: &str) -> String {
        match self.fuzzy_match(input) {
            Some(m) => {
                self.touch(m.block_index);
                m.output
            }
            None => UNKNOWN.to_string(),
        }
    }

    /// Fuzzy lookup returning full match evidence, without touching usage.
    pub fn fuzzy_match(&self, input: &str) -> Option<BlockMatch> {
        let max_distance = input.chars().count() / 2;
        let mut best: Option<BlockMatch> = None;

        for (index, block) in self.blocks.iter().enumerate() {
            if !block.is_live() {
                continue;
            }
            let distance = levenshtein(input, &block.io.input);
            if distance > max_distance {
                continue;
            }
            let candidate = BlockMatch {
                output: block.io.output.clone(),
                confidence: block.attributes.confidence,
                block_index: index,
                distance,
            };
            let better = match &best {
                None => true,
                Some(b) => match candidate.distance.cmp(&b.distance) {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => {
                        match candidate.confidence.total_cmp(&b.confidence) {
                            Ordering::Greater => true,
                            Ordering::Less => false,
                            // Same distance and confidence: prefer recency
                            Ordering::Equal => candidate.block_index > b.block_index,
                        }
                    }
                },
            };
            if better {
                best = Some(candidate);
            }
        }

        best
    }

    /// Select the most trustworthy live block.
    ///
    /// Ordering is total and deterministic: descending confidence, immutable
    /// blocks over mutable on ties, then higher index (most recent). Repeated
    /// calls on an unchanged chain always return the same block.
    pub fn best_match(&self) -> Option<&Block> {
        self.blocks
            .iter()
            .filter(|b| b.is_live())
            .max_by(|a, b| {
                a.attributes
                    .confidence
                    .total_cmp(&b.attributes.confidence)
                    .then(a.attributes.immutable.cmp(&b.attributes.immutable))
                    .then(a.identity.block_index.cmp(&b.identity.block_index))
            })
    }

    /// Alias kept for callers that think in terms of "strongest memory"
    pub fn best_memory(&self) -> Option<&Block> {
        self.best_match()
    }

    /// Multi-hop reasoning: feed each hop's output back in as the next input.
    ///
    /// Depth 0 returns the input itself. A hop with no exact match stops the
    /// traversal; the deepest resolved value is returned. If not even the
    /// first hop resolves, the answer is [`UNKNOWN`]. Depth beyond the
    /// available hop chain clamps to the deepest resolved value.
    pub fn reason_chain(&mut self, input: &str, depth: usize) -> String {
        if depth == 0 {
            return input.to_string();
        }

        let mut current = input.to_string();
        let mut resolved_any = false;

        for _ in 0..depth {
            match self.exact_match_index(&current) {
                Some(index) => {
                    self.touch(index);
                    current = self.blocks[index].io.output.clone();
                    resolved_any = true;
                }
                None => break,
            }
        }

        if resolved_any {
            current
        } else {
            UNKNOWN.to_string()
        }
    }

    /// True if a live block stores the same input with a *different* output.
    /// Used to detect contradictory knowledge before insertion.
    pub fn detect_conflict(&self, input: &str, output: &str) -> bool {
        self.blocks
            .iter()
            .filter(|b| b.is_live())
            .any(|b| b.io.input == input && b.io.output != output)
    }

    /// Index of the most recent live block with an exactly equal input
    fn exact_match_index(&self, input: &str) -> Option<usize> {
        self.blocks
            .iter()
            .enumerate()
            .rev()
            .find(|(_, b)| b.is_live() && b.io.input == input)
            .map(|(i, _)| i)
    }
}

/// Classic two-row Levenshtein distance over chars
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("helo", "hello"), 1);
    }

    #[test]
    fn test_exact_reason() {
        let mut chain = Chain::new();
        chain.learn("hello", "world").unwrap();

        assert_eq!(chain.reason("hello"), "world");
        assert_eq!(chain.reason("unknown"), UNKNOWN);
    }

    #[test]
    fn test_reason_prefers_most_recent() {
        let mut chain = Chain::new();
        chain.learn("k", "old").unwrap();
        chain.learn("k", "new").unwrap();

        assert_eq!(chain.reason("k"), "new");
    }

    #[test]
    fn test_reason_skips_invalid() {
        let mut chain = Chain::new();
        chain.learn("k", "dead").unwrap();
        chain.blocks[0].attributes.valid = false;

        assert_eq!(chain.reason("k"), UNKNOWN);
    }

    #[test]
    fn test_reason_bumps_usage() {
        let mut chain = Chain::new();
        chain.learn("k", "v").unwrap();
        chain.reason("k");
        chain.reason("k");
        assert_eq!(chain.blocks[0].attributes.usage_count, 2);
    }

    #[test]
    fn test_reason_verbose() {
        let mut chain = Chain::new();
        chain.learn("k", "v").unwrap();
        chain.blocks[0].attributes.confidence = 0.7;

        let m = chain.reason_verbose("k").unwrap();
        assert_eq!(m.output, "v");
        assert_eq!(m.confidence, 0.7);
        assert_eq!(m.block_index, 0);
        assert_eq!(m.distance, 0);

        assert!(chain.reason_verbose("missing").is_none());
    }

    #[test]
    fn test_fuzzy_reason_within_bound() {
        let mut chain = Chain::new();
        chain.learn("hello", "world").unwrap();
        chain.learn("foo", "bar").unwrap();

        // distance 1, query length 4: acceptable
        assert_eq!(chain.fuzzy_reason("helo"), "world");
    }

    #[test]
    fn test_fuzzy_reason_threshold_pinned() {
        let mut chain = Chain::new();
        chain.learn("abcdef", "match").unwrap();

        // distance 3 over a 6-char query sits exactly on the bound
        assert_eq!(chain.fuzzy_reason("abcxyz"), "match");
        // distance 4 over a 6-char query is out of bounds
        assert_eq!(chain.fuzzy_reason("abwxyz"), UNKNOWN);
    }

    #[test]
    fn test_fuzzy_ties_break_by_confidence() {
        let mut chain = Chain::new();
        chain.learn("cata", "low").unwrap();
        chain.learn("catb", "high").unwrap();
        chain.blocks[0].attributes.confidence = 0.2;
        chain.blocks[1].attributes.confidence = 0.9;

        // both inputs are distance 1 from the query
        assert_eq!(chain.fuzzy_reason("catc"), "high");
    }

    #[test]
    fn test_fuzzy_empty_chain() {
        let mut chain = Chain::new();
        assert_eq!(chain.fuzzy_reason("anything"), UNKNOWN);
    }

    #[test]
    fn test_best_match_order() {
        let mut chain = Chain::new();
        chain.learn("a", "b").unwrap();
        chain.learn("c", "d").unwrap();
        chain.blocks[0].attributes.confidence = 0.9;
        chain.blocks[1].attributes.confidence = 0.4;

        let best = chain.best_match().unwrap();
        assert_eq!(best.io.input, "a");
    }

    #[test]
    fn test_best_match_tie_prefers_immutable() {
        let mut chain = Chain::new();
        chain.learn("a", "b").unwrap();
        chain.learn("c", "d").unwrap();
        chain.blocks[0].attributes.confidence = 0.5;
        chain.blocks[1].attributes.confidence = 0.5;
        chain.blocks[0].attributes.immutable = true;

        let best = chain.best_match().unwrap();
        assert_eq!(best.io.input, "a");
    }

    #[test]
    fn test_best_match_tie_prefers_recent() {
        let mut chain = Chain::new();
        chain.learn("a", "b").unwrap();
        chain.learn("c", "d").unwrap();

        // identical confidence, neither immutable: recency wins
        let best = chain.best_match().unwrap();
        assert_eq!(best.io.input, "c");
    }

    #[test]
    fn test_best_match_deterministic() {
        let mut chain = Chain::new();
        for i in 0..10 {
            chain.learn(&format!("k{}", i), "v").unwrap();
        }
        let first = chain.best_match().unwrap().identity.block_index;
        for _ in 0..5 {
            assert_eq!(chain.best_match().unwrap().identity.block_index, first);
        }
    }

    #[test]
    fn test_reason_chain_hops() {
        let mut chain = Chain::new();
        chain.learn("a", "b").unwrap();
        chain.learn("b", "c").unwrap();
        chain.learn("c", "d").unwrap();

        assert_eq!(chain.reason_chain("a", 0), "a");
        assert_eq!(chain.reason_chain("a", 1), "b");
        assert_eq!(chain.reason_chain("a", 2), "c");
        assert_eq!(chain.reason_chain("a", 3), "d");
        // depth beyond the hop chain clamps to the deepest resolved value
        assert_eq!(chain.reason_chain("a", 10), "d");
        assert_eq!(chain.reason_chain("z", 2), UNKNOWN);
    }

    #[test]
    fn test_detect_conflict() {
        let mut chain = Chain::new();
        chain.learn("apple", "fruit").unwrap();

        assert!(chain.detect_conflict("apple", "company"));
        assert!(!chain.detect_conflict("apple", "fruit"));
        assert!(!chain.detect_conflict("pear", "fruit"));
    }
}
