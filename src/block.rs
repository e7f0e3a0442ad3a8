//! Block - the unit of memory
//!
//! A block records one learned input→output fact together with its identity
//! (content hash, chain linkage, signature), timing, lifecycle attributes and
//! classification metadata. Blocks are owned by value inside a [`Chain`];
//! cross/forward references are weak index links into the same chain, never
//! ownership.
//!
//! [`Chain`]: crate::chain::Chain

use crate::hash::{content_hash, ContentHash};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Maximum byte length of a block's input or output text
pub const MAX_IO_LEN: usize = 64;

/// Maximum tokens kept per input/output text
pub const MAX_TOKENS: usize = 16;

/// Maximum byte length of a single token
pub const MAX_TOKEN_LEN: usize = 16;

/// Maximum weak references (cross or forward) per block
pub const MAX_REFS: usize = 4;

/// Maximum tags per block
pub const MAX_TAGS: usize = 8;

/// Size of a device identifier in bytes
pub const DEVICE_ID_SIZE: usize = 16;

/// Size of a signature in bytes
pub const SIGNATURE_SIZE: usize = 64;

/// Default confidence assigned to freshly learned blocks
pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Epoch milliseconds; persisted as a plain i64 so timestamps round-trip
/// bit-for-bit through any serialization format.
pub type Millis = i64;

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> Millis {
    Utc::now().timestamp_millis()
}

/// Provenance class of a block, governs default trust weighting and how the
/// audit engine treats it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BlockType {
    #[default]
    Unknown,
    /// Directly observed input→output pair (the `learn` default)
    Observed,
    /// Derived by multi-hop reasoning
    Inferred,
    /// Verified against an external source
    Validated,
    /// Replaces an earlier, contradicted block
    Corrected,
    /// Held provisionally
    Assumed,
    /// Withdrawn; kept only for audit history
    Retracted,
    Experimental,
    /// Supplied by an operator or system prompt
    Guided,
    Immutable,
    Archived,
}

impl BlockType {
    /// Default trust weight for this provenance class
    pub fn trust_weight(&self) -> f32 {
        match self {
            Self::Unknown => 0.1,
            Self::Observed => 0.5,
            Self::Inferred => 0.4,
            Self::Validated => 0.9,
            Self::Corrected => 0.7,
            Self::Assumed => 0.3,
            Self::Retracted => 0.0,
            Self::Experimental => 0.2,
            Self::Guided => 0.8,
            Self::Immutable => 1.0,
            Self::Archived => 0.6,
        }
    }

    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Observed => "observed",
            Self::Inferred => "inferred",
            Self::Validated => "validated",
            Self::Corrected => "corrected",
            Self::Assumed => "assumed",
            Self::Retracted => "retracted",
            Self::Experimental => "experimental",
            Self::Guided => "guided",
            Self::Immutable => "immutable",
            Self::Archived => "archived",
        }
    }
}

/// Input/output payload plus bounded tokenized forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockIo {
    pub input: String,
    pub output: String,
    pub input_tokens: Vec<String>,
    pub output_tokens: Vec<String>,
}

impl BlockIo {
    /// Build a payload, truncating over-long text at a char boundary and
    /// tokenizing both sides.
    pub fn new(input: &str, output: &str) -> Self {
        let input = truncate_io(input);
        let output = truncate_io(output);
        let input_tokens = tokenize(&input);
        let output_tokens = tokenize(&output);
        Self {
            input,
            output,
            input_tokens,
            output_tokens,
        }
    }
}

/// Identity and chain-linkage fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockIdentity {
    /// Content hash over (input, output)
    pub hash: ContentHash,

    /// Position in the chain at insertion time
    pub block_index: usize,

    /// Index of the previous block, None for the first block
    pub prev_index: Option<usize>,

    /// Content hash of the previous block at insertion time
    pub prev_hash: Option<ContentHash>,

    /// Identifier of the device that produced this block
    pub device_id: [u8; DEVICE_ID_SIZE],

    /// Signature over the content hash (empty until signed)
    pub signature: Vec<u8>,

    /// Declared signature length
    pub sig_len: u16,
}

/// Timing fields, all epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockTime {
    pub created_at: Millis,

    /// Milliseconds since the previous block was created
    pub delta_ms: Millis,

    /// How long producing this observation took
    pub duration_ms: Millis,

    pub updated_at: Millis,

    /// 0 means no expiry
    pub expires_at: Millis,

    pub validated_at: Millis,
}

/// Lifecycle and trust attributes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockAttributes {
    /// Content frozen; exempt from decay, prune, compress and trim
    pub immutable: bool,
    pub valid: bool,
    /// Trust in this block's content, in [0, 1]
    pub confidence: f32,
    /// Incremented on every successful lookup, never decremented
    pub usage_count: u32,
    pub pruned: bool,
    pub redacted: bool,
    pub deduplicated: bool,
    pub compressed: bool,
    pub expired: bool,
    pub trusted: bool,
    pub conflicted: bool,
}

impl Default for BlockAttributes {
    fn default() -> Self {
        Self {
            immutable: false,
            valid: true,
            confidence: DEFAULT_CONFIDENCE,
            usage_count: 0,
            pruned: false,
            redacted: false,
            deduplicated: false,
            compressed: false,
            expired: false,
            trusted: false,
            conflicted: false,
        }
    }
}

/// Classification and reasoning metadata
///
/// All index fields are weak links into the owning chain. Compaction
/// renumbers them; links to removed blocks are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BlockClassification {
    /// Block this one was derived from, if any
    pub derived_from: Option<usize>,

    /// Graph edges to related blocks (at most [`MAX_REFS`])
    pub cross_refs: Vec<usize>,

    /// Forward edges to blocks derived from this one (at most [`MAX_REFS`])
    pub forward_refs: Vec<usize>,

    /// Hops taken when this block was inferred
    pub reasoning_depth: u16,

    /// Free-text classification reason
    pub reason: String,

    /// At most [`MAX_TAGS`] tags
    pub tags: Vec<String>,

    pub similarity: f32,
    pub hallucination: bool,
    pub contradiction: bool,
}

impl BlockClassification {
    /// Add a cross reference, ignoring the request once full
    pub fn add_cross_ref(&mut self, index: usize) -> bool {
        if self.cross_refs.len() < MAX_REFS {
            self.cross_refs.push(index);
            true
        } else {
            false
        }
    }

    /// Add a forward reference, ignoring the request once full
    pub fn add_forward_ref(&mut self, index: usize) -> bool {
        if self.forward_refs.len() < MAX_REFS {
            self.forward_refs.push(index);
            true
        } else {
            false
        }
    }

    /// Add a tag, ignoring the request once full
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        if self.tags.len() < MAX_TAGS {
            self.tags.push(tag.into());
            true
        } else {
            false
        }
    }
}

/// One learned input→output fact with full metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub io: BlockIo,
    pub identity: BlockIdentity,
    pub time: BlockTime,
    pub attributes: BlockAttributes,
    pub classification: BlockClassification,
    pub block_type: BlockType,
}

impl Block {
    /// Build a block for an input/output pair.
    ///
    /// Linkage fields (`prev_index`, `prev_hash`, `delta_ms`) come from the
    /// chain at insertion time; the chain is the only caller.
    pub(crate) fn new(
        input: &str,
        output: &str,
        block_index: usize,
        device_id: [u8; DEVICE_ID_SIZE],
    ) -> Self {
        let io = BlockIo::new(input, output);
        let hash = content_hash(&io.input, &io.output);
        let now = now_millis();

        Self {
            io,
            identity: BlockIdentity {
                hash,
                block_index,
                prev_index: None,
                prev_hash: None,
                device_id,
                signature: Vec::new(),
                sig_len: 0,
            },
            time: BlockTime {
                created_at: now,
                delta_ms: 0,
                duration_ms: 0,
                updated_at: now,
                expires_at: 0,
                validated_at: 0,
            },
            attributes: BlockAttributes::default(),
            classification: BlockClassification::default(),
            block_type: BlockType::Observed,
        }
    }

    /// Recompute the content hash from current input/output
    pub fn compute_hash(&self) -> ContentHash {
        content_hash(&self.io.input, &self.io.output)
    }

    /// True if the stored hash matches the recomputed content hash
    pub fn hash_matches(&self) -> bool {
        self.identity.hash == self.compute_hash()
    }

    /// True if this block has passed its expiry time (0 = never expires)
    pub fn is_expired(&self, now: Millis) -> bool {
        self.time.expires_at != 0 && now >= self.time.expires_at
    }

    /// True if the block counts as live knowledge: valid, not pruned, not
    /// expired as of its flags.
    pub fn is_live(&self) -> bool {
        self.attributes.valid && !self.attributes.pruned && !self.attributes.expired
    }
}

fn truncate_io(text: &str) -> String {
    if text.len() <= MAX_IO_LEN {
        return text.to_string();
    }
    let mut end = MAX_IO_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

/// Split text into lowercase alphanumeric tokens, bounded by
/// [`MAX_TOKENS`] and [`MAX_TOKEN_LEN`].
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .take(MAX_TOKENS)
        .map(|t| {
            let lower = t.to_lowercase();
            let mut end = lower.len().min(MAX_TOKEN_LEN);
            while !lower.is_char_boundary(end) {
                end -= 1;
            }
            lower[..end].to_string()
        })
        .collect()
}
