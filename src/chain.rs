//! Chain - fixed-capacity ordered container of blocks
//!
//! The chain exclusively owns its blocks. All mutation funnels through this
//! module so the capacity bound and block invariants are enforced in one
//! place. Storage is preallocated at construction; `learn` never allocates
//! block slots and `cleanup` discards content without releasing capacity.
//!
//! Not safe for concurrent mutation. Callers needing shared access wrap the
//! chain in an external mutex and serialize.

use crate::block::{now_millis, Block, BlockType, Millis, DEVICE_ID_SIZE};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Hard capacity bound of a chain
pub const MAX_BLOCKS: usize = 128;

/// Fixed-capacity ordered sequence of at most [`MAX_BLOCKS`] blocks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chain {
    /// Unique ID for this chain
    pub id: String,

    /// Identifier of the owning device
    pub device_id: [u8; DEVICE_ID_SIZE],

    pub created_at: Millis,
    pub updated_at: Millis,

    /// Blocks in insertion order, oldest first
    pub blocks: Vec<Block>,
}

impl Chain {
    /// Create an empty chain with a zero device id
    pub fn new() -> Self {
        Self::with_device_id([0u8; DEVICE_ID_SIZE])
    }

    /// Create an empty chain owned by the given device
    pub fn with_device_id(device_id: [u8; DEVICE_ID_SIZE]) -> Self {
        let now = now_millis();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            device_id,
            created_at: now,
            updated_at: now,
            blocks: Vec::with_capacity(MAX_BLOCKS),
        }
    }

    /// Record an input→output observation as a new block.
    ///
    /// The block is appended at the first free slot with linkage to the
    /// current tail. Returns the new block's index.
    ///
    /// Errors with [`Error::ChainFull`] at capacity and
    /// [`Error::InvalidInput`] on empty input or output.
    pub fn learn(&mut self, input: &str, output: &str) -> Result<usize> {
        if input.is_empty() {
            return Err(Error::InvalidInput("empty input".to_string()));
        }
        if output.is_empty() {
            return Err(Error::InvalidInput("empty output".to_string()));
        }
        if self.blocks.len() >= MAX_BLOCKS {
            return Err(Error::ChainFull(MAX_BLOCKS));
        }

        let index = self.blocks.len();
        let mut block = Block::new(input, output, index, self.device_id);

        if let Some(prev) = self.blocks.last() {
            block.identity.prev_index = Some(prev.identity.block_index);
            block.identity.prev_hash = Some(prev.identity.hash);
            block.time.delta_ms = (block.time.created_at - prev.time.created_at).max(0);
        }

        self.blocks.push(block);
        self.updated_at = now_millis();
        Ok(index)
    }

    /// Discard all blocks. Capacity is retained.
    pub fn cleanup(&mut self) {
        self.blocks.clear();
        self.updated_at = now_millis();
    }

    /// Number of blocks currently stored
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True if the chain holds no blocks
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// True if no further blocks can be learned
    pub fn is_full(&self) -> bool {
        self.blocks.len() >= MAX_BLOCKS
    }

    /// Borrow a block by index
    pub fn get(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Freeze a block: content, validity and confidence become immutable to
    /// every maintenance operation. Also marks it trusted and promotes its
    /// provenance class.
    pub fn mark_immutable(&mut self, index: usize) -> Result<()> {
        let block = self
            .blocks
            .get_mut(index)
            .ok_or(Error::BlockNotFound(index))?;
        block.attributes.immutable = true;
        block.attributes.trusted = true;
        block.block_type = BlockType::Immutable;
        block.time.updated_at = now_millis();
        self.updated_at = now_millis();
        Ok(())
    }

    /// Set a block's expiry time in epoch milliseconds (0 clears it).
    ///
    /// Immutable blocks cannot be scheduled for expiry.
    pub fn set_expiry(&mut self, index: usize, expires_at: Millis) -> Result<()> {
        let block = self
            .blocks
            .get_mut(index)
            .ok_or(Error::BlockNotFound(index))?;
        if block.attributes.immutable {
            return Err(Error::InvalidInput(
                "immutable blocks cannot expire".to_string(),
            ));
        }
        block.time.expires_at = expires_at;
        block.time.updated_at = now_millis();
        self.updated_at = now_millis();
        Ok(())
    }

    /// Record a successful lookup against a block. Usage only ever grows;
    /// housekeeping like this is still allowed on immutable blocks.
    pub(crate) fn touch(&mut self, index: usize) {
        if let Some(block) = self.blocks.get_mut(index) {
            block.attributes.usage_count = block.attributes.usage_count.saturating_add(1);
            block.time.validated_at = now_millis();
        }
    }

    /// Fraction of capacity holding live knowledge, 0.0 for an empty chain
    pub fn knowledge_coverage(&self) -> f32 {
        let live = self.blocks.iter().filter(|b| b.is_live()).count();
        live as f32 / MAX_BLOCKS as f32
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}
