//! Export - persistence surface for the DSL collaborator
//!
//! Serializes a chain to JSON (human-readable) or bincode (compact) and back.
//! Every persisted field round-trips byte-for-byte: hashes, device id,
//! signature bytes with declared length, epoch-millisecond timestamps,
//! confidence and all attribute flags. Imports are gated through chain
//! verification before being trusted.

use crate::chain::{Chain, MAX_BLOCKS};
use crate::error::{Error, Result};
use std::path::Path;

impl Chain {
    /// Render the chain as pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a chain from JSON and verify it before returning
    pub fn from_json(json: &str) -> Result<Self> {
        let chain: Chain =
            serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))?;
        chain.finish_import()
    }

    /// Save as JSON, creating parent directories as needed
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Load a JSON chain from disk, verifying it before returning
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Save in compact binary form, creating parent directories as needed
    pub fn save_binary(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = bincode::serialize(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Load a binary chain from disk, verifying it before returning
    pub fn load_binary(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let chain: Chain =
            bincode::deserialize(&bytes).map_err(|e| Error::Deserialization(e.to_string()))?;
        chain.finish_import()
    }

    /// Import gate: reject over-capacity or failed-verification chains and
    /// restore the preallocated capacity the constructor guarantees.
    fn finish_import(mut self) -> Result<Self> {
        if self.blocks.len() > MAX_BLOCKS {
            return Err(Error::Verification(format!(
                "imported chain holds {} blocks, capacity is {}",
                self.blocks.len(),
                MAX_BLOCKS
            )));
        }
        if !self.verify() {
            return Err(Error::Verification(
                "imported chain failed block verification".to_string(),
            ));
        }
        self.blocks.reserve(MAX_BLOCKS - self.blocks.len());
        Ok(self)
    }
}
