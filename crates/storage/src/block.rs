//! Block identifiers for the block-blob protocol
//!
//! Block IDs are sequence markers, not content hashes: `base64("{n:06}")`
//! with `n` counting from 1. All IDs of one object share the same encoded
//! length, which the service requires.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use std::fmt;

/// Width of the zero-padded decimal counter inside a block ID
pub const BLOCK_ID_WIDTH: usize = 6;

/// Base64-encoded block identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(String);

impl BlockId {
    /// ID for the `n`th block of an upload (1-based)
    pub fn sequence(n: u32) -> Self {
        let raw = format!("{:0width$}", n, width = BLOCK_ID_WIDTH);
        Self(BASE64_STANDARD.encode(raw.as_bytes()))
    }

    /// Wrap an already-encoded ID received from a caller or the service
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode back to the sequence number, if this ID was produced by [`BlockId::sequence`]
    pub fn decode(&self) -> Option<u32> {
        let raw = BASE64_STANDARD.decode(&self.0).ok()?;
        let text = std::str::from_utf8(&raw).ok()?;
        if text.len() != BLOCK_ID_WIDTH {
            return None;
        }
        text.parse().ok()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Uncommitted,
    Committed,
}

/// One uploaded sub-range of an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id: BlockId,
    pub status: BlockStatus,
    /// Bytes carried by this block
    pub size: u64,
}

impl Block {
    pub fn uncommitted(id: BlockId, size: u64) -> Self {
        Self {
            id,
            status: BlockStatus::Uncommitted,
            size,
        }
    }

    pub fn committed(self) -> Self {
        Self {
            status: BlockStatus::Committed,
            ..self
        }
    }
}
