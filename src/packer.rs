//! Block placement.
//!
//! Descriptors are stable-sorted by size, largest first, then streamed into
//! a single open block.  When the next file would push the open block past
//! capacity the block is sealed and a fresh one opened; sealed blocks are
//! never reconsidered.  This is Next-Fit over a descending order, and the
//! output is fully determined by the input sequence.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{PackError, Result};

/// A file discovered on disk, ready for placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// Where to read the payload from.
    pub source: PathBuf,
    /// Path recorded in the block and used at extraction.
    pub path:   String,
    pub size:   u64,
    /// Unix seconds.
    pub mtime:  i64,
    pub mode:   u32,
}

/// A descriptor placed at `offset` within its block's data section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedFile {
    pub file:   FileDescriptor,
    pub offset: u64,
}

/// An assigned block.  Only ever materialized on disk through
/// [`BlockWriter`](crate::block::BlockWriter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub id:    i32,
    pub files: Vec<PackedFile>,
    /// Sum of payload bytes; never exceeds capacity.
    pub size:  u64,
}

impl Block {
    fn new(id: i32) -> Self {
        Self { id, files: Vec::new(), size: 0 }
    }

    fn push(&mut self, file: FileDescriptor) {
        let offset = self.size;
        self.size += file.size;
        debug!(block_id = self.id, path = %file.path, offset, size = file.size, "placed file");
        self.files.push(PackedFile { file, offset });
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Assign `descriptors` to blocks of at most `capacity` payload bytes.
///
/// Block IDs start at 1.  Fails on the first descriptor larger than
/// `capacity`; nothing is emitted in that case.
pub fn pack(mut descriptors: Vec<FileDescriptor>, capacity: u64) -> Result<Vec<Block>> {
    if let Some(big) = descriptors.iter().find(|d| d.size > capacity) {
        return Err(PackError::Oversized {
            path: big.source.clone(),
            size: big.size,
            capacity,
        });
    }

    // `sort_by` is stable: equal sizes keep discovery order.
    descriptors.sort_by(|a, b| b.size.cmp(&a.size));

    let mut blocks = Vec::new();
    let mut open = Block::new(1);
    for d in descriptors {
        // Overflow can only happen past `capacity`, so it seals too.
        if open.size.checked_add(d.size).map_or(true, |n| n > capacity) {
            let next = open.id + 1;
            blocks.push(std::mem::replace(&mut open, Block::new(next)));
        }
        open.push(d);
    }
    if !open.is_empty() {
        blocks.push(open);
    }
    Ok(blocks)
}
