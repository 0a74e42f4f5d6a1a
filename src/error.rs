//! Crate-wide error taxonomy.
//!
//! Every variant carries the context needed to locate the failure: a
//! filesystem path, a block ID, or the expected/actual digest pair.  Nothing
//! here is retried; every error is fatal to the operation that raised it.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::block::DecodeError;
use crate::integrity::Digest;

pub type Result<T> = std::result::Result<T, PackError>;

#[derive(Error, Debug)]
pub enum PackError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed block {}: {source}", path.display())]
    MalformedBlock {
        path:   PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("file {path} checksum mismatch: expected {}, got {}", hex::encode(expected), hex::encode(actual))]
    FileIntegrity {
        path:     String,
        expected: Digest,
        actual:   Digest,
    },

    #[error("block {block_id} checksum mismatch: expected {}, got {}", hex::encode(expected), hex::encode(actual))]
    BlockIntegrity {
        block_id: i32,
        expected: Digest,
        actual:   Digest,
    },

    #[error("no files found in {}", dir.display())]
    NoFiles { dir: PathBuf },

    #[error("file {} is {size} bytes, exceeds block capacity of {capacity} bytes", path.display())]
    Oversized {
        path:     PathBuf,
        size:     u64,
        capacity: u64,
    },

    #[error("refusing to extract unsafe path: {path}")]
    UnsafePath { path: String },

    #[error("path is not valid UTF-8: {}", path.display())]
    NonUtf8Path { path: PathBuf },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PackError {
    /// Adapter for `map_err` that attaches `path` to an I/O failure.
    pub fn io(path: &Path) -> impl FnOnce(io::Error) -> PackError + '_ {
        move |source| PackError::Io { path: path.to_path_buf(), source }
    }

    /// Attach a block path to a decode failure.  Plain I/O failures that
    /// surfaced during decode stay in the I/O class.
    pub fn decode(path: &Path, err: DecodeError) -> PackError {
        match err {
            DecodeError::Io(source) => PackError::Io { path: path.to_path_buf(), source },
            source => PackError::MalformedBlock { path: path.to_path_buf(), source },
        }
    }

    /// True for the two digest-mismatch variants.
    pub fn is_integrity(&self) -> bool {
        matches!(self, PackError::FileIntegrity { .. } | PackError::BlockIntegrity { .. })
    }
}
