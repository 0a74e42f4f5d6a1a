//! Two-level SHA-256 integrity model.
//!
//! Every packed file carries its own digest inside the block metadata, and
//! every block ends in a 32-byte footer holding the digest of all bytes that
//! precede it.  The footer is the sole authority for block-level tamper
//! detection; checking it always costs one full read of the block.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use sha2::{Digest as _, Sha256};
use tracing::{debug, info};

use crate::block::DecodeError;
use crate::error::{PackError, Result};

/// Byte length of a SHA-256 digest.
pub const DIGEST_LEN: usize = 32;

pub type Digest = [u8; DIGEST_LEN];

/// Smallest possible block: ID + file count + footer.
const MIN_BLOCK_LEN: u64 = 4 + 4 + DIGEST_LEN as u64;

#[derive(Debug, Clone)]
pub struct Validator {
    chunk_size: usize,
}

impl Validator {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1) }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Digest everything `reader` yields, reading `chunk_size` bytes at a time.
    pub fn digest_reader<R: Read>(&self, mut reader: R) -> io::Result<Digest> {
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buf[..n]);
        }
        Ok(hasher.finalize().into())
    }

    pub fn digest_file(&self, path: &Path) -> Result<Digest> {
        let f = File::open(path).map_err(PackError::io(path))?;
        self.digest_reader(f).map_err(PackError::io(path))
    }

    /// Recompute a file's digest and compare it to `expected`.
    pub fn verify_file(&self, path: &Path, expected: &Digest) -> Result<()> {
        let actual = self.digest_file(path)?;
        if !digests_equal(expected, &actual) {
            return Err(PackError::FileIntegrity {
                path:     path.display().to_string(),
                expected: *expected,
                actual,
            });
        }
        Ok(())
    }

    /// Check a persisted block's footer against the bytes before it.
    ///
    /// Returns the block ID on success.
    pub fn validate_block(&self, path: &Path) -> Result<i32> {
        let mut f = File::open(path).map_err(PackError::io(path))?;
        let len = f.metadata().map_err(PackError::io(path))?.len();
        if len < MIN_BLOCK_LEN {
            return Err(PackError::decode(path, DecodeError::Truncated { field: "block footer" }));
        }

        let block_id = f
            .read_i32::<LittleEndian>()
            .map_err(|e| PackError::decode(path, DecodeError::from_read(e, "block id")))?;

        let mut stored = [0u8; DIGEST_LEN];
        f.seek(SeekFrom::End(-(DIGEST_LEN as i64))).map_err(PackError::io(path))?;
        f.read_exact(&mut stored)
            .map_err(|e| PackError::decode(path, DecodeError::from_read(e, "block footer")))?;

        f.seek(SeekFrom::Start(0)).map_err(PackError::io(path))?;
        let body = len - DIGEST_LEN as u64;
        let actual = self.digest_reader((&mut f).take(body)).map_err(PackError::io(path))?;

        if !digests_equal(&stored, &actual) {
            return Err(PackError::BlockIntegrity { block_id, expected: stored, actual });
        }
        debug!(block_id, bytes = len, "block footer matches");
        info!(block = %path.display(), block_id, "block verified");
        Ok(block_id)
    }
}

/// Byte-for-byte digest comparison.  Lengths must match.
pub fn digests_equal(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}
