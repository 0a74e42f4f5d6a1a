//! High-level [`BeamPacker`] API, the primary embedding surface.
//!
//! ```no_run
//! use beampack::archive::BeamPacker;
//! use beampack::config::PackOptions;
//!
//! let packer = BeamPacker::new(PackOptions::with_capacity(60 * 1024 * 1024))?;
//! packer.pack("photos", "blocks")?;
//! packer.verify("blocks")?;
//! packer.unpack("blocks", "restored")?;
//! # Ok::<(), beampack::error::PackError>(())
//! ```

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::block::{block_number, decode_records, has_block_extension, BlockWriter, DecodedBlock};
use crate::collect::FileCollector;
use crate::config::PackOptions;
use crate::error::{PackError, Result};
use crate::extract::Extractor;
use crate::integrity::Validator;
use crate::packer;

// ── Reports ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackReport {
    /// Block files written, in ID order.
    pub blocks:  Vec<PathBuf>,
    pub files:   usize,
    /// Payload bytes packed.
    pub bytes:   u64,
    /// Files left out because they exceed the capacity.
    pub skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackReport {
    pub blocks: usize,
    pub files:  usize,
    pub bytes:  u64,
}

impl UnpackReport {
    fn absorb(&mut self, other: UnpackReport) {
        self.blocks += other.blocks;
        self.files += other.files;
        self.bytes += other.bytes;
    }
}

// ── BeamPacker ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BeamPacker {
    opts:      PackOptions,
    validator: Validator,
    writer:    BlockWriter,
    extractor: Extractor,
}

impl BeamPacker {
    pub fn new(opts: PackOptions) -> Result<Self> {
        opts.validate()?;
        Ok(Self {
            validator: Validator::new(opts.chunk_size),
            writer:    BlockWriter::new(opts.chunk_size),
            extractor: Extractor::new(opts.chunk_size),
            opts,
        })
    }

    // ── Pack ──────────────────────────────────────────────────────────────────

    /// Pack every eligible file under `source` into `block-<N>.beam` files
    /// in `dest`, creating `dest` if needed.
    pub fn pack<P: AsRef<Path>, Q: AsRef<Path>>(&self, source: P, dest: Q) -> Result<PackReport> {
        let (source, dest) = (source.as_ref(), dest.as_ref());

        let collected = FileCollector::new(self.opts.capacity).collect(source)?;
        if collected.files.is_empty() {
            return Err(PackError::NoFiles { dir: source.to_path_buf() });
        }
        fs::create_dir_all(dest).map_err(PackError::io(dest))?;

        let files = collected.files.len();
        let blocks = packer::pack(collected.files, self.opts.capacity)?;

        let mut report = PackReport { files, skipped: collected.skipped.len(), ..Default::default() };
        for block in &blocks {
            let (path, _) = self.writer.write_to_dir(block, dest)?;
            report.bytes += block.size;
            report.blocks.push(path);
        }
        info!(
            source = %source.display(),
            blocks = report.blocks.len(),
            files = report.files,
            bytes = report.bytes,
            skipped = report.skipped,
            "pack complete"
        );
        Ok(report)
    }

    // ── Unpack ────────────────────────────────────────────────────────────────

    /// Extract one block, or every block in a directory, into `dest`.
    pub fn unpack<P: AsRef<Path>, Q: AsRef<Path>>(&self, source: P, dest: Q) -> Result<UnpackReport> {
        let dest = dest.as_ref();
        fs::create_dir_all(dest).map_err(PackError::io(dest))?;

        let mut report = UnpackReport::default();
        for block in resolve_blocks(source.as_ref())? {
            report.absorb(self.unpack_block(&block, dest)?);
        }
        Ok(report)
    }

    /// Extract a single block file into `dest`.
    ///
    /// With `verify_integrity` set, the footer is checked first and nothing
    /// is extracted from a block that fails.
    pub fn unpack_block<P: AsRef<Path>, Q: AsRef<Path>>(&self, block: P, dest: Q) -> Result<UnpackReport> {
        let (block, dest) = (block.as_ref(), dest.as_ref());
        if self.opts.verify_integrity {
            self.validator.validate_block(block)?;
        }

        let f = File::open(block).map_err(PackError::io(block))?;
        let mut reader = BufReader::with_capacity(self.opts.chunk_size, f);
        let decoded = decode_records(&mut reader).map_err(|e| PackError::decode(block, e))?;
        let bytes = self.extractor.extract_all(&mut reader, &decoded.records, dest, block)?;

        info!(block = %block.display(), block_id = decoded.id, files = decoded.records.len(), bytes, "block unpacked");
        Ok(UnpackReport { blocks: 1, files: decoded.records.len(), bytes })
    }

    // ── Verify ────────────────────────────────────────────────────────────────

    /// Check the footer of one block, or of every block in a directory.
    /// Returns the IDs of the blocks checked.
    pub fn verify<P: AsRef<Path>>(&self, source: P) -> Result<Vec<i32>> {
        resolve_blocks(source.as_ref())?
            .iter()
            .map(|b| self.validator.validate_block(b))
            .collect()
    }

    // ── Inspect ───────────────────────────────────────────────────────────────

    /// Decode a block's records without extracting anything.
    pub fn inspect<P: AsRef<Path>>(&self, block: P) -> Result<DecodedBlock> {
        let block = block.as_ref();
        let f = File::open(block).map_err(PackError::io(block))?;
        decode_records(&mut BufReader::new(f)).map_err(|e| PackError::decode(block, e))
    }
}

/// A block file as-is, or the `.beam` files directly inside a directory,
/// ordered by block number.
pub fn resolve_blocks(source: &Path) -> Result<Vec<PathBuf>> {
    let md = fs::metadata(source).map_err(PackError::io(source))?;
    if !md.is_dir() {
        return Ok(vec![source.to_path_buf()]);
    }

    let mut blocks = Vec::new();
    for entry in fs::read_dir(source).map_err(PackError::io(source))? {
        let entry = entry.map_err(PackError::io(source))?;
        let path = entry.path();
        let is_file = entry.file_type().map_err(PackError::io(&path))?.is_file();
        if is_file && has_block_extension(&path) {
            blocks.push(path);
        }
    }
    blocks.sort_by(|a, b| {
        let key = |p: &PathBuf| (block_number(p).unwrap_or(i32::MAX), p.file_name().map(|n| n.to_os_string()));
        key(a).cmp(&key(b))
    });
    if blocks.is_empty() {
        warn!(dir = %source.display(), "no block files found");
    }
    Ok(blocks)
}
