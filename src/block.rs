//! Block codec.
//!
//! # Layout (little-endian, no padding anywhere)
//!
//! ```text
//! block id          i32
//! file count        i32
//! file records      file count × FileRecord      (see record.rs)
//! data section      payload bytes, record order, offset-addressed from 0
//! footer            SHA-256 of every preceding byte (32 B)
//! ```
//!
//! Encoding reads each source file twice: once to digest it for its record,
//! once to copy it into the data section.  Decoding stops at the start of
//! the data section and leaves the stream positioned there for
//! [`Extractor`](crate::extract::Extractor).

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use sha2::{Digest as _, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{PackError, Result};
use crate::integrity::{Digest, Validator, DIGEST_LEN};
use crate::packer::Block;
use crate::record::{FileRecord, RECORD_FIXED_LEN};

/// File extension of persisted blocks.  Directory scans match on it.
pub const BLOCK_EXTENSION: &str = "beam";

/// Block ID + file count.
pub const BLOCK_HEADER_LEN: u64 = 8;

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unexpected end of block while reading {field}")]
    Truncated { field: &'static str },
    #[error("negative file count: {0}")]
    NegativeFileCount(i32),
    #[error("file count {count} cannot fit in the remaining {remaining} bytes")]
    FileCountExceedsStream { count: i32, remaining: u64 },
    #[error("invalid path length: {0}")]
    InvalidPathLength(i32),
    #[error("stored path is not valid UTF-8")]
    NonUtf8Path,
    #[error("negative {field}: {value}")]
    NegativeField { field: &'static str, value: i64 },
    #[error("record {index} has offset {found}, expected {expected}")]
    NonContiguousOffset { index: usize, expected: u64, found: u64 },
    #[error("data section of {declared} bytes exceeds the remaining {remaining} bytes")]
    PayloadExceedsStream { declared: u64, remaining: u64 },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// Premature EOF is a structural failure; anything else stays I/O.
    pub fn from_read(err: io::Error, field: &'static str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::Truncated { field }
        } else {
            DecodeError::Io(err)
        }
    }
}

// ── Naming ───────────────────────────────────────────────────────────────────

pub fn block_file_name(id: i32) -> String {
    format!("block-{id}.{BLOCK_EXTENSION}")
}

/// Block number encoded in a `block-<N>.beam` file name, if any.
pub fn block_number(path: &Path) -> Option<i32> {
    path.file_stem()?
        .to_str()?
        .strip_prefix("block-")?
        .parse()
        .ok()
}

pub fn has_block_extension(path: &Path) -> bool {
    path.extension().map_or(false, |e| e == BLOCK_EXTENSION)
}

// ── HashingWriter ────────────────────────────────────────────────────────────

/// Forwards writes to `inner` and digests exactly the bytes it accepted.
pub struct HashingWriter<W: Write> {
    inner:   W,
    hasher:  Sha256,
    written: u64,
}

impl<W: Write> HashingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, hasher: Sha256::new(), written: 0 }
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(self) -> (W, Digest) {
        (self.inner, self.hasher.finalize().into())
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Copy exactly `len` bytes through `buf`.  Returns the count actually
/// copied, which is short only when `reader` ran dry.
pub fn copy_exact<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    len:    u64,
    buf:    &mut [u8],
) -> io::Result<u64> {
    let mut left = len;
    while left > 0 {
        let want = buf.len().min(usize::try_from(left).unwrap_or(usize::MAX));
        let n = match reader.read(&mut buf[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        left -= n as u64;
    }
    Ok(len - left)
}

// ── Encode ───────────────────────────────────────────────────────────────────

/// Summary of one encoded block.
#[derive(Debug, Clone)]
pub struct EncodedBlock {
    pub id:      i32,
    pub records: Vec<FileRecord>,
    pub footer:  Digest,
    /// Total bytes written, footer included.
    pub len:     u64,
}

#[derive(Debug, Clone)]
pub struct BlockWriter {
    validator: Validator,
}

impl BlockWriter {
    pub fn new(chunk_size: usize) -> Self {
        Self { validator: Validator::new(chunk_size) }
    }

    /// Digest every file of `block` and build its records.
    fn records(&self, block: &Block) -> Result<Vec<FileRecord>> {
        let mut records = Vec::with_capacity(block.files.len());
        for packed in &block.files {
            let file = &packed.file;
            let f = File::open(&file.source).map_err(PackError::io(&file.source))?;
            let checksum = self
                .validator
                .digest_reader(f.take(file.size))
                .map_err(PackError::io(&file.source))?;
            records.push(FileRecord {
                path:     file.path.clone(),
                size:     file.size,
                mtime:    file.mtime,
                offset:   packed.offset,
                block_id: block.id,
                mode:     file.mode,
                checksum,
            });
        }
        Ok(records)
    }

    /// Encode `block` into `writer` in the canonical layout.
    pub fn encode<W: Write>(&self, block: &Block, writer: W) -> Result<EncodedBlock> {
        self.encode_to(block, writer, Path::new(&block_file_name(block.id)))
    }

    /// Encode `block` to `<dir>/block-<id>.beam`.
    pub fn write_to_dir(&self, block: &Block, dir: &Path) -> Result<(PathBuf, EncodedBlock)> {
        let path = dir.join(block_file_name(block.id));
        let f = File::create(&path).map_err(PackError::io(&path))?;
        let encoded = self.encode_to(block, BufWriter::new(f), &path)?;
        info!(block = %path.display(), block_id = block.id, files = encoded.records.len(), bytes = encoded.len, "block written");
        Ok((path, encoded))
    }

    fn encode_to<W: Write>(&self, block: &Block, writer: W, dest: &Path) -> Result<EncodedBlock> {
        let records = self.records(block)?;
        let count = i32::try_from(records.len())
            .map_err(|_| PackError::InvalidConfig(format!("block {} holds too many files", block.id)))?;

        let mut w = HashingWriter::new(writer);
        w.write_i32::<LittleEndian>(block.id).map_err(PackError::io(dest))?;
        w.write_i32::<LittleEndian>(count).map_err(PackError::io(dest))?;
        for rec in &records {
            rec.write(&mut w).map_err(PackError::io(dest))?;
        }

        let mut buf = vec![0u8; self.validator.chunk_size()];
        for packed in &block.files {
            let src = &packed.file.source;
            let mut f = File::open(src).map_err(PackError::io(src))?;
            let copied = copy_exact(&mut f, &mut w, packed.file.size, &mut buf).map_err(PackError::io(src))?;
            if copied != packed.file.size {
                return Err(PackError::Io {
                    path:   src.clone(),
                    source: io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("expected {} bytes, file shrank to {copied}", packed.file.size),
                    ),
                });
            }
        }

        let len = w.written() + DIGEST_LEN as u64;
        let (mut inner, footer) = w.finish();
        inner.write_all(&footer).map_err(PackError::io(dest))?;
        inner.flush().map_err(PackError::io(dest))?;

        Ok(EncodedBlock { id: block.id, records, footer, len })
    }
}

// ── Decode ───────────────────────────────────────────────────────────────────

/// Records decoded from a block header section.
#[derive(Debug, Clone)]
pub struct DecodedBlock {
    pub id:         i32,
    pub records:    Vec<FileRecord>,
    /// Absolute stream position of the data section.
    pub data_start: u64,
}

/// Read the block ID, file count and every record.  On success `reader`
/// sits at the first byte of the data section.
pub fn decode_records<R: Read + Seek>(reader: &mut R) -> std::result::Result<DecodedBlock, DecodeError> {
    let start = reader.stream_position()?;
    let end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(start))?;
    let remaining = |pos: u64| end.saturating_sub(pos);

    let id = reader
        .read_i32::<LittleEndian>()
        .map_err(|e| DecodeError::from_read(e, "block id"))?;
    let count = reader
        .read_i32::<LittleEndian>()
        .map_err(|e| DecodeError::from_read(e, "file count"))?;
    let mut pos = start + BLOCK_HEADER_LEN;

    if count < 0 {
        return Err(DecodeError::NegativeFileCount(count));
    }
    if count as u64 * RECORD_FIXED_LEN > remaining(pos) {
        return Err(DecodeError::FileCountExceedsStream { count, remaining: remaining(pos) });
    }

    let mut records = Vec::with_capacity(count as usize);
    let mut data_len = 0u64;
    for index in 0..count as usize {
        let rec = FileRecord::read(&mut *reader, id, remaining(pos))?;
        if rec.offset != data_len {
            return Err(DecodeError::NonContiguousOffset { index, expected: data_len, found: rec.offset });
        }
        data_len = data_len.checked_add(rec.size).ok_or(DecodeError::PayloadExceedsStream {
            declared:  u64::MAX,
            remaining: remaining(pos),
        })?;
        pos += rec.encoded_len();
        debug!(block_id = id, path = %rec.path, size = rec.size, offset = rec.offset, "decoded record");
        records.push(rec);
    }

    let needed = data_len.saturating_add(DIGEST_LEN as u64);
    if needed > remaining(pos) {
        return Err(DecodeError::PayloadExceedsStream { declared: data_len, remaining: remaining(pos) });
    }

    Ok(DecodedBlock { id, records, data_start: pos })
}
