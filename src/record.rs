//! Persisted per-file metadata record.
//!
//! # On-disk layout (little-endian)
//!
//! | Field       | Width      |
//! |-------------|------------|
//! | path length | i32        |
//! | path        | path length raw bytes, no terminator |
//! | size        | i64        |
//! | mtime       | i64 (Unix seconds) |
//! | offset      | i64 (relative to the data section) |
//! | mode        | u32        |
//! | checksum    | 32 bytes (SHA-256) |

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::block::DecodeError;
use crate::integrity::{Digest, DIGEST_LEN};

/// Encoded size of a record whose path is empty.
pub const RECORD_FIXED_LEN: u64 = 4 + 8 + 8 + 8 + 4 + DIGEST_LEN as u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Stored verbatim; joined onto the output root at extraction.
    pub path:     String,
    pub size:     u64,
    /// Modification time, whole seconds since the Unix epoch.
    pub mtime:    i64,
    pub offset:   u64,
    /// Not part of the encoded record; supplied by the enclosing block.
    pub block_id: i32,
    pub mode:     u32,
    pub checksum: Digest,
}

impl FileRecord {
    pub fn encoded_len(&self) -> u64 {
        RECORD_FIXED_LEN + self.path.len() as u64
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let path = self.path.as_bytes();
        let path_len = i32::try_from(path.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("path too long: {}", self.path))
        })?;
        writer.write_i32::<LittleEndian>(path_len)?;
        writer.write_all(path)?;
        writer.write_i64::<LittleEndian>(to_i64(self.size, "size")?)?;
        writer.write_i64::<LittleEndian>(self.mtime)?;
        writer.write_i64::<LittleEndian>(to_i64(self.offset, "offset")?)?;
        writer.write_u32::<LittleEndian>(self.mode)?;
        writer.write_all(&self.checksum)?;
        Ok(())
    }

    /// Read one record.  `remaining` bounds the path length so a corrupt
    /// length field cannot trigger a huge allocation.
    pub fn read<R: Read>(mut reader: R, block_id: i32, remaining: u64) -> Result<Self, DecodeError> {
        let path_len = reader
            .read_i32::<LittleEndian>()
            .map_err(|e| DecodeError::from_read(e, "path length"))?;
        if path_len < 0 || path_len as u64 > remaining.saturating_sub(RECORD_FIXED_LEN) {
            return Err(DecodeError::InvalidPathLength(path_len));
        }

        let mut path = vec![0u8; path_len as usize];
        reader.read_exact(&mut path).map_err(|e| DecodeError::from_read(e, "path"))?;
        let path = String::from_utf8(path).map_err(|_| DecodeError::NonUtf8Path)?;

        let size = read_u64_field(&mut reader, "size")?;
        let mtime = reader
            .read_i64::<LittleEndian>()
            .map_err(|e| DecodeError::from_read(e, "mtime"))?;
        let offset = read_u64_field(&mut reader, "offset")?;
        let mode = reader
            .read_u32::<LittleEndian>()
            .map_err(|e| DecodeError::from_read(e, "mode"))?;

        let mut checksum = [0u8; DIGEST_LEN];
        reader
            .read_exact(&mut checksum)
            .map_err(|e| DecodeError::from_read(e, "checksum"))?;

        Ok(Self { path, size, mtime, offset, block_id, mode, checksum })
    }
}

fn to_i64(v: u64, field: &str) -> io::Result<i64> {
    i64::try_from(v).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("{field} {v} does not fit in i64"))
    })
}

fn read_u64_field<R: Read>(reader: &mut R, field: &'static str) -> Result<u64, DecodeError> {
    let v = reader
        .read_i64::<LittleEndian>()
        .map_err(|e| DecodeError::from_read(e, field))?;
    u64::try_from(v).map_err(|_| DecodeError::NegativeField { field, value: v })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample() -> FileRecord {
        FileRecord {
            path:     "docs/readme.txt".into(),
            size:     13,
            mtime:    1_700_000_000,
            offset:   42,
            block_id: 3,
            mode:     0o644,
            checksum: [0xAB; 32],
        }
    }

    #[test]
    fn layout_is_byte_exact() {
        let rec = sample();
        let mut buf = Vec::new();
        rec.write(&mut buf).unwrap();

        assert_eq!(buf.len() as u64, rec.encoded_len());
        assert_eq!(&buf[0..4], &15i32.to_le_bytes());
        assert_eq!(&buf[4..19], b"docs/readme.txt");
        assert_eq!(&buf[19..27], &13i64.to_le_bytes());
        assert_eq!(&buf[27..35], &1_700_000_000i64.to_le_bytes());
        assert_eq!(&buf[35..43], &42i64.to_le_bytes());
        assert_eq!(&buf[43..47], &0o644u32.to_le_bytes());
        assert_eq!(&buf[47..79], &[0xAB; 32]);

        let back = FileRecord::read(Cursor::new(&buf), 3, buf.len() as u64).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn truncated_checksum_is_reported() {
        let mut buf = Vec::new();
        sample().write(&mut buf).unwrap();
        buf.truncate(buf.len() - 5);
        let err = FileRecord::read(Cursor::new(&buf), 3, u64::MAX).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { field: "checksum" }));
    }

    #[test]
    fn negative_path_length_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(-1i32).to_le_bytes());
        buf.extend_from_slice(&[0u8; 80]);
        let err = FileRecord::read(Cursor::new(&buf), 1, buf.len() as u64).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidPathLength(-1)));
    }

    #[test]
    fn oversized_path_length_is_rejected_before_allocating() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&i32::MAX.to_le_bytes());
        let err = FileRecord::read(Cursor::new(&buf), 1, 100).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidPathLength(_)));
    }

    #[test]
    fn negative_size_is_rejected() {
        let mut rec = Vec::new();
        rec.extend_from_slice(&1i32.to_le_bytes());
        rec.push(b'a');
        rec.extend_from_slice(&(-5i64).to_le_bytes());
        rec.extend_from_slice(&[0u8; 8 + 8 + 4 + 32]);
        let err = FileRecord::read(Cursor::new(&rec), 1, rec.len() as u64).unwrap_err();
        assert!(matches!(err, DecodeError::NegativeField { field: "size", value: -5 }));
    }
}
