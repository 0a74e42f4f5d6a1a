//! Restore files from a decoded block.
//!
//! The reader must sit at the start of the block's data section, which is
//! where [`decode_records`](crate::block::decode_records) leaves it.  Records
//! are consumed strictly in order, so each file's payload begins exactly
//! where the previous one ended and no seeking is needed.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use filetime::FileTime;
use tracing::debug;

use crate::block::{copy_exact, DecodeError, HashingWriter};
use crate::error::{PackError, Result};
use crate::integrity::digests_equal;
use crate::record::FileRecord;

#[derive(Debug, Clone)]
pub struct Extractor {
    chunk_size: usize,
}

impl Extractor {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1) }
    }

    /// Extract every record under `out_root`, stopping at the first failure.
    ///
    /// Files written before a failure are left in place.  `block` only
    /// labels errors.  Returns the number of payload bytes written.
    pub fn extract_all<R: Read>(
        &self,
        reader:   &mut R,
        records:  &[FileRecord],
        out_root: &Path,
        block:    &Path,
    ) -> Result<u64> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut total = 0;
        for rec in records {
            self.extract_file(reader, rec, out_root, block, &mut buf)?;
            total += rec.size;
        }
        Ok(total)
    }

    fn extract_file<R: Read>(
        &self,
        reader:   &mut R,
        rec:      &FileRecord,
        out_root: &Path,
        block:    &Path,
        buf:      &mut [u8],
    ) -> Result<PathBuf> {
        let dest = destination(out_root, &rec.path)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(PackError::io(parent))?;
        }

        let file = open_destination(&dest, rec.mode).map_err(PackError::io(&dest))?;
        let mut w = HashingWriter::new(BufWriter::new(file));
        let copied = copy_exact(reader, &mut w, rec.size, buf).map_err(PackError::io(&dest))?;
        if copied != rec.size {
            return Err(PackError::decode(block, DecodeError::Truncated { field: "file data" }));
        }
        w.flush().map_err(PackError::io(&dest))?;
        let (out, actual) = w.finish();
        drop(out);

        if !digests_equal(&rec.checksum, &actual) {
            return Err(PackError::FileIntegrity {
                path:     rec.path.clone(),
                expected: rec.checksum,
                actual,
            });
        }

        apply_mode(&dest, rec.mode).map_err(PackError::io(&dest))?;
        let mtime = FileTime::from_unix_time(rec.mtime, 0);
        filetime::set_file_times(&dest, mtime, mtime).map_err(PackError::io(&dest))?;

        debug!(path = %rec.path, size = rec.size, "extracted");
        Ok(dest)
    }
}

/// Join a stored path onto `root`.  Absolute paths and parent-directory
/// components are refused.
pub fn destination(root: &Path, stored: &str) -> Result<PathBuf> {
    let rel = Path::new(stored);
    let mut out = root.to_path_buf();
    let mut depth = 0;
    for comp in rel.components() {
        match comp {
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(PackError::UnsafePath { path: stored.to_string() });
            }
        }
    }
    if depth == 0 {
        return Err(PackError::UnsafePath { path: stored.to_string() });
    }
    Ok(out)
}

#[cfg(unix)]
fn open_destination(path: &Path, mode: u32) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new().write(true).create(true).truncate(true).mode(mode).open(path)
}

#[cfg(not(unix))]
fn open_destination(path: &Path, _mode: u32) -> std::io::Result<File> {
    OpenOptions::new().write(true).create(true).truncate(true).open(path)
}

// The create mode is filtered by the umask; set the stored bits outright.
#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn apply_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, perms)
}
