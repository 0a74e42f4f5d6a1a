//! Source-tree discovery.

use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{PackError, Result};
use crate::packer::FileDescriptor;

/// A file left out of packing because it cannot fit in any block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Collected {
    pub files:   Vec<FileDescriptor>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone)]
pub struct FileCollector {
    capacity: u64,
}

impl FileCollector {
    pub fn new(capacity: u64) -> Self {
        Self { capacity }
    }

    /// Walk `root` recursively in file-name order and describe every regular
    /// file.  Symlinks to regular files are packed with their target's bytes
    /// and metadata; linked directories are not descended into.  Files larger
    /// than the capacity are reported and skipped.
    pub fn collect(&self, root: &Path) -> Result<Collected> {
        let mut out = Collected::default();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            let file_type = entry.file_type();
            let md = if file_type.is_file() {
                entry.metadata().map_err(|e| walk_error(root, e))?
            } else if file_type.is_symlink() {
                let md = fs::metadata(entry.path()).map_err(PackError::io(entry.path()))?;
                if !md.is_file() {
                    debug!(path = %entry.path().display(), "not following symlink to non-file");
                    continue;
                }
                md
            } else {
                continue;
            };
            let size = md.len();
            if size > self.capacity {
                warn!(path = %entry.path().display(), size, capacity = self.capacity, "skipping file, size exceeds block capacity");
                out.skipped.push(SkippedFile { path: entry.path().to_path_buf(), size });
                continue;
            }
            out.files.push(FileDescriptor {
                source: entry.path().to_path_buf(),
                path:   stored_path(root, entry.path())?,
                size,
                mtime:  unix_mtime(&md).map_err(PackError::io(entry.path()))?,
                mode:   permission_bits(&md),
            });
        }
        Ok(out)
    }
}

/// `/`-joined path of `path` relative to `root`.  When `root` is itself the
/// file, its name is used.
fn stored_path(root: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel = if rel.as_os_str().is_empty() {
        Path::new(path.file_name().unwrap_or(path.as_os_str()))
    } else {
        rel
    };
    let mut parts = Vec::new();
    for comp in rel.components() {
        let part = comp
            .as_os_str()
            .to_str()
            .ok_or_else(|| PackError::NonUtf8Path { path: path.to_path_buf() })?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

fn unix_mtime(md: &Metadata) -> io::Result<i64> {
    let modified: DateTime<Utc> = md.modified()?.into();
    Ok(modified.timestamp())
}

#[cfg(unix)]
fn permission_bits(md: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    md.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(md: &Metadata) -> u32 {
    if md.permissions().readonly() { 0o444 } else { 0o644 }
}

fn walk_error(root: &Path, err: walkdir::Error) -> PackError {
    let path = err.path().unwrap_or(root).to_path_buf();
    let msg = err.to_string();
    let source = err
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, msg));
    PackError::Io { path, source }
}
