//! File and directory entry types.

use std::path::{Path, PathBuf};

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Snapshot of the POSIX stat information curator cares about.
///
/// Timestamps are kept as milliseconds since the epoch so that duplicate
/// tie-breaking can compare them without precision loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatSnapshot {
    /// Size in bytes.
    pub size: u64,
    /// Full mode bits as reported by stat.
    pub mode: u32,
    /// Owning user id.
    pub uid: u32,
    /// Owning group id.
    pub gid: u32,
    /// Hard link count.
    pub nlink: u64,
    /// Last modification time (ms since epoch).
    pub mtime_ms: i64,
    /// Inode change time (ms since epoch).
    pub ctime_ms: i64,
    /// Creation time (ms since epoch), where the filesystem provides one.
    pub birthtime_ms: Option<i64>,
}

impl StatSnapshot {
    /// The permission bits (`mode & 0o777`).
    pub fn perm_bits(&self) -> u32 {
        self.mode & 0o777
    }

    /// The oldest known timestamp, used for "original" selection.
    pub fn oldest_ms(&self) -> i64 {
        match self.birthtime_ms {
            Some(birth) => self.ctime_ms.min(birth),
            None => self.ctime_ms,
        }
    }
}

/// A regular file recorded by the scanner.
///
/// Entries are immutable once the scan completes; analyzers only read them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    /// Absolute path.
    pub path: PathBuf,
    /// Absolute path of the containing directory.
    pub dir: PathBuf,
    /// Full file name.
    pub name: CompactString,
    /// Base name without the extension.
    pub stem: CompactString,
    /// Extension, lower-cased, without the leading dot. Empty when absent.
    pub ext: CompactString,
    /// Depth below the scan root (a file directly in the root has depth 1).
    pub depth: u32,
    /// Stat snapshot taken at scan time.
    pub stat: StatSnapshot,
    /// Matched an ignore pattern; contributes nothing to aggregates.
    pub ignored: bool,
    /// Matched a remove pattern; forced cleanup candidate.
    pub marked_for_delete: bool,
}

impl FileEntry {
    /// Build an entry from a path plus its stat snapshot.
    pub fn new(path: PathBuf, depth: u32, stat: StatSnapshot) -> Self {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.clone());
        let name: CompactString = path
            .file_name()
            .map(|n| CompactString::from(n.to_string_lossy().as_ref()))
            .unwrap_or_default();
        let stem: CompactString = path
            .file_stem()
            .map(|s| CompactString::from(s.to_string_lossy().as_ref()))
            .unwrap_or_else(|| name.clone());
        let ext: CompactString = path
            .extension()
            .map(|e| CompactString::from(e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        Self {
            path,
            dir,
            name,
            stem,
            ext,
            depth,
            stat,
            ignored: false,
            marked_for_delete: false,
        }
    }
}

/// A directory recorded by the scanner, with aggregates filled in by the
/// post-pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirEntry {
    /// Absolute path.
    pub path: PathBuf,
    /// Absolute path of the containing directory.
    pub parent: PathBuf,
    /// Depth below the scan root (the root itself has depth 0).
    pub depth: u32,
    /// Stat snapshot taken at scan time.
    pub stat: StatSnapshot,
    /// Sum of sizes of non-ignored files directly in this directory.
    pub intrinsic_size: u64,
    /// `intrinsic_size` plus the `total_size` of every subdirectory.
    pub total_size: u64,
    /// Count of files directly in this directory, ignored included.
    pub file_count: u64,
    /// Count of immediate subdirectories.
    pub dir_count: u64,
}

impl DirEntry {
    /// Build a directory entry with zeroed aggregates.
    pub fn new(path: PathBuf, depth: u32, stat: StatSnapshot) -> Self {
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.clone());
        Self {
            path,
            parent,
            depth,
            stat,
            intrinsic_size: 0,
            total_size: 0,
            file_count: 0,
            dir_count: 0,
        }
    }

    /// True when the directory holds nothing at all.
    pub fn is_bare(&self) -> bool {
        self.file_count == 0 && self.dir_count == 0
    }
}
