//! Scan progress reporting.

use std::path::PathBuf;
use std::time::Duration;

/// Progress information broadcast periodically during a scan.
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// Files recorded so far.
    pub files_scanned: u64,
    /// Directories recorded so far.
    pub dirs_scanned: u64,
    /// Bytes across non-ignored files so far.
    pub bytes_scanned: u64,
    /// Directory currently being read.
    pub current_path: PathBuf,
    /// Warnings so far.
    pub warnings: u64,
    /// Time since the scan started.
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Total entries recorded so far.
    pub fn total_items(&self) -> u64 {
        self.files_scanned + self.dirs_scanned
    }
}
