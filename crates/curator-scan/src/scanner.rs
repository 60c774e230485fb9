//! Breadth-first directory scanner.

use std::collections::VecDeque;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use tokio::sync::broadcast;
use tracing::{debug, warn};

use curator_core::{
    DirEntry, FileEntry, PathMatcher, RootConfig, ScanError, ScanModel, ScanWarning,
    StatSnapshot, WarningKind,
};

use crate::progress::ScanProgress;

/// How many entries between progress broadcasts.
const PROGRESS_EVERY: u64 = 1024;

/// One-pass scanner producing a [`ScanModel`].
///
/// Traversal is breadth-first over an explicit work queue, so an entry's
/// depth is always known and all ancestors of a recorded entry are already
/// in the model. Symbolic links are never followed and traversal never
/// leaves the root's filesystem device. Per-entry stat failures become
/// warnings; only an unreadable root fails the scan.
pub struct Scanner {
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl Scanner {
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(64);
        Self { progress_tx }
    }

    /// Subscribe to periodic progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan the configured root.
    pub fn scan(&self, config: &RootConfig) -> Result<ScanModel, ScanError> {
        let started = Instant::now();

        let root = config
            .scan_path
            .canonicalize()
            .map_err(|source| ScanError::Root {
                path: config.scan_path.clone(),
                source,
            })?;
        let root_meta = std::fs::symlink_metadata(&root).map_err(|source| ScanError::Root {
            path: root.clone(),
            source,
        })?;
        if !root_meta.is_dir() {
            return Err(ScanError::NotADirectory { path: root });
        }
        let root_dev = device_of(&root_meta);

        // The recycle directory may not exist yet; compare canonicalized
        // when it does so the prefix check lines up with scanned paths.
        let recycle = config
            .recycle_bin_path
            .canonicalize()
            .unwrap_or_else(|_| config.recycle_bin_path.clone());

        // Matchers were validated with the config; compile failures here
        // would already have failed validation.
        let ignore_dirs = config.ignore_dir_matcher().unwrap_or_else(|_| PathMatcher::empty());
        let ignore_files = config.ignore_file_matcher().unwrap_or_else(|_| PathMatcher::empty());
        let remove_files = config.remove_file_matcher().unwrap_or_else(|_| PathMatcher::empty());

        let mut model = ScanModel::new(root.clone());
        model.directories.insert(
            root.clone(),
            DirEntry::new(root.clone(), 0, snapshot(&root_meta)),
        );

        let mut queue: VecDeque<(PathBuf, u32)> = VecDeque::new();
        queue.push_back((root.clone(), 0));
        let mut seen: u64 = 0;

        while let Some((dir, depth)) = queue.pop_front() {
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(path = %dir.display(), error = %err, "cannot read directory");
                    model
                        .warnings
                        .push(ScanWarning::new(&dir, WarningKind::ReadDir, &err));
                    continue;
                }
            };

            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        model
                            .warnings
                            .push(ScanWarning::new(&dir, WarningKind::ReadDir, &err));
                        continue;
                    }
                };
                let path = entry.path();
                let name = entry.file_name().to_string_lossy().into_owned();

                let meta = match std::fs::symlink_metadata(&path) {
                    Ok(meta) => meta,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "cannot stat entry");
                        model
                            .warnings
                            .push(ScanWarning::new(&path, WarningKind::Stat, &err));
                        continue;
                    }
                };

                // Never follow links; never leave the root's device.
                if meta.file_type().is_symlink() || device_of(&meta) != root_dev {
                    continue;
                }

                if meta.is_dir() {
                    if ignore_dirs.matches(&name) || under_recycle(&path, &recycle) {
                        debug!(path = %path.display(), "skipping directory");
                        continue;
                    }
                    model.counters.dirs_scanned += 1;
                    model
                        .directories
                        .insert(path.clone(), DirEntry::new(path.clone(), depth + 1, snapshot(&meta)));
                    queue.push_back((path, depth + 1));
                } else if meta.is_file() {
                    let marked_for_delete = remove_files.matches(&name);
                    // A remove match is the stronger claim.
                    let ignored = !marked_for_delete && ignore_files.matches(&name);

                    let mut file = FileEntry::new(path.clone(), depth + 1, snapshot(&meta));
                    file.ignored = ignored;
                    file.marked_for_delete = marked_for_delete;

                    model.counters.files_scanned += 1;
                    if ignored {
                        model.counters.files_ignored += 1;
                    } else {
                        model.counters.total_bytes += meta.len();
                    }
                    model.files.insert(path, file);
                }

                seen += 1;
                if seen % PROGRESS_EVERY == 0 {
                    let _ = self.progress_tx.send(ScanProgress {
                        files_scanned: model.counters.files_scanned,
                        dirs_scanned: model.counters.dirs_scanned,
                        bytes_scanned: model.counters.total_bytes,
                        current_path: dir.clone(),
                        warnings: model.warnings.len() as u64,
                        elapsed: started.elapsed(),
                    });
                }
            }
        }

        finalize_aggregates(&mut model);

        debug!(
            files = model.counters.files_scanned,
            dirs = model.counters.dirs_scanned,
            bytes = model.counters.total_bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan complete"
        );

        Ok(model)
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Fill in `file_count`, `intrinsic_size`, `dir_count` and `total_size`.
///
/// Counts come straight from the recorded entries; `total_size` is then
/// propagated bottom-up (deepest directories first) so each parent sees its
/// children's finished totals.
fn finalize_aggregates(model: &mut ScanModel) {
    let mut file_counts: Vec<(PathBuf, u64, u64)> = Vec::new();
    {
        use std::collections::HashMap;
        let mut per_dir: HashMap<&Path, (u64, u64)> = HashMap::new();
        for file in model.files.iter() {
            let slot = per_dir.entry(file.dir.as_path()).or_default();
            slot.0 += 1;
            if !file.ignored {
                slot.1 += file.stat.size;
            }
        }
        for (dir, (count, bytes)) in per_dir {
            file_counts.push((dir.to_path_buf(), count, bytes));
        }
    }
    for (dir, count, bytes) in file_counts {
        if let Some(entry) = model.directories.get_mut(&dir) {
            entry.file_count = count;
            entry.intrinsic_size = bytes;
        }
    }

    let mut dirs_by_depth: Vec<(PathBuf, PathBuf, u32)> = model
        .directories
        .iter()
        .filter(|d| d.path != model.root)
        .map(|d| (d.path.clone(), d.parent.clone(), d.depth))
        .collect();

    for (_, parent, _) in &dirs_by_depth {
        if let Some(entry) = model.directories.get_mut(parent) {
            entry.dir_count += 1;
        }
    }

    for dir in model.directories.iter_mut() {
        dir.total_size = dir.intrinsic_size;
    }

    // Deepest first, so a child's total is final before its parent adds it.
    dirs_by_depth.sort_by(|a, b| b.2.cmp(&a.2));
    for (path, parent, _) in dirs_by_depth {
        let child_total = match model.directories.get(&path) {
            Some(entry) => entry.total_size,
            None => continue,
        };
        if let Some(entry) = model.directories.get_mut(&parent) {
            entry.total_size += child_total;
        }
    }
}

fn under_recycle(path: &Path, recycle: &Path) -> bool {
    path == recycle || path.starts_with(recycle)
}

fn snapshot(meta: &Metadata) -> StatSnapshot {
    StatSnapshot {
        size: meta.len(),
        mode: mode_of(meta),
        uid: uid_of(meta),
        gid: gid_of(meta),
        nlink: nlink_of(meta),
        mtime_ms: mtime_ms(meta),
        ctime_ms: ctime_ms(meta),
        birthtime_ms: birthtime_ms(meta),
    }
}

// Platform metadata helpers; curator targets POSIX filesystems, the
// non-unix fallbacks exist so the crate still builds elsewhere.

#[cfg(unix)]
fn device_of(meta: &Metadata) -> u64 {
    meta.dev()
}

#[cfg(not(unix))]
fn device_of(_meta: &Metadata) -> u64 {
    0
}

#[cfg(unix)]
fn mode_of(meta: &Metadata) -> u32 {
    meta.mode()
}

#[cfg(not(unix))]
fn mode_of(_meta: &Metadata) -> u32 {
    0
}

#[cfg(unix)]
fn uid_of(meta: &Metadata) -> u32 {
    meta.uid()
}

#[cfg(not(unix))]
fn uid_of(_meta: &Metadata) -> u32 {
    0
}

#[cfg(unix)]
fn gid_of(meta: &Metadata) -> u32 {
    meta.gid()
}

#[cfg(not(unix))]
fn gid_of(_meta: &Metadata) -> u32 {
    0
}

#[cfg(unix)]
fn nlink_of(meta: &Metadata) -> u64 {
    meta.nlink()
}

#[cfg(not(unix))]
fn nlink_of(_meta: &Metadata) -> u64 {
    1
}

#[cfg(unix)]
fn mtime_ms(meta: &Metadata) -> i64 {
    meta.mtime() * 1000 + meta.mtime_nsec() / 1_000_000
}

#[cfg(not(unix))]
fn mtime_ms(meta: &Metadata) -> i64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(unix)]
fn ctime_ms(meta: &Metadata) -> i64 {
    meta.ctime() * 1000 + meta.ctime_nsec() / 1_000_000
}

#[cfg(not(unix))]
fn ctime_ms(meta: &Metadata) -> i64 {
    mtime_ms(meta)
}

fn birthtime_ms(meta: &Metadata) -> Option<i64> {
    meta.created()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
}
