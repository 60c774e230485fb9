//! Cleanup-candidate computation.
//!
//! Finds empty-enough directories and marked-for-delete files, then applies
//! cascade suppression so that a candidate covered by an accepted ancestor
//! is dropped: moving the ancestor already reclaims it.

use std::path::{Path, PathBuf};

use curator_core::{rebase, CleanupReason, DirEntry, Operation, RootConfig, ScanModel};

/// Whether the result feeds the pre- or post-analysis plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupPhase {
    Pre,
    Post,
}

/// What the cleanup analyzer found for one scan.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    /// Directory moves, shallowest first.
    pub directories: Vec<Operation>,
    /// File moves.
    pub files: Vec<Operation>,
    /// Total bytes reclaimable by this report.
    pub bytes: u64,
}

impl CleanupReport {
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }

    /// All operations, directories first.
    pub fn into_operations(self) -> Vec<Operation> {
        let mut ops = self.directories;
        ops.extend(self.files);
        ops
    }
}

enum Candidate<'m> {
    Dir(&'m DirEntry, CleanupReason),
    File(&'m curator_core::FileEntry),
}

impl Candidate<'_> {
    fn depth(&self) -> u32 {
        match self {
            Candidate::Dir(d, _) => d.depth,
            Candidate::File(f) => f.depth,
        }
    }

    fn parent(&self) -> &Path {
        match self {
            Candidate::Dir(d, _) => &d.parent,
            Candidate::File(f) => &f.dir,
        }
    }
}

/// Compute the cleanup set for one scan.
pub fn analyze(model: &ScanModel, config: &RootConfig, phase: CleanupPhase) -> CleanupReport {
    let mut candidates: Vec<Candidate<'_>> = Vec::new();

    for dir in model.directories.iter() {
        // The scan root is never a candidate.
        if dir.path == model.root {
            continue;
        }
        if dir.total_size <= config.empty_threshold {
            candidates.push(Candidate::Dir(dir, classify(dir)));
        }
    }
    for file in model.files.iter() {
        if file.marked_for_delete {
            candidates.push(Candidate::File(file));
        }
    }

    // Shallowest first, so parents are decided before their children.
    candidates.sort_by_key(Candidate::depth);

    let mut report = CleanupReport::default();
    let mut accepted: Vec<PathBuf> = Vec::new();

    for candidate in candidates {
        let covered = accepted
            .iter()
            .any(|root| candidate.parent().starts_with(root));

        match candidate {
            Candidate::Dir(dir, reason) => {
                if !covered {
                    report.bytes += dir.total_size;
                    report.directories.push(cleanup_op(
                        phase,
                        dir.path.clone(),
                        rebase(&config.recycle_bin_path, &dir.path),
                        reason,
                        dir.total_size,
                        dir.depth,
                    ));
                }
                // Recorded either way: children of a cascaded directory are
                // still covered by the subtree that subsumed it.
                accepted.push(dir.path.clone());
            }
            Candidate::File(file) => {
                if !covered {
                    report.bytes += file.stat.size;
                    report.files.push(cleanup_op(
                        phase,
                        file.path.clone(),
                        rebase(&config.recycle_bin_path, &file.path),
                        CleanupReason::MarkedForDeletion,
                        file.stat.size,
                        file.depth,
                    ));
                }
            }
        }
    }

    report
}

fn classify(dir: &DirEntry) -> CleanupReason {
    if dir.is_bare() {
        CleanupReason::Empty
    } else if dir.total_size == 0 {
        CleanupReason::OnlyIgnoredItems
    } else {
        CleanupReason::BelowThreshold
    }
}

fn cleanup_op(
    phase: CleanupPhase,
    path: PathBuf,
    move_to: PathBuf,
    reason: CleanupReason,
    bytes: u64,
    depth: u32,
) -> Operation {
    match phase {
        CleanupPhase::Pre => Operation::PreCleanup {
            path,
            move_to,
            reason,
            bytes,
            depth,
        },
        CleanupPhase::Post => Operation::PostCleanup {
            path,
            move_to,
            reason,
            bytes,
            depth,
        },
    }
}
