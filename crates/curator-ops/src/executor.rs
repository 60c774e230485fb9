//! Applies an arbitrated plan to the filesystem.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use curator_core::{Operation, OperationKind, Plan};

use crate::confirm::{Answer, Confirmer};
use crate::summary::{ExecutionSummary, OpError};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Walks the plan's classes in execution order and applies what the
/// operator approves.
pub struct PlanExecutor<C: Confirmer> {
    confirmer: C,
    /// Reorganize moves applied so far; metadata fixes on the same path
    /// follow the file to where it went.
    relocated: HashMap<PathBuf, PathBuf>,
}

impl<C: Confirmer> PlanExecutor<C> {
    pub fn new(confirmer: C) -> Self {
        Self {
            confirmer,
            relocated: HashMap::new(),
        }
    }

    /// Execute every class in the plan. Cancel abandons the remaining
    /// classes of this plan but leaves the summary of what already ran.
    pub fn execute(&mut self, plan: &Plan) -> ExecutionSummary {
        let mut summary = ExecutionSummary::default();

        'classes: for kind in OperationKind::ALL {
            let ops = plan.ops_for(kind);
            if ops.is_empty() {
                continue;
            }

            let ordered = execution_order(kind, ops);
            let class_bytes: u64 = ordered.iter().map(|op| op_bytes(op)).sum();

            let mut apply_all = false;
            loop {
                match self
                    .confirmer
                    .confirm_class(kind, ordered.len(), class_bytes)
                {
                    Answer::Yes => break,
                    Answer::YesToAll => {
                        apply_all = true;
                        break;
                    }
                    Answer::No => {
                        summary.outcome_mut(kind).skipped += ordered.len();
                        info!(%kind, "class skipped by operator");
                        continue 'classes;
                    }
                    Answer::Cancel => {
                        summary.outcome_mut(kind).skipped += ordered.len();
                        summary.cancelled = true;
                        info!(%kind, "cancelled by operator");
                        break 'classes;
                    }
                    Answer::Show => {
                        for op in &ordered {
                            show(op);
                        }
                    }
                }
            }

            'ops: for op in &ordered {
                if !apply_all {
                    loop {
                        match self.confirmer.confirm_item(op) {
                            Answer::Yes => break,
                            Answer::YesToAll => {
                                apply_all = true;
                                break;
                            }
                            Answer::No => {
                                summary.outcome_mut(kind).skipped += 1;
                                continue 'ops;
                            }
                            Answer::Cancel => {
                                summary.outcome_mut(kind).skipped += 1;
                                summary.cancelled = true;
                                break 'classes;
                            }
                            Answer::Show => show(op),
                        }
                    }
                }
                self.apply(op, &mut summary);
            }
        }

        summary
    }

    fn apply(&mut self, op: &Operation, summary: &mut ExecutionSummary) {
        let kind = op.kind();
        let result = match op {
            Operation::PreCleanup { path, move_to, .. }
            | Operation::PostCleanup { path, move_to, .. }
            | Operation::Orphan { path, move_to } => apply_move(path, move_to, &[]),
            Operation::Reorganize { path, move_to } => {
                let result = apply_move(path, move_to, &[]);
                if result.is_ok() {
                    self.relocated.insert(path.clone(), move_to.clone());
                }
                result
            }
            Operation::Duplicate {
                path,
                move_to,
                sidecar_files,
                ..
            } => apply_move(path, move_to, sidecar_files),
            Operation::Permissions {
                path, desired_mode, ..
            } => apply_chmod(self.current_location(path), *desired_mode),
            Operation::Ownership {
                path,
                new_uid,
                new_gid,
                ..
            } => apply_chown(self.current_location(path), *new_uid, *new_gid),
        };

        match result {
            Ok(bytes) => {
                let outcome = summary.outcome_mut(kind);
                outcome.applied += 1;
                outcome.bytes += bytes;
            }
            Err(message) => {
                warn!(path = %op.path().display(), %message, "operation failed");
                summary.outcome_mut(kind).failed += 1;
                summary.errors.push(OpError {
                    path: op.path().to_path_buf(),
                    message,
                });
            }
        }
    }

    /// Where a path lives now, after any reorganize move this run applied.
    fn current_location<'p>(&'p self, path: &'p Path) -> &'p Path {
        self.relocated.get(path).map(PathBuf::as_path).unwrap_or(path)
    }
}

/// Cleanup moves go deepest-first so a child is gone before its parent
/// moves; other classes keep analyzer order.
fn execution_order<'p>(kind: OperationKind, ops: &'p [Operation]) -> Vec<&'p Operation> {
    let mut ordered: Vec<&Operation> = ops.iter().collect();
    if matches!(kind, OperationKind::PreCleanup | OperationKind::PostCleanup) {
        ordered.sort_by_key(|op| match op {
            Operation::PreCleanup { depth, .. } | Operation::PostCleanup { depth, .. } => {
                std::cmp::Reverse(*depth)
            }
            _ => std::cmp::Reverse(0),
        });
    }
    ordered
}

fn op_bytes(op: &Operation) -> u64 {
    match op {
        Operation::PreCleanup { bytes, .. } | Operation::PostCleanup { bytes, .. } => *bytes,
        _ => 0,
    }
}

fn show(op: &Operation) {
    match op {
        Operation::PreCleanup {
            path,
            move_to,
            reason,
            bytes,
            ..
        }
        | Operation::PostCleanup {
            path,
            move_to,
            reason,
            bytes,
            ..
        } => eprintln!(
            "  {} -> {} ({reason}, {bytes} bytes)",
            path.display(),
            move_to.display()
        ),
        Operation::Duplicate {
            path,
            move_to,
            original_path,
            sidecar_files,
        } => {
            eprintln!(
                "  {} -> {} (duplicate of {})",
                path.display(),
                move_to.display(),
                original_path.display()
            );
            for sidecar in sidecar_files {
                eprintln!("    + sidecar {}", sidecar.display());
            }
        }
        Operation::Orphan { path, move_to } | Operation::Reorganize { path, move_to } => {
            eprintln!("  {} -> {}", path.display(), move_to.display())
        }
        Operation::Permissions {
            path,
            current_mode,
            desired_mode,
        } => eprintln!(
            "  {} mode {:o} -> {:o}",
            path.display(),
            current_mode,
            desired_mode
        ),
        Operation::Ownership {
            path,
            current_uid,
            current_gid,
            new_uid,
            new_gid,
            user,
            group,
        } => eprintln!(
            "  {} owner {current_uid}:{current_gid} -> {new_uid}:{new_gid} ({user}:{group})",
            path.display()
        ),
    }
}

/// Move `path` to `dest`, then each sidecar next to it. Returns the bytes
/// relocated.
fn apply_move(path: &Path, dest: &Path, sidecars: &[PathBuf]) -> Result<u64, String> {
    let mut bytes = move_item(path, dest)?;

    if let Some(dest_dir) = dest.parent() {
        for sidecar in sidecars {
            let name = sidecar
                .file_name()
                .ok_or_else(|| format!("sidecar without a name: {}", sidecar.display()))?;
            match move_item(sidecar, &dest_dir.join(name)) {
                Ok(n) => bytes += n,
                Err(err) => {
                    // The master already moved; losing its sidecar would be
                    // worse than reporting and carrying on.
                    warn!(sidecar = %sidecar.display(), error = %err, "sidecar move failed");
                }
            }
        }
    }

    Ok(bytes)
}

/// Rename within the same device, copy-and-remove across devices, with
/// overwrite at the destination.
fn move_item(source: &Path, dest: &Path) -> Result<u64, String> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("cannot create {}: {e}", parent.display()))?;
    }

    let size = size_of(source);

    if dest.exists() {
        debug!(dest = %dest.display(), "overwriting existing recycle entry");
        let removed = if dest.is_dir() {
            fs::remove_dir_all(dest)
        } else {
            fs::remove_file(dest)
        };
        removed.map_err(|e| format!("cannot replace {}: {e}", dest.display()))?;
    }

    if fs::rename(source, dest).is_ok() {
        return Ok(size);
    }

    // Cross-device fallback.
    if source.is_dir() {
        copy_dir_recursive(source, dest)?;
        fs::remove_dir_all(source)
            .map_err(|e| format!("cannot remove source {}: {e}", source.display()))?;
    } else {
        fs::copy(source, dest).map_err(|e| format!("cannot copy to {}: {e}", dest.display()))?;
        fs::remove_file(source)
            .map_err(|e| format!("cannot remove source {}: {e}", source.display()))?;
    }
    Ok(size)
}

fn copy_dir_recursive(source: &Path, dest: &Path) -> Result<(), String> {
    fs::create_dir_all(dest).map_err(|e| format!("cannot create {}: {e}", dest.display()))?;
    let entries =
        fs::read_dir(source).map_err(|e| format!("cannot read {}: {e}", source.display()))?;
    for entry in entries {
        let entry = entry.map_err(|e| format!("cannot read entry: {e}"))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        if from.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            fs::copy(&from, &to).map_err(|e| format!("cannot copy to {}: {e}", to.display()))?;
        }
    }
    Ok(())
}

fn size_of(path: &Path) -> u64 {
    if path.is_dir() {
        let mut total = 0;
        if let Ok(entries) = fs::read_dir(path) {
            for entry in entries.flatten() {
                total += size_of(&entry.path());
            }
        }
        total
    } else {
        fs::symlink_metadata(path).map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(unix)]
fn apply_chmod(path: &Path, mode: u32) -> Result<u64, String> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| format!("chmod failed: {e}"))?;
    Ok(0)
}

#[cfg(not(unix))]
fn apply_chmod(_path: &Path, _mode: u32) -> Result<u64, String> {
    Err("chmod is only supported on unix".to_string())
}

#[cfg(unix)]
fn apply_chown(path: &Path, uid: u32, gid: u32) -> Result<u64, String> {
    std::os::unix::fs::chown(path, Some(uid), Some(gid))
        .map_err(|e| format!("chown failed: {e}"))?;
    Ok(0)
}

#[cfg(not(unix))]
fn apply_chown(_path: &Path, _uid: u32, _gid: u32) -> Result<u64, String> {
    Err("chown is only supported on unix".to_string())
}
