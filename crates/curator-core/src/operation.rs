//! Planned operations and the per-root plan.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The action class an operation belongs to. Variant order is execution
/// order, except that post-cleanup lives in its own plan built after the
/// first execution pass and a rescan.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    PreCleanup,
    Duplicate,
    Orphan,
    Reorganize,
    Permissions,
    Ownership,
    PostCleanup,
}

impl OperationKind {
    /// Destructive kinds change a path's name or location; at most one of
    /// them may claim any given path.
    pub fn is_destructive(self) -> bool {
        matches!(
            self,
            Self::PreCleanup | Self::Duplicate | Self::Orphan | Self::PostCleanup
        )
    }

    /// All kinds in execution order.
    pub const ALL: [OperationKind; 7] = [
        Self::PreCleanup,
        Self::Duplicate,
        Self::Orphan,
        Self::Reorganize,
        Self::Permissions,
        Self::Ownership,
        Self::PostCleanup,
    ];
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::PreCleanup => "pre-cleanup",
            Self::Duplicate => "duplicates",
            Self::Orphan => "orphans",
            Self::Reorganize => "reorganize",
            Self::Permissions => "permissions",
            Self::Ownership => "ownership",
            Self::PostCleanup => "post-cleanup",
        };
        f.write_str(label)
    }
}

/// Why a cleanup candidate was selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupReason {
    /// Directory holds nothing at all.
    Empty,
    /// Directory total size is non-zero but under the threshold.
    BelowThreshold,
    /// Directory size is zero but it still contains entries.
    OnlyIgnoredItems,
    /// File matched a remove pattern.
    MarkedForDeletion,
}

impl std::fmt::Display for CleanupReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Empty => "is empty",
            Self::BelowThreshold => "size below threshold",
            Self::OnlyIgnoredItems => {
                "considered empty but contains only ignored/zero-byte items"
            }
            Self::MarkedForDeletion => "marked for deletion",
        };
        f.write_str(label)
    }
}

/// A single corrective operation. Each variant carries exactly the fields
/// its kind needs; the executor routes by matching, never by probing for
/// optional fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Operation {
    /// Move an empty/marked item into the recycle area before analysis.
    PreCleanup {
        path: PathBuf,
        move_to: PathBuf,
        reason: CleanupReason,
        /// Bytes reclaimed by the move (subtree total for directories).
        bytes: u64,
        /// Depth of the item below the scan root; moves run deepest-first.
        depth: u32,
    },
    /// Move a duplicate into the recycle area, keeping `original_path`.
    Duplicate {
        path: PathBuf,
        move_to: PathBuf,
        original_path: PathBuf,
        /// Companion files that travel with this duplicate.
        sidecar_files: Vec<PathBuf>,
    },
    /// Move a lone file into the recycle area.
    Orphan { path: PathBuf, move_to: PathBuf },
    /// Move a file to its date-derived location.
    Reorganize { path: PathBuf, move_to: PathBuf },
    /// chmod to the desired mode.
    Permissions {
        path: PathBuf,
        current_mode: u32,
        desired_mode: u32,
    },
    /// chown to the desired uid/gid.
    Ownership {
        path: PathBuf,
        current_uid: u32,
        current_gid: u32,
        new_uid: u32,
        new_gid: u32,
        user: String,
        group: String,
    },
    /// Same as pre-cleanup, computed from a fresh scan after execution.
    PostCleanup {
        path: PathBuf,
        move_to: PathBuf,
        reason: CleanupReason,
        bytes: u64,
        depth: u32,
    },
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::PreCleanup { .. } => OperationKind::PreCleanup,
            Self::Duplicate { .. } => OperationKind::Duplicate,
            Self::Orphan { .. } => OperationKind::Orphan,
            Self::Reorganize { .. } => OperationKind::Reorganize,
            Self::Permissions { .. } => OperationKind::Permissions,
            Self::Ownership { .. } => OperationKind::Ownership,
            Self::PostCleanup { .. } => OperationKind::PostCleanup,
        }
    }

    /// The path this operation acts on.
    pub fn path(&self) -> &Path {
        match self {
            Self::PreCleanup { path, .. }
            | Self::Duplicate { path, .. }
            | Self::Orphan { path, .. }
            | Self::Reorganize { path, .. }
            | Self::Permissions { path, .. }
            | Self::Ownership { path, .. }
            | Self::PostCleanup { path, .. } => path,
        }
    }

    /// The move destination, for kinds that move.
    pub fn move_to(&self) -> Option<&Path> {
        match self {
            Self::PreCleanup { move_to, .. }
            | Self::Duplicate { move_to, .. }
            | Self::Orphan { move_to, .. }
            | Self::Reorganize { move_to, .. }
            | Self::PostCleanup { move_to, .. } => Some(move_to),
            Self::Permissions { .. } | Self::Ownership { .. } => None,
        }
    }
}

/// The arbitrated set of operations for one root, grouped by kind.
///
/// Built only through the arbiter, which enforces that a path claimed by a
/// destructive kind appears nowhere else.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    ops: BTreeMap<OperationKind, Vec<Operation>>,
}

impl Plan {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, op: Operation) {
        self.ops.entry(op.kind()).or_default().push(op);
    }

    /// Operations of one kind, in the order the analyzer produced them.
    pub fn ops_for(&self, kind: OperationKind) -> &[Operation] {
        self.ops.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.ops.values().all(Vec::is_empty)
    }

    pub fn total_ops(&self) -> usize {
        self.ops.values().map(Vec::len).sum()
    }

    /// Kinds that actually have operations, in execution order.
    pub fn kinds(&self) -> impl Iterator<Item = OperationKind> + '_ {
        OperationKind::ALL
            .into_iter()
            .filter(|k| !self.ops_for(*k).is_empty())
    }
}

/// Builder enforcing destructive/non-destructive precedence.
///
/// Destructive analyzers claim paths in the order they are fed; later
/// destructive claims on an already-claimed path are dropped, and
/// non-destructive operations on any claimed path are filtered out. A path
/// only becomes claimed when its analyzer's action is actually enabled,
/// which is guaranteed by construction: disabled analyzers are never run
/// and therefore never feed the arbiter.
#[derive(Debug, Default)]
pub struct PlanArbiter {
    plan: Plan,
    destructive: std::collections::HashSet<PathBuf>,
}

impl PlanArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add destructive operations; returns how many were accepted.
    pub fn claim_destructive(&mut self, ops: Vec<Operation>) -> usize {
        let mut accepted = 0;
        for op in ops {
            debug_assert!(op.kind().is_destructive());
            if self.destructive.contains(op.path()) {
                continue;
            }
            self.destructive.insert(op.path().to_path_buf());
            if let Operation::Duplicate { sidecar_files, .. } = &op {
                for sidecar in sidecar_files {
                    self.destructive.insert(sidecar.clone());
                }
            }
            self.plan.push(op);
            accepted += 1;
        }
        accepted
    }

    /// Add non-destructive operations, dropping any on or under a claimed
    /// path. The descendant check matters because cleanup cascade claims
    /// only the topmost directory of an empty subtree: a chmod/chown on
    /// something below it would otherwise run after the subtree moved.
    pub fn add_cosmetic(&mut self, ops: Vec<Operation>) -> usize {
        let mut accepted = 0;
        for op in ops {
            debug_assert!(!op.kind().is_destructive());
            if self.is_claimed(op.path()) {
                continue;
            }
            self.plan.push(op);
            accepted += 1;
        }
        accepted
    }

    /// Whether this path, or any ancestor of it, was claimed destructively.
    /// File paths in the set cannot have descendants, so the ancestor walk
    /// never over-matches.
    fn is_claimed(&self, path: &Path) -> bool {
        let mut cursor = Some(path);
        while let Some(p) = cursor {
            if self.destructive.contains(p) {
                return true;
            }
            cursor = p.parent();
        }
        false
    }

    pub fn into_plan(self) -> Plan {
        self.plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dup(path: &str) -> Operation {
        Operation::Duplicate {
            path: PathBuf::from(path),
            move_to: PathBuf::from("/r/#recycle").join(&path[1..]),
            original_path: PathBuf::from("/r/orig.jpg"),
            sidecar_files: Vec::new(),
        }
    }

    fn chmod(path: &str) -> Operation {
        Operation::Permissions {
            path: PathBuf::from(path),
            current_mode: 0o600,
            desired_mode: 0o664,
        }
    }

    #[test]
    fn destructive_claim_wins_over_cosmetic() {
        let mut arbiter = PlanArbiter::new();
        arbiter.claim_destructive(vec![dup("/r/dup.jpg")]);
        let accepted = arbiter.add_cosmetic(vec![chmod("/r/dup.jpg"), chmod("/r/ok.jpg")]);
        assert_eq!(accepted, 1);

        let plan = arbiter.into_plan();
        assert_eq!(plan.ops_for(OperationKind::Duplicate).len(), 1);
        let perms = plan.ops_for(OperationKind::Permissions);
        assert_eq!(perms.len(), 1);
        assert_eq!(perms[0].path(), Path::new("/r/ok.jpg"));
    }

    #[test]
    fn second_destructive_claim_is_dropped() {
        let mut arbiter = PlanArbiter::new();
        arbiter.claim_destructive(vec![dup("/r/x.jpg")]);
        let accepted = arbiter.claim_destructive(vec![Operation::Orphan {
            path: PathBuf::from("/r/x.jpg"),
            move_to: PathBuf::from("/r/#recycle/x.jpg"),
        }]);
        assert_eq!(accepted, 0);
        let plan = arbiter.into_plan();
        assert!(plan.ops_for(OperationKind::Orphan).is_empty());
    }

    #[test]
    fn cosmetic_ops_under_a_claimed_directory_are_dropped() {
        // cleanup cascade claims only the top of an empty subtree; fixes
        // below it must not survive into the plan
        let mut arbiter = PlanArbiter::new();
        arbiter.claim_destructive(vec![Operation::PreCleanup {
            path: PathBuf::from("/r/old"),
            move_to: PathBuf::from("/r/#recycle/old"),
            reason: CleanupReason::Empty,
            bytes: 0,
            depth: 1,
        }]);

        let accepted = arbiter.add_cosmetic(vec![
            chmod("/r/old/deeper"),
            chmod("/r/old/deeper/file.jpg"),
            chmod("/r/elsewhere"),
        ]);
        assert_eq!(accepted, 1);

        let plan = arbiter.into_plan();
        let perms = plan.ops_for(OperationKind::Permissions);
        assert_eq!(perms.len(), 1);
        assert_eq!(perms[0].path(), Path::new("/r/elsewhere"));
    }

    #[test]
    fn sidecars_are_claimed_with_their_master() {
        let mut arbiter = PlanArbiter::new();
        arbiter.claim_destructive(vec![Operation::Duplicate {
            path: PathBuf::from("/r/b/IMG.jpg"),
            move_to: PathBuf::from("/r/#recycle/b/IMG.jpg"),
            original_path: PathBuf::from("/r/a/IMG.jpg"),
            sidecar_files: vec![PathBuf::from("/r/b/IMG.xmp")],
        }]);
        let accepted = arbiter.add_cosmetic(vec![chmod("/r/b/IMG.xmp")]);
        assert_eq!(accepted, 0);
    }

    #[test]
    fn plan_kinds_follow_execution_order() {
        let mut arbiter = PlanArbiter::new();
        arbiter.add_cosmetic(vec![chmod("/r/a")]);
        arbiter.claim_destructive(vec![dup("/r/b")]);
        let plan = arbiter.into_plan();
        let kinds: Vec<_> = plan.kinds().collect();
        assert_eq!(
            kinds,
            vec![OperationKind::Duplicate, OperationKind::Permissions]
        );
    }
}
