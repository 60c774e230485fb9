//! Execution outcome types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use curator_core::OperationKind;

/// A failed operation, kept for the final report.
#[derive(Debug, Clone)]
pub struct OpError {
    pub path: PathBuf,
    pub message: String,
}

impl std::fmt::Display for OpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Per-class tallies.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassOutcome {
    pub applied: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Bytes reclaimed or relocated by successful operations only.
    pub bytes: u64,
}

/// What one executor pass did.
#[derive(Debug, Default)]
pub struct ExecutionSummary {
    pub classes: BTreeMap<OperationKind, ClassOutcome>,
    pub errors: Vec<OpError>,
    /// True when the operator cancelled mid-run.
    pub cancelled: bool,
}

impl ExecutionSummary {
    pub fn outcome_mut(&mut self, kind: OperationKind) -> &mut ClassOutcome {
        self.classes.entry(kind).or_default()
    }

    pub fn total_applied(&self) -> usize {
        self.classes.values().map(|c| c.applied).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.classes.values().map(|c| c.failed).sum()
    }

    pub fn total_bytes(&self) -> u64 {
        self.classes.values().map(|c| c.bytes).sum()
    }
}
