//! Core types for curator.
//!
//! This crate provides the data structures shared by the scanner, the
//! analyzers and the executor: per-root configuration, the scan model
//! (file and directory entries with aggregated statistics), the glob-style
//! path matcher, the rebase helper used to compute recycle destinations,
//! and the operation/plan types the analyzers emit.

mod config;
mod entry;
mod error;
mod matcher;
mod model;
mod operation;
mod rebase;

pub use config::{
    parse_perm, Action, Config, RootConfig, RootConfigBuilder, MAX_IN_FLIGHT,
};
pub use entry::{DirEntry, FileEntry, StatSnapshot};
pub use error::{ConfigError, ScanError, ScanWarning, WarningKind};
pub use matcher::PathMatcher;
pub use model::{PathMap, ScanCounters, ScanModel};
pub use operation::{CleanupReason, Operation, OperationKind, Plan, PlanArbiter};
pub use rebase::rebase;
