//! Plan execution for curator.
//!
//! Takes the arbitrated plan, walks its action classes in order, asks the
//! operator for confirmation per class and per item, and applies the
//! operations: moves into the recycle area or to a reorganize target,
//! chmod, chown. Nothing here ever unlinks a file.

mod confirm;
mod executor;
mod summary;

pub use confirm::{Answer, AssumeYes, Confirmer, ScriptedConfirmer, StdinConfirmer};
pub use executor::PlanExecutor;
pub use summary::{ClassOutcome, ExecutionSummary, OpError};
