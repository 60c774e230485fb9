//! Analysis engine for curator.
//!
//! Every analyzer consumes a read-only [`ScanModel`](curator_core::ScanModel)
//! and emits [`Operation`](curator_core::Operation)s; none of them touches
//! the tree. The pipeline feeds their output through the plan arbiter in a
//! fixed order so destructive claims (cleanup, duplicates, orphans) always
//! win over cosmetic ones (reorganize, permissions, ownership).
//!
//! - [`cleanup`] - empty/marked items, with cascade suppression
//! - [`duplicates`] - group-then-hash duplicate search, fileset-aware
//! - [`orphans`] - lone files left behind in their folder
//! - [`reorganize`] - capture-date layout moves
//! - [`permissions`] / [`ownership`] - POSIX metadata checks
//! - [`dates`] - the shared capture-date extraction pipeline

pub mod cleanup;
pub mod dates;
pub mod duplicates;
pub mod orphans;
pub mod ownership;
pub mod permissions;
pub mod reorganize;

pub use cleanup::{CleanupPhase, CleanupReport};
pub use dates::{DateExtractor, DateSource, ExtractedDate};
pub use duplicates::{determine_original, DuplicateReport};
pub use ownership::AccountDb;
