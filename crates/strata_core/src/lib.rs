//! # Strata Core
//!
//! Segment lifecycle engine for StrataDB offline maintenance.
//!
//! This crate provides:
//! - Reference-counted segment handles with structural (no-validation) open
//! - Lifecycle transactions ([`UpgradeScope`]) with atomic commit-or-discard
//! - The segment format rewriter and its trait seam
//! - Deferred file deletion and background compaction draining
//! - The [`Upgrader`] orchestrator tying the above together

mod compaction;
mod deletion;
mod error;
mod format;
mod handle;
mod output;
mod rewrite;
mod scope;
mod upgrade;

pub use compaction::{CompactionManager, DrainOutcome};
pub use deletion::DeletionTracker;
pub use error::{CoreError, CoreResult};
pub use format::{DataHeader, SegmentBuilder, DATA_HEADER_LEN, DATA_MAGIC, INDEX_MAGIC};
pub use handle::SegmentHandle;
pub use output::{BufferSink, ProgressSink, StdoutSink};
pub use rewrite::{FormatRewriter, SegmentRewriter};
pub use scope::{ScopeState, UpgradeScope};
pub use upgrade::{
    ensure_writable, UpgradeOptions, UpgradeSummary, Upgrader, DEFAULT_DRAIN_TIMEOUT,
};
