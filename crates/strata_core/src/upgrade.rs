//! The offline segment upgrade orchestrator.

use crate::compaction::{CompactionManager, DrainOutcome};
use crate::deletion::DeletionTracker;
use crate::error::{CoreError, CoreResult};
use crate::handle::SegmentHandle;
use crate::output::ProgressSink;
use crate::rewrite::{FormatRewriter, SegmentRewriter};
use crate::scope::UpgradeScope;
use std::path::Path;
use std::time::Duration;
use strata_store::{ComponentSet, FormatVersion, ListMode, SegmentDescriptor, SegmentLister};
use tracing::{debug, error, info, warn};

/// Default bound on the compaction drain at shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Checks that `target` is a version this build can write.
///
/// The version gate runs before any directory scan, so a bad request leaves
/// the table directory completely unmodified.
pub fn ensure_writable(target: FormatVersion) -> CoreResult<()> {
    if !target.is_writable() {
        return Err(CoreError::unsupported_target_version(target.to_string()));
    }
    Ok(())
}

/// Options for one upgrade run.
#[derive(Debug, Clone)]
pub struct UpgradeOptions {
    /// Format version to upgrade segments to.
    pub target: FormatVersion,
    /// Preserve the original segment files alongside the rewritten ones.
    pub keep_source: bool,
    /// Upgrade the named snapshot instead of the live segments.
    pub snapshot: Option<String>,
    /// Emit full error detail for per-segment failures.
    pub verbose: bool,
    /// Bound on the compaction drain at shutdown.
    pub drain_timeout: Duration,
}

impl UpgradeOptions {
    /// Creates options targeting `target` with defaults otherwise.
    #[must_use]
    pub fn new(target: FormatVersion) -> Self {
        Self {
            target,
            keep_source: false,
            snapshot: None,
            verbose: false,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    /// Keeps source files after a successful conversion.
    #[must_use]
    pub fn with_keep_source(mut self, keep_source: bool) -> Self {
        self.keep_source = keep_source;
        self
    }

    /// Restricts the run to the named snapshot.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: impl Into<String>) -> Self {
        self.snapshot = Some(snapshot.into());
        self
    }

    /// Enables verbose per-segment error detail.
    #[must_use]
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Overrides the shutdown drain timeout.
    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }
}

/// Counts reported after an upgrade run.
///
/// Per-segment failures are contained here rather than propagated; only
/// precondition failures abort a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpgradeSummary {
    /// Segments enumerated by the directory scan.
    pub discovered: usize,
    /// Segments that needed an upgrade.
    pub candidates: usize,
    /// Segments successfully converted.
    pub converted: usize,
    /// Segments whose discovery open or conversion failed.
    pub failed: usize,
}

/// Orchestrates the upgrade of every outdated segment in one table
/// directory.
///
/// Control flow: version gate → directory scan → candidate selection →
/// sequential per-segment conversion → shutdown drain. Candidates are
/// converted strictly one at a time, so at most one old/new segment pair
/// exists on disk during a run and no cross-segment locking is needed.
pub struct Upgrader {
    options: UpgradeOptions,
    rewriter: Box<dyn SegmentRewriter>,
    compaction: CompactionManager,
    deletions: DeletionTracker,
}

impl Upgrader {
    /// Creates an upgrader using the standard [`FormatRewriter`].
    #[must_use]
    pub fn new(options: UpgradeOptions) -> Self {
        Self::with_rewriter(options, Box::new(FormatRewriter::new()))
    }

    /// Creates an upgrader with a custom rewrite capability.
    #[must_use]
    pub fn with_rewriter(options: UpgradeOptions, rewriter: Box<dyn SegmentRewriter>) -> Self {
        Self {
            options,
            rewriter,
            compaction: CompactionManager::new(),
            deletions: DeletionTracker::new(),
        }
    }

    /// The background compaction manager drained at shutdown.
    #[must_use]
    pub fn compaction(&self) -> &CompactionManager {
        &self.compaction
    }

    /// Runs the upgrade against `table_dir`.
    ///
    /// # Errors
    ///
    /// Only precondition failures (unsupported target version, unreadable
    /// directory) are returned as errors. Per-segment failures are logged,
    /// isolated and counted in the summary.
    pub fn run(self, table_dir: &Path, sink: &mut dyn ProgressSink) -> CoreResult<UpgradeSummary> {
        ensure_writable(self.options.target)?;

        let mode = match &self.options.snapshot {
            Some(name) => ListMode::Snapshot(name.clone()),
            None => ListMode::Live,
        };
        let segments = SegmentLister::new(table_dir, mode).list()?;

        let mut summary = UpgradeSummary::default();
        let candidates = self.select_candidates(segments, &mut summary);

        summary.candidates = candidates.len();
        sink.line(&format!(
            "Found {} segments that need upgrade.",
            summary.candidates
        ));

        for handle in candidates {
            match self.convert_one(&handle, sink) {
                Ok(()) => {
                    summary.converted += 1;
                    sink.line(&format!("Upgrade of {} complete.", handle.descriptor()));
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(segment = %handle.descriptor(), error = %e, "error upgrading segment");
                    if self.options.verbose {
                        debug!(segment = %handle.descriptor(), ?e, "upgrade failure detail");
                    }
                    sink.line(&format!("Error upgrading {}: {e}", handle.descriptor()));
                }
            }
            // The scope's commit or abort released the handle already; this
            // idempotent backstop covers any path where ownership transfer
            // did not happen.
            handle.release();
        }

        self.shutdown();

        info!(
            discovered = summary.discovered,
            candidates = summary.candidates,
            converted = summary.converted,
            failed = summary.failed,
            "upgrade run finished"
        );
        Ok(summary)
    }

    /// Opens every loadable scanned segment and retains the outdated ones.
    ///
    /// A segment already at the target version (or at the latest version)
    /// needs nothing and is released immediately; it never enters an
    /// upgrade scope.
    fn select_candidates(
        &self,
        segments: std::collections::BTreeMap<SegmentDescriptor, ComponentSet>,
        summary: &mut UpgradeSummary,
    ) -> Vec<SegmentHandle> {
        let mut candidates = Vec::new();

        for (descriptor, components) in segments {
            summary.discovered += 1;

            if !components.is_loadable() {
                debug!(segment = %descriptor, "skipping segment with missing required components");
                continue;
            }

            let handle = match SegmentHandle::open_no_validation(descriptor.clone(), components) {
                Ok(handle) => handle,
                Err(e) => {
                    // Discovery failures are isolated: log, skip, keep going.
                    summary.failed += 1;
                    error!(segment = %descriptor, error = %e, "error loading segment");
                    if self.options.verbose {
                        debug!(segment = %descriptor, ?e, "load failure detail");
                    }
                    continue;
                }
            };

            let recorded = handle.recorded_version();
            if recorded == self.options.target || recorded.is_latest() {
                handle.release();
                continue;
            }
            candidates.push(handle);
        }

        candidates
    }

    /// Converts one segment inside its own upgrade scope.
    fn convert_one(&self, handle: &SegmentHandle, sink: &mut dyn ProgressSink) -> CoreResult<()> {
        let mut scope = UpgradeScope::open(handle, self.options.keep_source)?;
        // An error return drops the scope while open, which aborts it and
        // discards any partial output.
        self.rewriter.rewrite(
            handle,
            &mut scope,
            sink,
            self.options.target,
            self.options.keep_source,
        )?;
        scope.commit(&self.deletions)?;
        Ok(())
    }

    /// Drains background work before the run reports completion.
    fn shutdown(&self) {
        if self.compaction.drain_and_stop(self.options.drain_timeout) == DrainOutcome::TimedOut {
            // Committed conversions are already durable; timing out here
            // only means background work was abandoned to the process exit.
            warn!(
                timeout_secs = self.options.drain_timeout.as_secs(),
                "compaction drain timed out"
            );
        }
        self.deletions.wait_for_pending();
    }
}

impl std::fmt::Debug for Upgrader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upgrader")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
