//! Upgrade scopes: per-segment lifecycle transactions.

use crate::deletion::DeletionTracker;
use crate::error::{CoreError, CoreResult};
use crate::handle::SegmentHandle;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lifecycle state of an [`UpgradeScope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// The scope is active; new files may be tracked.
    Open,
    /// The rewrite was committed; the new segment is durable.
    Committed,
    /// The rewrite was discarded; the old segment remains authoritative.
    Aborted,
}

/// A transaction binding exactly one segment handle to an upgrade.
///
/// From `Open` exactly one terminal state is reachable:
///
/// - [`commit`](Self::commit): the new segment's files become the durable
///   representation and the old segment's files are retired (unless the
///   scope keeps its source).
/// - [`abort`](Self::abort): every partially-written new file is discarded
///   and the old segment remains authoritative.
///
/// A scope still `Open` when dropped aborts itself, so an error return from
/// any enclosing operation cannot leave a scope dangling.
#[derive(Debug)]
pub struct UpgradeScope {
    handle: SegmentHandle,
    state: ScopeState,
    new_files: Vec<PathBuf>,
    keep_source: bool,
}

impl UpgradeScope {
    /// Opens a scope bound to `handle`.
    ///
    /// With `keep_source` set, commit preserves the original segment's files
    /// alongside the rewritten ones (non-destructive verification runs).
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidOperation`] if a scope is already open for this
    /// segment.
    pub fn open(handle: &SegmentHandle, keep_source: bool) -> CoreResult<Self> {
        handle.begin_scope()?;
        debug!(segment = %handle.descriptor(), keep_source, "opened upgrade scope");
        Ok(Self {
            handle: handle.clone(),
            state: ScopeState::Open,
            new_files: Vec::new(),
            keep_source,
        })
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ScopeState {
        self.state
    }

    /// Registers a file the rewrite is about to create.
    ///
    /// Tracked files are fsynced on commit and unlinked on abort, so the
    /// rewriter must register every output path before writing to it.
    pub fn track_new(&mut self, path: PathBuf) -> CoreResult<()> {
        self.ensure_open("track_new")?;
        self.new_files.push(path);
        Ok(())
    }

    /// Commits the rewrite.
    ///
    /// Tracked new files are fsynced, then every old component file is
    /// handed to `deletions` for deferred unlink (unless the scope keeps
    /// its source). The handle is released.
    ///
    /// # Errors
    ///
    /// I/O errors while syncing leave the scope `Open`; dropping it will
    /// then abort and discard the new files.
    pub fn commit(&mut self, deletions: &DeletionTracker) -> CoreResult<()> {
        self.ensure_open("commit")?;

        for path in &self.new_files {
            File::open(path)?.sync_all()?;
        }
        sync_directory(&self.handle.descriptor().directory)?;

        if !self.keep_source {
            let descriptor = self.handle.descriptor();
            for component in self.handle.components().iter() {
                deletions.defer(descriptor.path_for(component));
            }
        }

        self.state = ScopeState::Committed;
        self.handle.release();
        self.handle.end_scope();
        debug!(segment = %self.handle.descriptor(), "committed upgrade scope");
        Ok(())
    }

    /// Aborts the rewrite, discarding all tracked new files.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidOperation`] if the scope already reached a
    /// terminal state.
    pub fn abort(&mut self) -> CoreResult<()> {
        self.ensure_open("abort")?;
        self.do_abort();
        Ok(())
    }

    fn do_abort(&mut self) {
        for path in &self.new_files {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to discard partial file");
                }
            }
        }
        self.state = ScopeState::Aborted;
        self.handle.release();
        self.handle.end_scope();
        debug!(segment = %self.handle.descriptor(), "aborted upgrade scope");
    }

    fn ensure_open(&self, operation: &str) -> CoreResult<()> {
        if self.state != ScopeState::Open {
            return Err(CoreError::invalid_operation(format!(
                "{operation} on a scope in state {:?}",
                self.state
            )));
        }
        Ok(())
    }
}

impl Drop for UpgradeScope {
    fn drop(&mut self) {
        if self.state == ScopeState::Open {
            warn!(
                segment = %self.handle.descriptor(),
                "upgrade scope dropped while open, aborting"
            );
            self.do_abort();
        }
    }
}

/// Fsyncs a directory so renames and unlinks within it are durable.
#[cfg(unix)]
fn sync_directory(path: &Path) -> CoreResult<()> {
    let dir = File::open(path)?;
    dir.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> CoreResult<()> {
    // NTFS journaling covers metadata durability; directory fsync is not
    // supported on Windows.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::SegmentBuilder;
    use strata_store::{Component, FormatVersion, SegmentDescriptor};
    use tempfile::tempdir;

    fn open_fixture(dir: &std::path::Path) -> SegmentHandle {
        let descriptor = SegmentDescriptor::new(
            "ks",
            "events",
            FormatVersion::parse("la").unwrap(),
            1,
            dir,
        );
        let mut builder = SegmentBuilder::new(descriptor.clone());
        builder.add_row(b"payload");
        let components = builder.finish().unwrap();
        SegmentHandle::open_no_validation(descriptor, components).unwrap()
    }

    fn write_new_file(scope: &mut UpgradeScope, dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        scope.track_new(path.clone()).unwrap();
        std::fs::write(&path, b"new contents").unwrap();
        path
    }

    #[test]
    fn commit_retires_old_files() {
        let temp = tempdir().unwrap();
        let handle = open_fixture(temp.path());
        let deletions = DeletionTracker::new();

        let mut scope = UpgradeScope::open(&handle, false).unwrap();
        let new_path = write_new_file(&mut scope, temp.path(), "ks-events-ma-1-Data.db");

        scope.commit(&deletions).unwrap();
        deletions.wait_for_pending();

        assert_eq!(scope.state(), ScopeState::Committed);
        assert!(new_path.exists());
        assert!(!handle.descriptor().path_for(Component::Data).exists());
        assert!(handle.is_released());
    }

    #[test]
    fn keep_source_preserves_old_files() {
        let temp = tempdir().unwrap();
        let handle = open_fixture(temp.path());
        let deletions = DeletionTracker::new();

        let mut scope = UpgradeScope::open(&handle, true).unwrap();
        let new_path = write_new_file(&mut scope, temp.path(), "ks-events-ma-1-Data.db");

        scope.commit(&deletions).unwrap();
        deletions.wait_for_pending();

        assert!(new_path.exists());
        assert!(handle.descriptor().path_for(Component::Data).exists());
    }

    #[test]
    fn abort_discards_new_files() {
        let temp = tempdir().unwrap();
        let handle = open_fixture(temp.path());

        let mut scope = UpgradeScope::open(&handle, false).unwrap();
        let new_path = write_new_file(&mut scope, temp.path(), "ks-events-ma-1-Data.db");

        scope.abort().unwrap();

        assert_eq!(scope.state(), ScopeState::Aborted);
        assert!(!new_path.exists());
        assert!(handle.descriptor().path_for(Component::Data).exists());
        assert!(handle.is_released());
    }

    #[test]
    fn drop_while_open_auto_aborts() {
        let temp = tempdir().unwrap();
        let handle = open_fixture(temp.path());

        let new_path = {
            let mut scope = UpgradeScope::open(&handle, false).unwrap();
            write_new_file(&mut scope, temp.path(), "ks-events-ma-1-Data.db")
        };

        assert!(!new_path.exists());
        assert!(handle.is_released());
    }

    #[test]
    fn terminal_scope_rejects_further_operations() {
        let temp = tempdir().unwrap();
        let handle = open_fixture(temp.path());
        let deletions = DeletionTracker::new();

        let mut scope = UpgradeScope::open(&handle, false).unwrap();
        scope.commit(&deletions).unwrap();

        assert!(scope.abort().is_err());
        assert!(scope.commit(&deletions).is_err());
        assert!(scope.track_new(temp.path().join("x")).is_err());
    }

    #[test]
    fn second_scope_for_same_handle_is_rejected() {
        let temp = tempdir().unwrap();
        let handle = open_fixture(temp.path());

        let _scope = UpgradeScope::open(&handle, false).unwrap();
        let err = UpgradeScope::open(&handle, false).unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }

    #[test]
    fn scope_can_reopen_after_abort() {
        let temp = tempdir().unwrap();
        let handle = open_fixture(temp.path());

        let mut scope = UpgradeScope::open(&handle, false).unwrap();
        scope.abort().unwrap();

        // The handle is released, but the identity is free for a new scope.
        let _scope2 = UpgradeScope::open(&handle, false).unwrap();
    }

    #[test]
    fn components_missing_optional_files_commit_cleanly() {
        let temp = tempdir().unwrap();
        let descriptor = SegmentDescriptor::new(
            "ks",
            "events",
            FormatVersion::parse("la").unwrap(),
            2,
            temp.path(),
        );
        let mut builder = SegmentBuilder::new(descriptor.clone());
        builder.add_row(b"x").without_statistics();
        let components = builder.finish().unwrap();
        assert!(!components.contains(Component::Statistics));

        let handle = SegmentHandle::open_no_validation(descriptor, components).unwrap();
        let deletions = DeletionTracker::new();
        let mut scope = UpgradeScope::open(&handle, false).unwrap();
        scope.commit(&deletions).unwrap();
        deletions.wait_for_pending();

        assert!(!handle.descriptor().path_for(Component::Data).exists());
    }
}
