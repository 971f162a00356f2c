//! Directory scanning for segments.

use crate::component::ComponentSet;
use crate::descriptor::SegmentDescriptor;
use crate::error::{StoreError, StoreResult};
use crate::layout::TableLayout;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Which segments a scan should see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListMode {
    /// Live segments only: the table directory itself, excluding backups
    /// and snapshots.
    Live,
    /// Only segments under the named snapshot.
    Snapshot(String),
}

/// Enumerates the segments of one table directory.
///
/// The lister groups component files by segment identity without opening
/// any of them. A file that is present but unreadable simply appears as a
/// component in the set; deciding whether it can actually be loaded is the
/// caller's problem. File names that do not follow the segment naming
/// convention (manifests, lock files, foreign artifacts) are ignored.
#[derive(Debug)]
pub struct SegmentLister {
    table_dir: PathBuf,
    mode: ListMode,
}

impl SegmentLister {
    /// Creates a lister over a table directory.
    #[must_use]
    pub fn new(table_dir: impl Into<PathBuf>, mode: ListMode) -> Self {
        Self {
            table_dir: table_dir.into(),
            mode,
        }
    }

    /// Scans and returns every segment found, keyed by descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DirectoryRead`] only if the directory itself
    /// cannot be listed. This is fatal for the whole run: no safe
    /// enumeration is possible.
    pub fn list(&self) -> StoreResult<BTreeMap<SegmentDescriptor, ComponentSet>> {
        let dir = match &self.mode {
            ListMode::Live => self.table_dir.clone(),
            ListMode::Snapshot(name) => TableLayout::snapshot_dir(&self.table_dir, name),
        };

        let entries =
            fs::read_dir(&dir).map_err(|e| StoreError::directory_read(dir.clone(), e))?;

        let mut segments: BTreeMap<SegmentDescriptor, ComponentSet> = BTreeMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::directory_read(dir.clone(), e))?;
            // Subdirectories (backups/, snapshots/) are never part of the
            // live segment set.
            if entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            match SegmentDescriptor::parse(&dir, name) {
                Ok((descriptor, component)) => {
                    segments.entry(descriptor).or_default().insert(component);
                }
                Err(_) => {
                    debug!(file = name, "ignoring non-segment file");
                }
            }
        }

        Ok(segments)
    }
}
