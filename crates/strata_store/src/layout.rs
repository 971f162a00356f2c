//! Data directory layout.
//!
//! ```text
//! <data_dir>/
//! └─ <keyspace>/
//!    └─ <table>/
//!       ├─ <segment component files>
//!       ├─ backups/
//!       └─ snapshots/<name>/
//! ```

use crate::error::{StoreError, StoreResult};
use std::path::{Path, PathBuf};

/// Subdirectory holding segment backups. Never scanned in live mode.
pub const BACKUPS_DIR: &str = "backups";
/// Subdirectory holding named snapshots.
pub const SNAPSHOTS_DIR: &str = "snapshots";

/// Resolves table directories under a data root.
#[derive(Debug, Clone)]
pub struct TableLayout {
    data_dir: PathBuf,
}

impl TableLayout {
    /// Creates a layout rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Returns the data root.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Resolves the directory for a keyspace/table pair.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownTable`] if the directory does not exist.
    /// This is a precondition failure: nothing has been touched yet.
    pub fn table_dir(&self, keyspace: &str, table: &str) -> StoreResult<PathBuf> {
        let dir = self.data_dir.join(keyspace).join(table);
        if !dir.is_dir() {
            return Err(StoreError::unknown_table(keyspace, table));
        }
        Ok(dir)
    }

    /// Path of the backups subdirectory for a table directory.
    #[must_use]
    pub fn backups_dir(table_dir: &Path) -> PathBuf {
        table_dir.join(BACKUPS_DIR)
    }

    /// Path of a named snapshot under a table directory.
    #[must_use]
    pub fn snapshot_dir(table_dir: &Path, name: &str) -> PathBuf {
        table_dir.join(SNAPSHOTS_DIR).join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn resolves_existing_table() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("ks").join("events");
        fs::create_dir_all(&dir).unwrap();

        let layout = TableLayout::new(temp.path());
        assert_eq!(layout.table_dir("ks", "events").unwrap(), dir);
    }

    #[test]
    fn unknown_table_is_an_error() {
        let temp = tempdir().unwrap();
        let layout = TableLayout::new(temp.path());

        let err = layout.table_dir("ks", "missing").unwrap_err();
        assert!(matches!(err, StoreError::UnknownTable { .. }));
    }

    #[test]
    fn snapshot_and_backup_paths() {
        let table_dir = Path::new("/data/ks/events");
        assert_eq!(
            TableLayout::snapshot_dir(table_dir, "pre-upgrade"),
            PathBuf::from("/data/ks/events/snapshots/pre-upgrade")
        );
        assert_eq!(
            TableLayout::backups_dir(table_dir),
            PathBuf::from("/data/ks/events/backups")
        );
    }
}
