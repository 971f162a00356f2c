//! Error types for the segment store.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while modelling or scanning segment directories.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A table directory could not be listed.
    ///
    /// This is fatal for a scan: if the directory itself is unreadable, no
    /// safe enumeration of segments is possible.
    #[error("cannot read directory {path}: {source}")]
    DirectoryRead {
        /// The directory that failed to list.
        path: PathBuf,
        /// The underlying I/O error.
        source: io::Error,
    },

    /// The requested keyspace/table has no directory under the data root.
    #[error("unknown keyspace/table {keyspace}.{table}")]
    UnknownTable {
        /// Keyspace name.
        keyspace: String,
        /// Table name.
        table: String,
    },

    /// A segment file name did not follow the
    /// `<keyspace>-<table>-<version>-<generation>-<Component>.db` convention.
    #[error("invalid segment file name: {name}")]
    InvalidFileName {
        /// The offending file name.
        name: String,
    },

    /// A format version tag was not two lowercase ASCII letters.
    #[error("invalid format version tag: {tag}")]
    InvalidVersionTag {
        /// The offending tag.
        tag: String,
    },
}

impl StoreError {
    /// Creates a directory read error.
    pub fn directory_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::DirectoryRead {
            path: path.into(),
            source,
        }
    }

    /// Creates an unknown table error.
    pub fn unknown_table(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self::UnknownTable {
            keyspace: keyspace.into(),
            table: table.into(),
        }
    }

    /// Creates an invalid file name error.
    pub fn invalid_file_name(name: impl Into<String>) -> Self {
        Self::InvalidFileName { name: name.into() }
    }

    /// Creates an invalid version tag error.
    pub fn invalid_version_tag(tag: impl Into<String>) -> Self {
        Self::InvalidVersionTag { tag: tag.into() }
    }
}
