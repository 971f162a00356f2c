//! Segment identity and file naming.

use crate::component::Component;
use crate::error::{StoreError, StoreResult};
use crate::version::FormatVersion;
use std::fmt;
use std::path::{Path, PathBuf};

/// Immutable identity of one on-disk segment.
///
/// Component files for a segment are named
/// `<keyspace>-<table>-<version>-<generation>-<Component>.db`, so keyspace
/// and table names must not contain `-`. Two descriptors are equal iff all
/// fields match; descriptors are used as map keys by the directory scanner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentDescriptor {
    /// Keyspace the table belongs to.
    pub keyspace: String,
    /// Table name.
    pub table: String,
    /// Generation number distinguishing segments created at different times.
    pub generation: u64,
    /// On-disk format version tag.
    pub version: FormatVersion,
    /// Directory the component files live in.
    pub directory: PathBuf,
}

impl SegmentDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(
        keyspace: impl Into<String>,
        table: impl Into<String>,
        version: FormatVersion,
        generation: u64,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
            generation,
            version,
            directory: directory.into(),
        }
    }

    /// The same identity at a different format version.
    ///
    /// An upgraded segment keeps its generation; only the version tag in
    /// its file names changes.
    #[must_use]
    pub fn with_version(&self, version: FormatVersion) -> Self {
        Self {
            version,
            ..self.clone()
        }
    }

    /// File name for one component of this segment.
    #[must_use]
    pub fn filename_for(&self, component: Component) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.keyspace,
            self.table,
            self.version,
            self.generation,
            component.file_suffix()
        )
    }

    /// Full path for one component of this segment.
    #[must_use]
    pub fn path_for(&self, component: Component) -> PathBuf {
        self.directory.join(self.filename_for(component))
    }

    /// Parses a segment file name into its descriptor and component.
    pub fn parse(directory: &Path, file_name: &str) -> StoreResult<(Self, Component)> {
        let parts: Vec<&str> = file_name.splitn(5, '-').collect();
        if parts.len() != 5 {
            return Err(StoreError::invalid_file_name(file_name));
        }
        let (keyspace, table, version, generation, suffix) =
            (parts[0], parts[1], parts[2], parts[3], parts[4]);

        if keyspace.is_empty() || table.is_empty() {
            return Err(StoreError::invalid_file_name(file_name));
        }

        let version = FormatVersion::parse(version)
            .map_err(|_| StoreError::invalid_file_name(file_name))?;
        let generation: u64 = generation
            .parse()
            .map_err(|_| StoreError::invalid_file_name(file_name))?;
        let component = Component::from_file_suffix(suffix)
            .ok_or_else(|| StoreError::invalid_file_name(file_name))?;

        Ok((
            Self::new(keyspace, table, version, generation, directory),
            component,
        ))
    }
}

impl fmt::Display for SegmentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} gen {} ({})",
            self.keyspace, self.table, self.generation, self.version
        )
    }
}
