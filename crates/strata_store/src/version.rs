//! On-disk format version tags.

use crate::error::{StoreError, StoreResult};
use std::fmt;
use std::str::FromStr;

/// A segment format version tag: two lowercase ASCII letters.
///
/// Tags order lexicographically, so a newer format always compares greater
/// than an older one (`"la" < "ma"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormatVersion([u8; 2]);

/// Every version this build can read.
const KNOWN_VERSIONS: [FormatVersion; 5] = [
    FormatVersion(*b"ja"),
    FormatVersion(*b"jb"),
    FormatVersion(*b"ka"),
    FormatVersion(*b"la"),
    FormatVersion(*b"ma"),
];

/// Versions this build can write. Upgrades may only target these.
const WRITABLE_VERSIONS: [FormatVersion; 2] = [FormatVersion(*b"la"), FormatVersion(*b"ma")];

impl FormatVersion {
    /// The newest format version this build knows about.
    #[must_use]
    pub const fn latest() -> Self {
        Self(*b"ma")
    }

    /// Parses a two-letter version tag.
    pub fn parse(tag: &str) -> StoreResult<Self> {
        let bytes = tag.as_bytes();
        if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_lowercase) {
            return Err(StoreError::invalid_version_tag(tag));
        }
        Ok(Self([bytes[0], bytes[1]]))
    }

    /// Whether this build can read segments at this version.
    #[must_use]
    pub fn is_known(self) -> bool {
        KNOWN_VERSIONS.contains(&self)
    }

    /// Whether this build can write segments at this version.
    ///
    /// Consulted by the upgrade version gate before any work starts.
    #[must_use]
    pub fn is_writable(self) -> bool {
        WRITABLE_VERSIONS.contains(&self)
    }

    /// Whether this is the latest known version.
    #[must_use]
    pub fn is_latest(self) -> bool {
        self == Self::latest()
    }

    /// Raw tag bytes, for embedding in file headers.
    #[must_use]
    pub const fn as_bytes(self) -> [u8; 2] {
        self.0
    }

    /// Reconstructs a version from raw header bytes.
    pub fn from_bytes(bytes: [u8; 2]) -> StoreResult<Self> {
        if !bytes.iter().all(u8::is_ascii_lowercase) {
            return Err(StoreError::invalid_version_tag(format!(
                "{:02x}{:02x}",
                bytes[0], bytes[1]
            )));
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

impl FromStr for FormatVersion {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
