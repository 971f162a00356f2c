//! Error types for the segment lifecycle engine.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur during segment lifecycle operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Store-level error (directory scan, identity parsing).
    #[error("store error: {0}")]
    Store(#[from] strata_store::StoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A segment's files are corrupted or structurally invalid.
    #[error("segment corruption: {message}")]
    SegmentCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// The requested upgrade target is not a writable format version.
    #[error("conversion to version {version} is not supported")]
    UnsupportedTargetVersion {
        /// The rejected version tag.
        version: String,
    },

    /// Rewriting one segment to the target format failed.
    #[error("conversion of {descriptor} failed: {message}")]
    Conversion {
        /// Identity of the segment that failed.
        descriptor: String,
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a segment corruption error.
    pub fn segment_corruption(message: impl Into<String>) -> Self {
        Self::SegmentCorruption {
            message: message.into(),
        }
    }

    /// Creates an unsupported target version error.
    pub fn unsupported_target_version(version: impl Into<String>) -> Self {
        Self::UnsupportedTargetVersion {
            version: version.into(),
        }
    }

    /// Creates a conversion error.
    pub fn conversion(descriptor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            descriptor: descriptor.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Whether this error aborts a whole upgrade run.
    ///
    /// Only precondition errors do; per-segment errors are contained by the
    /// converter loop and summarized instead.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedTargetVersion { .. } | Self::Store(_)
        )
    }
}
