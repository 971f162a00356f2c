//! Opened segment handles.

use crate::error::{CoreError, CoreResult};
use crate::format::{DataHeader, INDEX_MAGIC};
use parking_lot::Mutex;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strata_store::{Component, ComponentSet, FormatVersion, SegmentDescriptor};
use tracing::debug;

/// An opened, reference-counted view over one segment.
///
/// Cloning a handle shares the underlying open state: the candidate
/// selector, an upgrade scope and the release backstop may each hold a
/// clone of the same handle. In-memory resources (the loaded index
/// summary) are dropped by [`release`](Self::release), which is idempotent:
/// both the commit path and the error-recovery path may call it on the same
/// handle without harm.
#[derive(Debug, Clone)]
pub struct SegmentHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    descriptor: SegmentDescriptor,
    components: ComponentSet,
    recorded_version: FormatVersion,
    /// Index summary loaded at open. Dropped on release.
    summary: Mutex<Option<Vec<u8>>>,
    released: AtomicBool,
    /// Guards the one-open-scope-per-segment invariant.
    scope_open: AtomicBool,
}

impl SegmentHandle {
    /// Opens a segment structurally, without a full consistency scan.
    ///
    /// Reads the Data header (magic, recorded version, header checksum) and
    /// loads the primary index as the in-memory summary. Row payloads are
    /// not touched; that is the expensive validation path and unnecessary
    /// for version inspection.
    ///
    /// # Errors
    ///
    /// [`CoreError::SegmentCorruption`] for bad magic or checksums,
    /// [`CoreError::Io`] if a component file cannot be read.
    pub fn open_no_validation(
        descriptor: SegmentDescriptor,
        components: ComponentSet,
    ) -> CoreResult<Self> {
        let data = fs::read(descriptor.path_for(Component::Data))?;
        let header = DataHeader::decode(&data)?;

        let summary = fs::read(descriptor.path_for(Component::PrimaryIndex))?;
        if summary.len() < INDEX_MAGIC.len() || summary[0..4] != INDEX_MAGIC {
            return Err(CoreError::segment_corruption(format!(
                "bad index magic in {descriptor}"
            )));
        }

        debug!(segment = %descriptor, version = %header.version, "opened segment");

        Ok(Self {
            inner: Arc::new(HandleInner {
                descriptor,
                components,
                recorded_version: header.version,
                summary: Mutex::new(Some(summary)),
                released: AtomicBool::new(false),
                scope_open: AtomicBool::new(false),
            }),
        })
    }

    /// The segment's identity.
    #[must_use]
    pub fn descriptor(&self) -> &SegmentDescriptor {
        &self.inner.descriptor
    }

    /// The component files this handle was opened over.
    #[must_use]
    pub fn components(&self) -> ComponentSet {
        self.inner.components
    }

    /// The format version recorded in the Data header.
    ///
    /// This is authoritative over the version tag in the file name.
    #[must_use]
    pub fn recorded_version(&self) -> FormatVersion {
        self.inner.recorded_version
    }

    /// Releases the handle's in-memory resources.
    ///
    /// Idempotent: releasing an already-released handle is a no-op, never
    /// an error. All clones of this handle observe the release.
    pub fn release(&self) {
        if self.inner.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.summary.lock().take();
        debug!(segment = %self.inner.descriptor, "released segment handle");
    }

    /// Whether [`release`](Self::release) has been called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::Acquire)
    }

    /// Marks this segment as bound to an open upgrade scope.
    ///
    /// At most one scope may be open per segment at a time.
    pub(crate) fn begin_scope(&self) -> CoreResult<()> {
        if self
            .inner
            .scope_open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CoreError::invalid_operation(format!(
                "an upgrade scope is already open for {}",
                self.inner.descriptor
            )));
        }
        Ok(())
    }

    pub(crate) fn end_scope(&self) {
        self.inner.scope_open.store(false, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn summary_loaded(&self) -> bool {
        self.inner.summary.lock().is_some()
    }
}
