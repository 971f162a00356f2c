//! # Strata Store
//!
//! On-disk segment model for StrataDB tables.
//!
//! A table's data lives in a directory of immutable **segments**. Each
//! segment is a group of component files sharing one identity:
//!
//! ```text
//! <data_dir>/<keyspace>/<table>/
//! ├─ ks-events-la-1-Data.db        # row payload
//! ├─ ks-events-la-1-Index.db       # primary index
//! ├─ ks-events-la-1-Statistics.db  # stats metadata
//! ├─ backups/                      # never scanned in live mode
//! └─ snapshots/<name>/             # scanned only in snapshot mode
//! ```
//!
//! This crate provides the identity model ([`SegmentDescriptor`],
//! [`Component`], [`ComponentSet`], [`FormatVersion`]), table directory
//! resolution ([`TableLayout`]) and the directory scanner
//! ([`SegmentLister`]). It never opens file contents; that is the job of
//! `strata_core`.

mod component;
mod descriptor;
mod error;
mod layout;
mod lister;
mod version;

pub use component::{Component, ComponentSet};
pub use descriptor::SegmentDescriptor;
pub use error::{StoreError, StoreResult};
pub use layout::TableLayout;
pub use lister::{ListMode, SegmentLister};
pub use version::FormatVersion;
