//! Segment component kinds and component sets.

use std::fmt;

/// A role-typed file belonging to a segment.
///
/// Every segment must have [`Component::Data`] and
/// [`Component::PrimaryIndex`]; the rest are optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Component {
    /// Row payload.
    Data,
    /// Primary index over the data file.
    PrimaryIndex,
    /// Bloom filter.
    Filter,
    /// Statistics and metadata.
    Statistics,
    /// Compression block offsets.
    CompressionInfo,
    /// Sampled index summary.
    Summary,
}

/// All components, in bit order.
const ALL_COMPONENTS: [Component; 6] = [
    Component::Data,
    Component::PrimaryIndex,
    Component::Filter,
    Component::Statistics,
    Component::CompressionInfo,
    Component::Summary,
];

impl Component {
    /// The file name suffix for this component (e.g. `Data.db`).
    #[must_use]
    pub const fn file_suffix(self) -> &'static str {
        match self {
            Component::Data => "Data.db",
            Component::PrimaryIndex => "Index.db",
            Component::Filter => "Filter.db",
            Component::Statistics => "Statistics.db",
            Component::CompressionInfo => "CompressionInfo.db",
            Component::Summary => "Summary.db",
        }
    }

    /// Resolves a file name suffix back to a component.
    #[must_use]
    pub fn from_file_suffix(suffix: &str) -> Option<Self> {
        ALL_COMPONENTS.into_iter().find(|c| c.file_suffix() == suffix)
    }

    const fn bit(self) -> u8 {
        match self {
            Component::Data => 0x01,
            Component::PrimaryIndex => 0x02,
            Component::Filter => 0x04,
            Component::Statistics => 0x08,
            Component::CompressionInfo => 0x10,
            Component::Summary => 0x20,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_suffix())
    }
}

/// The set of components present for one segment, as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComponentSet(u8);

impl ComponentSet {
    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Builds a set from a slice of components.
    #[must_use]
    pub fn of(components: &[Component]) -> Self {
        let mut set = Self::empty();
        for &c in components {
            set.insert(c);
        }
        set
    }

    /// Adds a component to the set.
    pub fn insert(&mut self, component: Component) {
        self.0 |= component.bit();
    }

    /// Whether the set contains a component.
    #[must_use]
    pub const fn contains(self, component: Component) -> bool {
        self.0 & component.bit() != 0
    }

    /// Number of components present.
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Whether the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether this set describes a loadable segment.
    ///
    /// A segment missing its data file or primary index cannot be opened
    /// and must be skipped by discovery.
    #[must_use]
    pub const fn is_loadable(self) -> bool {
        self.contains(Component::Data) && self.contains(Component::PrimaryIndex)
    }

    /// Iterates over the components present, in bit order.
    pub fn iter(self) -> impl Iterator<Item = Component> {
        ALL_COMPONENTS.into_iter().filter(move |c| self.contains(*c))
    }
}
