//! Segment component file formats.
//!
//! The Data component starts with a fixed header:
//!
//! ```text
//! | magic "SSEG" (4) | version tag (2) | generation (8) | header crc32 (4) |
//! ```
//!
//! followed by length-prefixed row payloads. The primary index file starts
//! with magic `"SIDX"` followed by one little-endian u64 data offset per
//! row. Row payloads are opaque to the upgrade engine; only the header is
//! interpreted.

use crate::error::{CoreError, CoreResult};
use std::fs::{self, File};
use std::io::Write;
use strata_store::{Component, ComponentSet, FormatVersion, SegmentDescriptor};

/// Magic bytes opening every Data component.
pub const DATA_MAGIC: [u8; 4] = *b"SSEG";
/// Magic bytes opening every primary index component.
pub const INDEX_MAGIC: [u8; 4] = *b"SIDX";
/// Total Data header length: magic (4) + version (2) + generation (8) + crc (4).
pub const DATA_HEADER_LEN: usize = 18;

/// Computes a CRC32 (IEEE polynomial) over `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    crc ^ 0xFFFF_FFFF
}

/// The decoded header of a Data component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataHeader {
    /// The format version the file's bytes conform to.
    pub version: FormatVersion,
    /// Generation recorded at write time.
    pub generation: u64,
}

impl DataHeader {
    /// Creates a header.
    #[must_use]
    pub fn new(version: FormatVersion, generation: u64) -> Self {
        Self {
            version,
            generation,
        }
    }

    /// Encodes the header to its on-disk form.
    #[must_use]
    pub fn encode(&self) -> [u8; DATA_HEADER_LEN] {
        let mut buf = [0u8; DATA_HEADER_LEN];
        buf[0..4].copy_from_slice(&DATA_MAGIC);
        buf[4..6].copy_from_slice(&self.version.as_bytes());
        buf[6..14].copy_from_slice(&self.generation.to_le_bytes());
        let crc = compute_crc32(&buf[0..14]);
        buf[14..18].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decodes a header from the start of a Data file.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < DATA_HEADER_LEN {
            return Err(CoreError::segment_corruption("data file shorter than header"));
        }
        if data[0..4] != DATA_MAGIC {
            return Err(CoreError::segment_corruption("bad data file magic"));
        }

        let stored_crc = u32::from_le_bytes([data[14], data[15], data[16], data[17]]);
        let computed = compute_crc32(&data[0..14]);
        if stored_crc != computed {
            return Err(CoreError::segment_corruption(format!(
                "data header checksum mismatch: expected {stored_crc:08x}, got {computed:08x}"
            )));
        }

        let version = FormatVersion::from_bytes([data[4], data[5]])
            .map_err(|_| CoreError::segment_corruption("bad version tag in data header"))?;
        let generation = u64::from_le_bytes([
            data[6], data[7], data[8], data[9], data[10], data[11], data[12], data[13],
        ]);

        Ok(Self {
            version,
            generation,
        })
    }
}

/// Writes a complete segment for a descriptor.
///
/// This is the flush path the engine uses when sealing a memtable; the
/// upgrade tests use it to materialize fixture segments.
#[derive(Debug)]
pub struct SegmentBuilder {
    descriptor: SegmentDescriptor,
    rows: Vec<Vec<u8>>,
    with_statistics: bool,
}

impl SegmentBuilder {
    /// Creates a builder for one segment identity.
    #[must_use]
    pub fn new(descriptor: SegmentDescriptor) -> Self {
        Self {
            descriptor,
            rows: Vec::new(),
            with_statistics: true,
        }
    }

    /// Appends a row payload.
    pub fn add_row(&mut self, payload: &[u8]) -> &mut Self {
        self.rows.push(payload.to_vec());
        self
    }

    /// Skips writing the Statistics component.
    pub fn without_statistics(&mut self) -> &mut Self {
        self.with_statistics = false;
        self
    }

    /// Writes the component files and returns the set written.
    pub fn finish(&self) -> CoreResult<ComponentSet> {
        let header = DataHeader::new(self.descriptor.version, self.descriptor.generation);

        let mut data = Vec::with_capacity(DATA_HEADER_LEN);
        data.extend_from_slice(&header.encode());
        let mut offsets = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            offsets.push(data.len() as u64);
            data.extend_from_slice(&(row.len() as u32).to_le_bytes());
            data.extend_from_slice(row);
        }

        let mut index = Vec::with_capacity(4 + offsets.len() * 8);
        index.extend_from_slice(&INDEX_MAGIC);
        for offset in &offsets {
            index.extend_from_slice(&offset.to_le_bytes());
        }

        let mut components = ComponentSet::empty();
        write_file(&self.descriptor.path_for(Component::Data), &data)?;
        components.insert(Component::Data);
        write_file(&self.descriptor.path_for(Component::PrimaryIndex), &index)?;
        components.insert(Component::PrimaryIndex);

        if self.with_statistics {
            let stats = (self.rows.len() as u64).to_le_bytes();
            write_file(&self.descriptor.path_for(Component::Statistics), &stats)?;
            components.insert(Component::Statistics);
        }

        Ok(components)
    }
}

fn write_file(path: &std::path::Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}
