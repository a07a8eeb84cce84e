//! MMDB binary format parsing
//!
//! Only the fields needed for lookups are pulled out of the metadata map;
//! the rest stays in the database bytes and is decoded on demand.

use super::tree::SearchTree;
use super::types::{IpVersion, RecordSize, DATA_SECTION_SEPARATOR, METADATA_MARKER};
use crate::data_section::{DataDecoder, DataValue};
use crate::error::GeoError;

/// The marker lives somewhere in the last 128KB of the file
const METADATA_SEARCH_WINDOW: usize = 128 * 1024;

/// MMDB file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmdbHeader {
    /// Number of nodes in the search tree
    pub node_count: u32,
    /// Record size in bits (24, 28, or 32)
    pub record_size: RecordSize,
    /// IP version (4 or 6)
    pub ip_version: IpVersion,
    /// Size of the search tree in bytes
    pub tree_size: usize,
    /// Node where IPv4 lookups start (after 96 zero bits in an IPv6 tree)
    pub ipv4_start: u32,
    /// Bits already consumed when reaching `ipv4_start`
    pub ipv4_start_depth: u8,
}

impl MmdbHeader {
    /// Parse the metadata section and locate the IPv4 subtree
    pub fn parse(data: &[u8]) -> Result<Self, GeoError> {
        let metadata = read_metadata(data)?;

        let field = |key: &str| {
            metadata.get(key).and_then(DataValue::as_u64).ok_or_else(|| {
                GeoError::Mmdb(format!("Required metadata field '{}' missing or not unsigned", key))
            })
        };

        let node_count = u32::try_from(field("node_count")?)
            .map_err(|_| GeoError::Mmdb("node_count exceeds 32 bits".to_string()))?;
        let record_bits = field("record_size")?;
        let record_size = RecordSize::from_bits(record_bits)
            .ok_or_else(|| GeoError::Mmdb(format!("Invalid record size: {} bits", record_bits)))?;
        let ip_version = match field("ip_version")? {
            4 => IpVersion::V4,
            6 => IpVersion::V6,
            other => return Err(GeoError::Mmdb(format!("Invalid IP version: {}", other))),
        };

        let tree_size = node_count as usize * record_size.node_bytes();
        if tree_size + DATA_SECTION_SEPARATOR > data.len() {
            return Err(GeoError::Mmdb(format!(
                "Search tree ({} bytes) extends beyond file ({} bytes)",
                tree_size,
                data.len()
            )));
        }

        let mut header = MmdbHeader {
            node_count,
            record_size,
            ip_version,
            tree_size,
            ipv4_start: 0,
            ipv4_start_depth: 0,
        };

        if ip_version == IpVersion::V6 {
            let (node, depth) = SearchTree::new(data, &header)
                .ipv4_start_node()
                .map_err(|e| GeoError::Mmdb(e.to_string()))?;
            header.ipv4_start = node;
            header.ipv4_start_depth = depth;
        }

        Ok(header)
    }

    /// Offset of the data section within the file
    pub fn data_section_start(&self) -> usize {
        self.tree_size + DATA_SECTION_SEPARATOR
    }
}

/// Decode the full metadata map
pub fn read_metadata(data: &[u8]) -> Result<DataValue, GeoError> {
    let marker = find_metadata_marker(data)
        .ok_or_else(|| GeoError::Mmdb("MMDB metadata marker not found".to_string()))?;
    let metadata_bytes = &data[marker + METADATA_MARKER.len()..];

    let value = DataDecoder::new(metadata_bytes)
        .decode(0)
        .map_err(|e| GeoError::Mmdb(format!("Failed to decode metadata: {}", e)))?;

    match value {
        DataValue::Map(_) => Ok(value),
        _ => Err(GeoError::Mmdb("Metadata is not a map".to_string())),
    }
}

/// Find the last metadata marker within the trailing search window
pub fn find_metadata_marker(data: &[u8]) -> Option<usize> {
    if data.len() < METADATA_MARKER.len() {
        return None;
    }
    let search_start = data.len().saturating_sub(METADATA_SEARCH_WINDOW);
    data[search_start..]
        .windows(METADATA_MARKER.len())
        .rposition(|window| window == METADATA_MARKER)
        .map(|pos| search_start + pos)
}
