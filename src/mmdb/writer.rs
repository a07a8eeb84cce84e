//! Minimal MMDB writer
//!
//! Builds small MaxMind DB files from `network -> value` entries. Used to
//! produce fixture databases; production databases come from upstream.

use super::types::{IpVersion, RecordSize, DATA_SECTION_SEPARATOR, METADATA_MARKER};
use crate::data_section::{DataEncoder, DataValue};
use crate::error::GeoError;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Child pointer of a node under construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Empty,
    Node(u32),
    /// Data offset and the prefix length that produced it
    Data(u32, u8),
}

#[derive(Debug, Clone, Copy)]
struct Node {
    children: [Link; 2],
}

impl Node {
    const EMPTY: Node = Node {
        children: [Link::Empty, Link::Empty],
    };
}

/// MMDB database writer
pub struct MmdbWriter {
    ip_version: IpVersion,
    database_type: String,
    nodes: Vec<Node>,
    data: DataEncoder,
}

impl MmdbWriter {
    /// Create a writer for an IPv4 or IPv6 tree
    pub fn new(ip_version: IpVersion) -> Self {
        Self {
            ip_version,
            database_type: "geoshard-fixture".to_string(),
            nodes: vec![Node::EMPTY],
            data: DataEncoder::new(),
        }
    }

    /// Set the `database_type` metadata field
    pub fn with_database_type(mut self, database_type: impl Into<String>) -> Self {
        self.database_type = database_type.into();
        self
    }

    /// Insert a network in CIDR notation (a bare address means a host route)
    pub fn insert_network(&mut self, network: &str, value: DataValue) -> Result<(), GeoError> {
        let (addr, prefix) = match network.split_once('/') {
            Some((addr, prefix)) => (addr, Some(prefix)),
            None => (network, None),
        };
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| GeoError::InvalidAddress(network.to_string()))?;
        let prefix_len = match prefix {
            Some(p) => p
                .parse::<u8>()
                .map_err(|_| GeoError::InvalidAddress(network.to_string()))?,
            None if addr.is_ipv4() => 32,
            None => 128,
        };
        self.insert(addr, prefix_len, value)
    }

    /// Insert an address with a prefix length
    ///
    /// More specific networks win regardless of insertion order.
    pub fn insert(&mut self, addr: IpAddr, prefix_len: u8, value: DataValue) -> Result<(), GeoError> {
        let (bits, depth) = match (addr, self.ip_version) {
            (IpAddr::V4(v4), version) if prefix_len <= 32 => {
                let bits = (u32::from(v4) as u128) << 96;
                match version {
                    IpVersion::V4 => (bits, prefix_len),
                    // IPv4 lives under ::/96, so shift it to the low 32 bits
                    IpVersion::V6 => (bits >> 96, 96 + prefix_len),
                }
            }
            (IpAddr::V6(v6), IpVersion::V6) if prefix_len <= 128 => (u128::from(v6), prefix_len),
            (IpAddr::V6(_), IpVersion::V4) => {
                return Err(GeoError::InvalidAddress(format!(
                    "Cannot insert IPv6 address {} into IPv4 tree",
                    addr
                )))
            }
            _ => {
                return Err(GeoError::InvalidAddress(format!(
                    "Prefix length {} out of range for {}",
                    prefix_len, addr
                )))
            }
        };
        if depth == 0 {
            return Err(GeoError::InvalidAddress(
                "Zero-length prefixes are not supported".to_string(),
            ));
        }

        let offset = self.data.encode(&value);
        self.insert_bits(bits, depth, offset);
        Ok(())
    }

    fn insert_bits(&mut self, bits: u128, depth: u8, offset: u32) {
        let mut node = 0usize;
        for level in 0..depth {
            let bit = ((bits >> (127 - level as u32)) & 1) as usize;
            let link = self.nodes[node].children[bit];

            if level + 1 == depth {
                match link {
                    Link::Node(child) => self.backfill(child as usize, offset, depth),
                    Link::Data(_, existing) if existing > depth => {}
                    _ => self.nodes[node].children[bit] = Link::Data(offset, depth),
                }
                return;
            }

            node = match link {
                Link::Node(child) => child as usize,
                Link::Empty => self.push_node(node, bit, Node::EMPTY),
                // Split a less specific leaf so both halves keep its data
                Link::Data(..) => self.push_node(node, bit, Node { children: [link, link] }),
            };
        }
    }

    fn push_node(&mut self, parent: usize, bit: usize, node: Node) -> usize {
        let id = self.nodes.len();
        self.nodes.push(node);
        self.nodes[parent].children[bit] = Link::Node(id as u32);
        id
    }

    /// Fill gaps below `node` with a less specific network's data
    fn backfill(&mut self, node: usize, offset: u32, prefix_len: u8) {
        for bit in 0..2 {
            match self.nodes[node].children[bit] {
                Link::Empty => self.nodes[node].children[bit] = Link::Data(offset, prefix_len),
                Link::Data(_, existing) if prefix_len > existing => {
                    self.nodes[node].children[bit] = Link::Data(offset, prefix_len)
                }
                Link::Data(..) => {}
                Link::Node(child) => self.backfill(child as usize, offset, prefix_len),
            }
        }
    }

    /// Serialize tree, data section and metadata
    pub fn build(&self) -> Result<Vec<u8>, GeoError> {
        let node_count = self.nodes.len() as u32;
        let data_base = node_count as u64 + DATA_SECTION_SEPARATOR as u64;
        let max_record = data_base + self.data.size() as u64;
        let record_size = RecordSize::fitting(max_record)
            .ok_or_else(|| GeoError::Mmdb("Database too large for 32-bit records".to_string()))?;

        let record_value = |link: Link| -> u32 {
            match link {
                Link::Empty => node_count,
                Link::Node(id) => id,
                Link::Data(offset, _) => (data_base + offset as u64) as u32,
            }
        };

        let node_bytes = record_size.node_bytes();
        let mut out = vec![0u8; self.nodes.len() * node_bytes];
        for (i, node) in self.nodes.iter().enumerate() {
            record_size.write_node(
                &mut out[i * node_bytes..(i + 1) * node_bytes],
                record_value(node.children[0]),
                record_value(node.children[1]),
            );
        }

        out.extend_from_slice(&[0u8; DATA_SECTION_SEPARATOR]);
        out.extend_from_slice(self.data.as_bytes());
        out.extend_from_slice(METADATA_MARKER);
        out.extend_from_slice(&self.metadata(node_count, record_size).into_bytes());
        Ok(out)
    }

    fn metadata(&self, node_count: u32, record_size: RecordSize) -> DataEncoder {
        let build_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut description = HashMap::new();
        description.insert(
            "en".to_string(),
            DataValue::string("geoshard fixture database"),
        );

        let metadata = DataValue::map([
            ("binary_format_major_version", DataValue::Uint16(2)),
            ("binary_format_minor_version", DataValue::Uint16(0)),
            ("build_epoch", DataValue::Uint64(build_epoch)),
            ("database_type", DataValue::string(self.database_type.clone())),
            ("description", DataValue::Map(description)),
            (
                "ip_version",
                DataValue::Uint16(match self.ip_version {
                    IpVersion::V4 => 4,
                    IpVersion::V6 => 6,
                }),
            ),
            ("languages", DataValue::Array(vec![DataValue::string("en")])),
            ("node_count", DataValue::Uint32(node_count)),
            ("record_size", DataValue::Uint16(record_size as u16)),
        ]);

        let mut encoder = DataEncoder::new();
        encoder.encode(&metadata);
        encoder
    }
}
