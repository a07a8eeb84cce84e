//! MMDB search tree traversal
//!
//! Each node holds two records. A record below `node_count` points at
//! another node, a record equal to `node_count` means "no data", and a
//! record above it points into the data section.

use super::format::MmdbHeader;
use super::types::{IpVersion, DATA_SECTION_SEPARATOR};
use crate::error::LookupError;
use std::net::IpAddr;

/// Result of a tree traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeHit {
    /// Offset into the data section (relative to data section start)
    pub data_offset: usize,
    /// Network prefix length of the matching record
    pub prefix_len: u8,
}

/// Search tree over borrowed database bytes
pub struct SearchTree<'a> {
    data: &'a [u8],
    header: &'a MmdbHeader,
}

impl<'a> SearchTree<'a> {
    /// Create a search tree view
    pub fn new(data: &'a [u8], header: &'a MmdbHeader) -> Self {
        Self { data, header }
    }

    /// Look up an IP address
    ///
    /// IPv6 addresses queried against an IPv4-only tree only match when
    /// they are IPv4-mapped.
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<TreeHit>, LookupError> {
        match (ip, self.header.ip_version) {
            (IpAddr::V4(v4), IpVersion::V4) => self.walk(0, (u32::from(v4) as u128) << 96, 32),
            (IpAddr::V4(v4), IpVersion::V6) => {
                self.walk(self.header.ipv4_start, (u32::from(v4) as u128) << 96, 32)
            }
            (IpAddr::V6(v6), IpVersion::V6) => self.walk(0, u128::from(v6), 128),
            (IpAddr::V6(v6), IpVersion::V4) => match v6.to_ipv4_mapped() {
                Some(v4) => self.lookup(IpAddr::V4(v4)),
                None => Ok(None),
            },
        }
    }

    /// Follow 96 zero bits from the root to find the IPv4 subtree
    pub(crate) fn ipv4_start_node(&self) -> Result<(u32, u8), LookupError> {
        let mut node = 0u32;
        let mut depth = 0u8;
        while depth < 96 && node < self.header.node_count {
            node = self.read_record(node, 0)?;
            depth += 1;
        }
        Ok((node, depth))
    }

    fn walk(&self, start: u32, bits: u128, bit_count: u8) -> Result<Option<TreeHit>, LookupError> {
        let node_count = self.header.node_count;
        let mut node = start;
        let mut depth = 0u8;

        while depth < bit_count && node < node_count {
            let bit = ((bits >> (127 - depth as u32)) & 1) as u8;
            node = self.read_record(node, bit)?;
            depth += 1;
        }

        if node == node_count {
            return Ok(None);
        }
        if node < node_count {
            return Err(LookupError::CorruptTree(format!(
                "Traversal ended on node {} after {} bits",
                node, depth
            )));
        }

        Ok(Some(TreeHit {
            data_offset: self.data_offset(node)?,
            prefix_len: depth,
        }))
    }

    fn read_record(&self, node: u32, side: u8) -> Result<u32, LookupError> {
        let node_bytes = self.header.record_size.node_bytes();
        let start = node as usize * node_bytes;
        let end = start + node_bytes;
        if node >= self.header.node_count || end > self.header.tree_size {
            return Err(LookupError::CorruptTree(format!(
                "Node {} outside tree of {} nodes",
                node, self.header.node_count
            )));
        }
        let raw = self.data.get(start..end).ok_or_else(|| {
            LookupError::CorruptTree(format!("Node {} beyond end of database", node))
        })?;
        Ok(self.header.record_size.read_record(raw, side))
    }

    /// Data pointer = node_count + 16 + offset within the data section
    fn data_offset(&self, record: u32) -> Result<usize, LookupError> {
        (record as usize)
            .checked_sub(self.header.node_count as usize + DATA_SECTION_SEPARATOR)
            .ok_or_else(|| {
                LookupError::CorruptTree(format!(
                    "Record {} points into the data section separator",
                    record
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_section::DataValue;
    use crate::mmdb::types::RecordSize;
    use crate::mmdb::MmdbWriter;

    fn sample(version: IpVersion) -> Vec<u8> {
        let mut writer = MmdbWriter::new(version);
        writer
            .insert_network("1.1.1.0/24", DataValue::string("AU"))
            .unwrap();
        writer
            .insert_network("8.8.8.8/32", DataValue::string("US"))
            .unwrap();
        writer.build().unwrap()
    }

    #[test]
    fn test_ipv4_tree_prefix_lengths() {
        let data = sample(IpVersion::V4);
        let header = MmdbHeader::parse(&data).unwrap();
        let tree = SearchTree::new(&data, &header);

        let hit = tree.lookup("1.1.1.200".parse().unwrap()).unwrap().unwrap();
        assert_eq!(hit.prefix_len, 24);
        let hit = tree.lookup("8.8.8.8".parse().unwrap()).unwrap().unwrap();
        assert_eq!(hit.prefix_len, 32);
        assert_eq!(tree.lookup("8.8.8.9".parse().unwrap()).unwrap(), None);
        assert_eq!(tree.lookup("127.0.0.1".parse().unwrap()).unwrap(), None);
    }

    #[test]
    fn test_ipv4_in_ipv6_tree() {
        let data = sample(IpVersion::V6);
        let header = MmdbHeader::parse(&data).unwrap();
        let tree = SearchTree::new(&data, &header);

        let hit = tree.lookup("1.1.1.1".parse().unwrap()).unwrap().unwrap();
        assert_eq!(hit.prefix_len, 24);
        assert_eq!(tree.lookup("2001:db8::1".parse().unwrap()).unwrap(), None);
    }

    #[test]
    fn test_mapped_ipv6_against_ipv4_tree() {
        let data = sample(IpVersion::V4);
        let header = MmdbHeader::parse(&data).unwrap();
        let tree = SearchTree::new(&data, &header);

        assert!(tree.lookup("::ffff:8.8.8.8".parse().unwrap()).unwrap().is_some());
        assert_eq!(tree.lookup("2001:db8::1".parse().unwrap()).unwrap(), None);
    }

    #[test]
    fn test_data_pointer_into_separator_is_corrupt() {
        let header = MmdbHeader {
            node_count: 100,
            record_size: RecordSize::Bits24,
            ip_version: IpVersion::V4,
            tree_size: 600,
            ipv4_start: 0,
            ipv4_start_depth: 0,
        };
        let tree = SearchTree::new(&[], &header);

        assert_eq!(tree.data_offset(116).unwrap(), 0);
        assert_eq!(tree.data_offset(200).unwrap(), 84);
        assert!(matches!(tree.data_offset(105), Err(LookupError::CorruptTree(_))));
    }

    #[test]
    fn test_truncated_tree_is_corrupt() {
        let header = MmdbHeader {
            node_count: 10,
            record_size: RecordSize::Bits24,
            ip_version: IpVersion::V4,
            tree_size: 60,
            ipv4_start: 0,
            ipv4_start_depth: 0,
        };
        let data = [0u8; 12];
        let tree = SearchTree::new(&data, &header);
        // All-zero records loop on node 0 and run out of address bits
        assert!(matches!(
            tree.lookup("10.0.0.1".parse().unwrap()),
            Err(LookupError::CorruptTree(_))
        ));
    }
}
