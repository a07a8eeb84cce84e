//! MMDB type definitions shared by the reader and the writer

/// MMDB metadata marker: "\xAB\xCD\xEFMaxMind.com"
pub const METADATA_MARKER: &[u8] = b"\xAB\xCD\xEFMaxMind.com";

/// Size of the zeroed separator between search tree and data section
pub const DATA_SECTION_SEPARATOR: usize = 16;

/// IP version of the search tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    /// IPv4 only
    V4,
    /// IPv6 (IPv4 lives under ::/96)
    V6,
}

impl IpVersion {
    /// Number of address bits the tree spans
    pub fn bit_count(self) -> u8 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }
}

/// Record size in bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSize {
    /// 24-bit records (6 bytes per node)
    Bits24 = 24,
    /// 28-bit records (7 bytes per node)
    Bits28 = 28,
    /// 32-bit records (8 bytes per node)
    Bits32 = 32,
}

impl RecordSize {
    /// Create from bit size
    pub fn from_bits(bits: u64) -> Option<Self> {
        match bits {
            24 => Some(RecordSize::Bits24),
            28 => Some(RecordSize::Bits28),
            32 => Some(RecordSize::Bits32),
            _ => None,
        }
    }

    /// Smallest record size able to hold `max_value`
    pub fn fitting(max_value: u64) -> Option<Self> {
        if max_value < 1 << 24 {
            Some(RecordSize::Bits24)
        } else if max_value < 1 << 28 {
            Some(RecordSize::Bits28)
        } else if max_value <= u32::MAX as u64 {
            Some(RecordSize::Bits32)
        } else {
            None
        }
    }

    /// Size of a node (2 records) in bytes
    pub fn node_bytes(self) -> usize {
        match self {
            RecordSize::Bits24 => 6,
            RecordSize::Bits28 => 7,
            RecordSize::Bits32 => 8,
        }
    }

    /// Read the left (`side == 0`) or right record of one node
    ///
    /// `node` must be exactly `node_bytes()` long.
    pub fn read_record(self, node: &[u8], side: u8) -> u32 {
        let be = |b: &[u8]| b.iter().fold(0u32, |acc, &x| (acc << 8) | x as u32);
        match (self, side) {
            (RecordSize::Bits24, 0) => be(&node[0..3]),
            (RecordSize::Bits24, _) => be(&node[3..6]),
            // 28-bit layout: [left 24][left high 4 | right high 4][right 24]
            (RecordSize::Bits28, 0) => ((node[3] as u32 & 0xF0) << 20) | be(&node[0..3]),
            (RecordSize::Bits28, _) => ((node[3] as u32 & 0x0F) << 24) | be(&node[4..7]),
            (RecordSize::Bits32, 0) => be(&node[0..4]),
            (RecordSize::Bits32, _) => be(&node[4..8]),
        }
    }

    /// Write both records of one node
    pub fn write_node(self, node: &mut [u8], left: u32, right: u32) {
        match self {
            RecordSize::Bits24 => {
                node[0..3].copy_from_slice(&left.to_be_bytes()[1..]);
                node[3..6].copy_from_slice(&right.to_be_bytes()[1..]);
            }
            RecordSize::Bits28 => {
                node[0..3].copy_from_slice(&left.to_be_bytes()[1..]);
                node[3] = (((left >> 24) & 0x0F) << 4) as u8 | ((right >> 24) & 0x0F) as u8;
                node[4..7].copy_from_slice(&right.to_be_bytes()[1..]);
            }
            RecordSize::Bits32 => {
                node[0..4].copy_from_slice(&left.to_be_bytes());
                node[4..8].copy_from_slice(&right.to_be_bytes());
            }
        }
    }
}
