//! Lookup providers
//!
//! A provider answers "which raw record matches this IP" once built from
//! database bytes. The context only talks to providers through
//! [`LookupProvider`] and [`ProviderOpener`], so tests can swap in stubs.

use crate::data_section::{DataDecoder, DataValue};
use crate::error::{GeoError, LookupError};
use crate::mmdb::{MmdbHeader, SearchTree};
use memmap2::Mmap;
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

/// Storage for database bytes - either owned or memory-mapped
pub enum DatabaseBytes {
    /// Reassembled from chunks
    Owned(Vec<u8>),
    /// A monolithic file mapped read-only
    Mapped(Mmap),
}

impl DatabaseBytes {
    /// Map a monolithic database file
    pub fn map_file(path: &Path) -> Result<Self, GeoError> {
        let file = File::open(path)
            .map_err(|e| GeoError::Io(format!("Failed to open {}: {}", path.display(), e)))?;
        // SAFETY: the mapping is read-only and database files are replaced
        // by rename, never rewritten in place.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| GeoError::Io(format!("Failed to mmap {}: {}", path.display(), e)))?;
        Ok(DatabaseBytes::Mapped(mmap))
    }

    /// View the bytes
    pub fn as_slice(&self) -> &[u8] {
        match self {
            DatabaseBytes::Owned(v) => v.as_slice(),
            DatabaseBytes::Mapped(m) => &m[..],
        }
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// True when there are no bytes
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DatabaseBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            DatabaseBytes::Owned(_) => "Owned",
            DatabaseBytes::Mapped(_) => "Mapped",
        };
        write!(f, "DatabaseBytes::{}({} bytes)", kind, self.len())
    }
}

/// Answers lookups against one opened database
pub trait LookupProvider: Send + Sync {
    /// Raw record for `ip`, or `None` when the database has no match
    fn lookup(&self, ip: IpAddr) -> Result<Option<DataValue>, LookupError>;
}

/// Builds a provider from database bytes
pub trait ProviderOpener: Send + Sync {
    /// Open a provider over `bytes`
    fn open(&self, bytes: DatabaseBytes) -> Result<Arc<dyn LookupProvider>, GeoError>;
}

impl<F> ProviderOpener for F
where
    F: Fn(DatabaseBytes) -> Result<Arc<dyn LookupProvider>, GeoError> + Send + Sync,
{
    fn open(&self, bytes: DatabaseBytes) -> Result<Arc<dyn LookupProvider>, GeoError> {
        self(bytes)
    }
}

/// Opens [`MmdbProvider`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct MmdbOpener;

impl ProviderOpener for MmdbOpener {
    fn open(&self, bytes: DatabaseBytes) -> Result<Arc<dyn LookupProvider>, GeoError> {
        Ok(Arc::new(MmdbProvider::new(bytes)?))
    }
}

/// MaxMind DB backed provider
#[derive(Debug)]
pub struct MmdbProvider {
    bytes: DatabaseBytes,
    header: MmdbHeader,
}

impl MmdbProvider {
    /// Parse the header and take ownership of the bytes
    pub fn new(bytes: DatabaseBytes) -> Result<Self, GeoError> {
        let header = MmdbHeader::parse(bytes.as_slice())?;
        Ok(Self { bytes, header })
    }

    /// Parsed header
    pub fn header(&self) -> &MmdbHeader {
        &self.header
    }

    /// Look up `ip` and report the matched prefix length as well
    pub fn lookup_with_prefix(&self, ip: IpAddr) -> Result<Option<(DataValue, u8)>, LookupError> {
        let data = self.bytes.as_slice();
        let hit = match SearchTree::new(data, &self.header).lookup(ip)? {
            Some(hit) => hit,
            None => return Ok(None),
        };

        let section = data.get(self.header.data_section_start()..).ok_or_else(|| {
            LookupError::CorruptTree("data section starts beyond end of file".to_string())
        })?;
        let value = DataDecoder::new(section)
            .decode(hit.data_offset)
            .map_err(|e| LookupError::Decode(format!("offset {}: {}", hit.data_offset, e)))?;
        Ok(Some((value, hit.prefix_len)))
    }
}

impl LookupProvider for MmdbProvider {
    fn lookup(&self, ip: IpAddr) -> Result<Option<DataValue>, LookupError> {
        Ok(self.lookup_with_prefix(ip)?.map(|(value, _)| value))
    }
}
