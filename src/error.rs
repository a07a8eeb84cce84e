//! Error types for the geoshard library

use std::path::PathBuf;

/// Result type alias for geoshard operations
pub type Result<T> = std::result::Result<T, GeoError>;

/// Main error type for loading and resolving
///
/// Errors are `Clone` because the outcome of a single in-flight load is
/// handed to every caller waiting on it. I/O errors are therefore kept as
/// rendered messages rather than `std::io::Error` values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeoError {
    /// No recognized database exists at any candidate location
    #[error("No database found under {}", root.display())]
    NoDatabase {
        /// Root directory that was searched
        root: PathBuf,
    },

    /// The chunk manifest is missing
    #[error("Manifest not found: {}", path.display())]
    ManifestNotFound {
        /// Expected manifest path
        path: PathBuf,
    },

    /// The chunk manifest is present but violates its invariants
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    /// A chunk listed in the manifest is missing
    #[error("Chunk {index} not found: {}", path.display())]
    ChunkNotFound {
        /// Manifest index of the chunk
        index: usize,
        /// Expected chunk path
        path: PathBuf,
    },

    /// A chunk decompressed to a different length than recorded
    #[error("Integrity error in chunk {index}: expected {expected} bytes, got {actual}")]
    Integrity {
        /// Manifest index of the chunk
        index: usize,
        /// `originalSize` from the manifest
        expected: u64,
        /// Observed decompressed length
        actual: u64,
    },

    /// A chunk is not a valid gzip stream
    #[error("Failed to decompress chunk {index}: {message}")]
    Decompress {
        /// Manifest index of the chunk
        index: usize,
        /// Decoder error message
        message: String,
    },

    /// The reassembly buffer could not be allocated
    #[error("Cannot allocate {bytes} bytes for the reassembled database")]
    Allocation {
        /// Requested size
        bytes: u64,
    },

    /// The load task panicked; the message is the panic payload when it is text
    #[error("Database load panicked: {0}")]
    LoadPanicked(String),

    /// Blocking lookup against a chunked database that was never preloaded
    #[error("Chunked database has not been preloaded; call preload() before blocking lookups")]
    NotPreloaded,

    /// The provider failed while answering a single lookup
    #[error("Lookup failed: {0}")]
    Lookup(#[from] LookupError),

    /// The query is not a textual IPv4 or IPv6 address
    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    /// The database bytes are not a readable MMDB file
    #[error("MMDB format error: {0}")]
    Mmdb(String),

    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for GeoError {
    fn from(err: std::io::Error) -> Self {
        GeoError::Io(err.to_string())
    }
}

/// Provider-level failure for a single lookup
///
/// Always absorbed into a "no country" result by the resolver; kept as a
/// distinct type so operators can still see what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// The search tree is malformed
    #[error("corrupt search tree: {0}")]
    CorruptTree(String),

    /// The record at the resolved offset could not be decoded
    #[error("record decode failed: {0}")]
    Decode(String),

    /// Any other provider failure
    #[error("{0}")]
    Other(String),
}
