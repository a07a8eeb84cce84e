//! MaxMind DB (MMDB) reader and fixture writer
//!
//! - **types**: record sizes, IP versions, format constants
//! - **format**: metadata marker search and header parsing
//! - **tree**: search tree traversal for IP lookups
//! - **writer**: builds small databases for fixtures and tests
//!
//! Record decoding lives in `crate::data_section`.

pub mod format;
pub mod tree;
pub mod types;
pub mod writer;

pub use format::{find_metadata_marker, read_metadata, MmdbHeader};
pub use tree::{SearchTree, TreeHit};
pub use types::{IpVersion, RecordSize, METADATA_MARKER};
pub use writer::MmdbWriter;
