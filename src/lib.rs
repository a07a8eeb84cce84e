//! Geoshard - IP to Country Resolution over Chunked GeoIP Databases
//!
//! Geoshard answers "which country is this IP address in" from a MaxMind DB
//! (MMDB) file. The database can be shipped whole, or split into
//! gzip-compressed chunks plus a `metadata.json` manifest for platforms that
//! cap individual file sizes. Chunks are reassembled in memory, verified
//! byte-for-byte against the manifest, and then served exactly like a
//! monolithic file.
//!
//! # Quick Start
//!
//! ```rust
//! use geoshard::{DataValue, GeoConfig, GeoContext, IpResolver, IpVersion, MmdbWriter};
//!
//! // Build a tiny "country" database
//! let mut writer = MmdbWriter::new(IpVersion::V6);
//! writer.insert_network(
//!     "8.8.8.0/24",
//!     DataValue::map([("country_code", DataValue::string("US"))]),
//! )?;
//! let dir = tempfile::tempdir()?;
//! std::fs::write(dir.path().join("ip-country.mmdb"), writer.build()?)?;
//!
//! // Resolve against it
//! let ctx = GeoContext::new(GeoConfig::default().with_db_root(dir.path()));
//! let resolver = IpResolver::new(ctx);
//! assert_eq!(resolver.resolve_country("8.8.8.8").unwrap(), "US");
//! assert_eq!(resolver.resolve_country("203.0.113.1"), None);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Chunked databases
//!
//! A chunked database must be preloaded before blocking lookups can use it:
//!
//! ```rust,no_run
//! use geoshard::{preload, GeoConfig, GeoContext, IpResolver};
//!
//! # async fn run() {
//! let ctx = GeoContext::new(GeoConfig::default().with_db_root("/srv/geo"));
//! preload(&ctx).await;
//!
//! let resolver = IpResolver::new(ctx);
//! let country = resolver.resolve_country("1.1.1.1");
//! # }
//! ```
//!
//! # Layout
//!
//! ```text
//! <db_root>/
//! ├── chunks/
//! │   ├── metadata.json      manifest (preferred when present)
//! │   ├── chunk_000.gz
//! │   └── chunk_001.gz
//! ├── ip-country.mmdb        flat records
//! ├── ip-country-lite.mmdb   flat records
//! └── GeoLite2-City.mmdb     nested records
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Resolution cache with FIFO eviction
pub mod cache;
/// Runtime configuration
pub mod config;
/// Shared lookup context and single-flight loading
pub mod context;
/// MMDB data section encoding/decoding
pub mod data_section;
/// Error types
pub mod error;
/// Chunk reassembly
pub mod loader;
/// Chunk manifest
pub mod manifest;
/// MMDB format implementation
pub mod mmdb;
/// Startup preloading
pub mod preload;
/// Lookup providers
pub mod provider;
/// Record formats and country codes
pub mod record;
/// IP to country resolution
pub mod resolver;
/// Database selection
pub mod selector;
/// Offline database splitter
pub mod splitter;

pub use crate::cache::{CacheStats, ResolutionCache};
pub use crate::config::{GeoConfig, MonolithicCandidate};
pub use crate::context::{GeoContext, LoadedDatabase};
pub use crate::data_section::DataValue;
pub use crate::error::{GeoError, LookupError, Result};
pub use crate::loader::{ChunkLoader, LoadStatsSnapshot};
pub use crate::manifest::{ChunkEntry, Manifest};
pub use crate::mmdb::{IpVersion, MmdbWriter};
pub use crate::preload::{preload, spawn_preload};
pub use crate::provider::{DatabaseBytes, LookupProvider, MmdbOpener, MmdbProvider, ProviderOpener};
pub use crate::record::{CountryCode, RecordFormat, Resolution};
pub use crate::resolver::IpResolver;
pub use crate::selector::{DatabaseKind, DatabaseSelector, Selection};
pub use crate::splitter::{split_bytes, split_file};

// Version information
/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
