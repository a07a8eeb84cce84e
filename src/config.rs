//! Runtime configuration
//!
//! Every field has a default, so an empty JSON object is a valid config:
//!
//! ```json
//! {
//!   "db_root": "/srv/geo",
//!   "chunked_format": "nested",
//!   "cache_capacity": 50000
//! }
//! ```

use crate::error::GeoError;
use crate::manifest::MANIFEST_FILE;
use crate::record::RecordFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default number of memoized resolutions
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// A monolithic database file the selector looks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonolithicCandidate {
    /// File name relative to the database root
    pub file_name: String,
    /// Record shape stored in the file
    pub format: RecordFormat,
}

impl MonolithicCandidate {
    /// Create a candidate
    pub fn new(file_name: impl Into<String>, format: RecordFormat) -> Self {
        Self {
            file_name: file_name.into(),
            format,
        }
    }
}

/// Library configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeoConfig {
    /// Directory holding the databases
    pub db_root: PathBuf,
    /// Chunk directory name under `db_root`
    pub chunks_dir: String,
    /// Manifest file name inside the chunk directory
    pub manifest_name: String,
    /// Record shape of the chunked database
    pub chunked_format: RecordFormat,
    /// Monolithic files in priority order
    pub monolithic: Vec<MonolithicCandidate>,
    /// Resolution cache capacity; 0 disables caching
    pub cache_capacity: usize,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            db_root: PathBuf::from("data"),
            chunks_dir: "chunks".to_string(),
            manifest_name: MANIFEST_FILE.to_string(),
            chunked_format: RecordFormat::Flat,
            monolithic: vec![
                MonolithicCandidate::new("ip-country.mmdb", RecordFormat::Flat),
                MonolithicCandidate::new("ip-country-lite.mmdb", RecordFormat::Flat),
                MonolithicCandidate::new("GeoLite2-City.mmdb", RecordFormat::Nested),
            ],
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl GeoConfig {
    /// Load a JSON config file
    pub fn from_file(path: &Path) -> Result<Self, GeoError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| GeoError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Parse config JSON
    pub fn from_json(text: &str) -> Result<Self, GeoError> {
        let config: GeoConfig =
            serde_json::from_str(text).map_err(|e| GeoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject names that would escape the database root
    pub fn validate(&self) -> Result<(), GeoError> {
        let names = std::iter::once(self.chunks_dir.as_str())
            .chain(std::iter::once(self.manifest_name.as_str()))
            .chain(self.monolithic.iter().map(|c| c.file_name.as_str()));
        for name in names {
            if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
                return Err(GeoError::Config(format!("invalid file name: {:?}", name)));
            }
        }
        Ok(())
    }

    /// Set the database root
    pub fn with_db_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.db_root = root.into();
        self
    }

    /// Set the chunk directory name
    pub fn with_chunks_dir(mut self, name: impl Into<String>) -> Self {
        self.chunks_dir = name.into();
        self
    }

    /// Set the manifest file name
    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    /// Set the chunked database's record shape
    pub fn with_chunked_format(mut self, format: RecordFormat) -> Self {
        self.chunked_format = format;
        self
    }

    /// Replace the monolithic candidate list
    pub fn with_monolithic(mut self, candidates: Vec<MonolithicCandidate>) -> Self {
        self.monolithic = candidates;
        self
    }

    /// Set the cache capacity
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Full path of the chunk directory
    pub fn chunks_path(&self) -> PathBuf {
        self.db_root.join(&self.chunks_dir)
    }

    /// Full path of the manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.chunks_path().join(&self.manifest_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GeoConfig::default();
        assert_eq!(config.cache_capacity, 10_000);
        assert_eq!(config.manifest_path(), PathBuf::from("data/chunks/metadata.json"));
        let names: Vec<&str> = config.monolithic.iter().map(|c| c.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["ip-country.mmdb", "ip-country-lite.mmdb", "GeoLite2-City.mmdb"]
        );
        assert_eq!(config.monolithic[2].format, RecordFormat::Nested);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            GeoConfig::from_json(r#"{"db_root":"/srv/geo","chunked_format":"nested"}"#).unwrap();
        assert_eq!(config.db_root, PathBuf::from("/srv/geo"));
        assert_eq!(config.chunked_format, RecordFormat::Nested);
        assert_eq!(config.chunks_dir, "chunks");
        assert_eq!(config.monolithic.len(), 3);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            GeoConfig::from_json(r#"{"cache_size":5}"#),
            Err(GeoError::Config(_))
        ));
    }

    #[test]
    fn test_traversal_rejected() {
        let err = GeoConfig::from_json(r#"{"chunks_dir":"../elsewhere"}"#).unwrap_err();
        assert!(matches!(err, GeoError::Config(ref m) if m.contains("elsewhere")));
    }

    #[test]
    fn test_builder() {
        let config = GeoConfig::default()
            .with_db_root("/tmp/x")
            .with_chunks_dir("parts")
            .with_manifest_name("index.json")
            .with_cache_capacity(0);
        assert_eq!(config.manifest_path(), PathBuf::from("/tmp/x/parts/index.json"));
        assert_eq!(config.cache_capacity, 0);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo.json");
        std::fs::write(&path, r#"{"cache_capacity": 42}"#).unwrap();
        assert_eq!(GeoConfig::from_file(&path).unwrap().cache_capacity, 42);
        assert!(GeoConfig::from_file(&dir.path().join("missing.json")).is_err());
    }
}
