//! Chunk manifest (`metadata.json`)
//!
//! Describes how one original database file was split into independently
//! gzip-compressed chunks:
//!
//! ```json
//! {
//!   "originalFile": "ip-country.mmdb",
//!   "totalSize": 1500000,
//!   "chunkSize": 1000000,
//!   "numChunks": 2,
//!   "totalCompressedSize": 812345,
//!   "chunks": [
//!     { "index": 0, "originalSize": 1000000, "compressedSize": 540000, "filename": "chunk_000.gz" },
//!     { "index": 1, "originalSize": 500000, "compressedSize": 272345, "filename": "chunk_001.gz" }
//!   ],
//!   "compressionRatio": "45.84%",
//!   "createdAt": "2026-03-01T12:00:00.000Z"
//! }
//! ```

use crate::error::GeoError;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

/// File name of the manifest inside a chunk directory
pub const MANIFEST_FILE: &str = "metadata.json";

/// Split manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Name of the source file that was split
    pub original_file: String,
    /// Exact length of the reconstructed file
    pub total_size: u64,
    /// Nominal chunk size used by the splitter
    pub chunk_size: u64,
    /// Number of chunk entries
    pub num_chunks: usize,
    /// Sum of compressed chunk sizes (informational)
    #[serde(default)]
    pub total_compressed_size: u64,
    /// Chunk entries in index order
    pub chunks: Vec<ChunkEntry>,
    /// Informational; older splitters wrote a percentage string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<serde_json::Value>,
    /// Informational creation timestamp (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// One compressed byte range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEntry {
    /// Position of the chunk, contiguous from 0
    pub index: usize,
    /// Decompressed length
    pub original_size: u64,
    /// On-disk (compressed) length
    pub compressed_size: u64,
    /// File name within the chunk directory
    pub filename: String,
}

/// Canonical chunk file name: `chunk_000.gz`, `chunk_001.gz`, ...
pub fn chunk_filename(index: usize) -> String {
    format!("chunk_{:03}.gz", index)
}

impl Manifest {
    /// Read and validate `metadata.json` from a chunk directory
    pub fn read(chunks_dir: &Path) -> Result<Self, GeoError> {
        Self::read_file(&chunks_dir.join(MANIFEST_FILE))
    }

    /// Read and validate a manifest at an explicit path
    pub fn read_file(path: &Path) -> Result<Self, GeoError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GeoError::ManifestNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json(&text)
    }

    /// Async variant of [`Manifest::read_file`]
    pub async fn read_file_async(path: &Path) -> Result<Self, GeoError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GeoError::ManifestNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json(&text)
    }

    /// Parse and validate manifest JSON
    pub fn from_json(text: &str) -> Result<Self, GeoError> {
        let manifest: Manifest = serde_json::from_str(text)
            .map_err(|e| GeoError::InvalidManifest(format!("malformed JSON: {}", e)))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Write the manifest as pretty JSON
    pub fn write(&self, chunks_dir: &Path) -> Result<(), GeoError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GeoError::InvalidManifest(e.to_string()))?;
        std::fs::write(chunks_dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }

    /// Check the structural invariants the loader relies on
    ///
    /// - `numChunks == chunks.len()`
    /// - indices are `0..numChunks` in order
    /// - `sum(originalSize) == totalSize`
    /// - filenames are plain names inside the chunk directory
    pub fn validate(&self) -> Result<(), GeoError> {
        if self.num_chunks != self.chunks.len() {
            return Err(GeoError::InvalidManifest(format!(
                "numChunks is {} but {} chunk entries are listed",
                self.num_chunks,
                self.chunks.len()
            )));
        }

        let mut sum: u64 = 0;
        for (position, chunk) in self.chunks.iter().enumerate() {
            if chunk.index != position {
                return Err(GeoError::InvalidManifest(format!(
                    "chunk at position {} has index {}",
                    position, chunk.index
                )));
            }
            if !is_plain_file_name(&chunk.filename) {
                return Err(GeoError::InvalidManifest(format!(
                    "chunk {} filename {:?} is not a plain file name",
                    chunk.index, chunk.filename
                )));
            }
            sum = sum.checked_add(chunk.original_size).ok_or_else(|| {
                GeoError::InvalidManifest("chunk sizes overflow".to_string())
            })?;
        }

        if sum != self.total_size {
            return Err(GeoError::InvalidManifest(format!(
                "chunk sizes sum to {} but totalSize is {}",
                sum, self.total_size
            )));
        }

        Ok(())
    }

    /// Byte offset of each chunk within the reconstructed file
    pub fn offsets(&self) -> impl Iterator<Item = (u64, &ChunkEntry)> {
        self.chunks.iter().scan(0u64, |offset, chunk| {
            let start = *offset;
            *offset += chunk.original_size;
            Some((start, chunk))
        })
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
