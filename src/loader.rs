//! Chunk loader
//!
//! Rebuilds the original database file from a chunk directory. Chunks are
//! appended strictly in index order to one buffer reserved up front at
//! `totalSize`, so peak extra memory is that buffer plus a single chunk.
//! A reservation the allocator refuses is an error, never a panic.
//!
//! Every chunk must decompress to exactly its manifest `originalSize`;
//! any mismatch aborts the whole pass and the partial buffer is dropped.

use crate::error::GeoError;
use crate::manifest::{ChunkEntry, Manifest, MANIFEST_FILE};
use flate2::read::GzDecoder;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Upper bound of the deflate expansion ratio
const MAX_INFLATE_RATIO: usize = 1032;

/// Counters describing loader activity
#[derive(Debug, Default)]
pub struct LoadStats {
    passes: AtomicU64,
    chunks_decoded: AtomicU64,
    bytes_decoded: AtomicU64,
}

/// Point-in-time copy of [`LoadStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadStatsSnapshot {
    /// Reassembly passes started
    pub passes: u64,
    /// Chunks successfully decompressed and verified
    pub chunks_decoded: u64,
    /// Decompressed bytes produced by verified chunks
    pub bytes_decoded: u64,
}

impl LoadStats {
    /// Take a snapshot of the counters
    pub fn snapshot(&self) -> LoadStatsSnapshot {
        LoadStatsSnapshot {
            passes: self.passes.load(Ordering::Relaxed),
            chunks_decoded: self.chunks_decoded.load(Ordering::Relaxed),
            bytes_decoded: self.bytes_decoded.load(Ordering::Relaxed),
        }
    }

    fn record_chunk(&self, len: usize) {
        self.chunks_decoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_decoded.fetch_add(len as u64, Ordering::Relaxed);
    }
}

/// Reassembles chunked databases
#[derive(Debug, Clone)]
pub struct ChunkLoader {
    manifest_name: String,
    stats: Arc<LoadStats>,
}

impl Default for ChunkLoader {
    fn default() -> Self {
        Self {
            manifest_name: MANIFEST_FILE.to_string(),
            stats: Arc::default(),
        }
    }
}

impl ChunkLoader {
    /// Create a loader with fresh counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the manifest from a different file name inside the chunk directory
    pub fn with_manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    /// Loader counters
    pub fn stats(&self) -> LoadStatsSnapshot {
        self.stats.snapshot()
    }

    /// Rebuild the original file, blocking the calling thread
    pub fn reassemble(&self, chunks_dir: &Path) -> Result<Vec<u8>, GeoError> {
        let started = Instant::now();
        self.stats.passes.fetch_add(1, Ordering::Relaxed);

        let manifest = Manifest::read_file(&chunks_dir.join(&self.manifest_name))?;
        let mut buffer = allocate(&manifest)?;

        for entry in &manifest.chunks {
            let path = chunks_dir.join(&entry.filename);
            let compressed = read_chunk(&path, entry.index)?;
            let decoded = decode_chunk(entry, &compressed)?;
            buffer.extend_from_slice(&decoded);
            self.stats.record_chunk(decoded.len());
        }

        log_reassembled(chunks_dir, &manifest, started);
        Ok(buffer)
    }

    /// Rebuild the original file without blocking the async runtime
    ///
    /// File reads go through `tokio::fs`; decompression runs on the
    /// blocking pool, one chunk at a time.
    pub async fn reassemble_async(&self, chunks_dir: &Path) -> Result<Vec<u8>, GeoError> {
        let started = Instant::now();
        self.stats.passes.fetch_add(1, Ordering::Relaxed);

        let manifest = Manifest::read_file_async(&chunks_dir.join(&self.manifest_name)).await?;
        let mut buffer = allocate(&manifest)?;

        for entry in &manifest.chunks {
            let path = chunks_dir.join(&entry.filename);
            let compressed = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => return Err(chunk_read_error(e, &path, entry.index)),
            };

            let owned_entry = entry.clone();
            let decoded = tokio::task::spawn_blocking(move || decode_chunk(&owned_entry, &compressed))
                .await
                .map_err(|e| GeoError::Decompress {
                    index: entry.index,
                    message: format!("decompression task failed: {}", e),
                })??;

            buffer.extend_from_slice(&decoded);
            self.stats.record_chunk(decoded.len());
        }

        log_reassembled(chunks_dir, &manifest, started);
        Ok(buffer)
    }
}

/// Decompress one chunk and verify its length
///
/// At most `originalSize + 1` bytes are buffered. If the stream is longer
/// the remainder is only counted, so the reported size is exact without
/// holding an oversized chunk in memory.
pub fn decode_chunk(entry: &ChunkEntry, compressed: &[u8]) -> Result<Vec<u8>, GeoError> {
    let expected = entry.original_size;
    let decompress_error = |e: io::Error| GeoError::Decompress {
        index: entry.index,
        message: e.to_string(),
    };

    // Reserve no more than the stream could inflate to
    let plausible = compressed.len().saturating_mul(MAX_INFLATE_RATIO);
    let capacity = usize::try_from(expected).unwrap_or(usize::MAX).min(plausible);
    let mut decoded = Vec::new();
    decoded
        .try_reserve_exact(capacity)
        .map_err(|_| GeoError::Allocation {
            bytes: capacity as u64,
        })?;

    let mut decoder = GzDecoder::new(compressed);
    (&mut decoder)
        .take(expected.saturating_add(1))
        .read_to_end(&mut decoded)
        .map_err(decompress_error)?;

    let mut actual = decoded.len() as u64;
    if actual > expected {
        actual += io::copy(&mut decoder, &mut io::sink()).map_err(decompress_error)?;
    }

    if actual != expected {
        return Err(GeoError::Integrity {
            index: entry.index,
            expected,
            actual,
        });
    }
    Ok(decoded)
}

fn allocate(manifest: &Manifest) -> Result<Vec<u8>, GeoError> {
    let total = usize::try_from(manifest.total_size).map_err(|_| {
        GeoError::InvalidManifest(format!(
            "totalSize {} does not fit in memory on this platform",
            manifest.total_size
        ))
    })?;
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(total)
        .map_err(|_| GeoError::Allocation {
            bytes: manifest.total_size,
        })?;
    Ok(buffer)
}

fn read_chunk(path: &Path, index: usize) -> Result<Vec<u8>, GeoError> {
    std::fs::read(path).map_err(|e| chunk_read_error(e, path, index))
}

fn chunk_read_error(err: io::Error, path: &Path, index: usize) -> GeoError {
    if err.kind() == io::ErrorKind::NotFound {
        GeoError::ChunkNotFound {
            index,
            path: PathBuf::from(path),
        }
    } else {
        GeoError::Io(format!("chunk {} ({}): {}", index, path.display(), err))
    }
}

fn log_reassembled(chunks_dir: &Path, manifest: &Manifest, started: Instant) {
    tracing::debug!(
        dir = %chunks_dir.display(),
        original = %manifest.original_file,
        chunks = manifest.num_chunks,
        bytes = manifest.total_size,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "reassembled chunked database"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn entry(index: usize, original_size: u64) -> ChunkEntry {
        ChunkEntry {
            index,
            original_size,
            compressed_size: 0,
            filename: crate::manifest::chunk_filename(index),
        }
    }

    #[test]
    fn test_decode_exact_size() {
        let data = vec![7u8; 4096];
        let decoded = decode_chunk(&entry(0, 4096), &gzip(&data)).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_decode_short_chunk() {
        let err = decode_chunk(&entry(2, 100), &gzip(&[1u8; 90])).unwrap_err();
        assert_eq!(
            err,
            GeoError::Integrity {
                index: 2,
                expected: 100,
                actual: 90
            }
        );
    }

    #[test]
    fn test_decode_long_chunk_reports_exact_size() {
        let err = decode_chunk(&entry(1, 100), &gzip(&[1u8; 5000])).unwrap_err();
        assert_eq!(
            err,
            GeoError::Integrity {
                index: 1,
                expected: 100,
                actual: 5000
            }
        );
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_chunk(&entry(0, 10), b"definitely not gzip").unwrap_err();
        assert!(matches!(err, GeoError::Decompress { index: 0, .. }));
    }

    #[test]
    fn test_decode_oversized_claim_is_integrity_error() {
        let err = decode_chunk(&entry(0, u64::MAX), &gzip(&[1u8; 10])).unwrap_err();
        assert_eq!(
            err,
            GeoError::Integrity {
                index: 0,
                expected: u64::MAX,
                actual: 10
            }
        );
    }

    #[test]
    fn test_unallocatable_total_size() {
        let dir = tempfile::tempdir().unwrap();
        let huge = 1u64 << 63;
        let manifest = Manifest {
            original_file: "blob.bin".to_string(),
            total_size: huge,
            chunk_size: huge,
            num_chunks: 1,
            total_compressed_size: 0,
            chunks: vec![entry(0, huge)],
            compression_ratio: None,
            created_at: None,
        };
        manifest.write(dir.path()).unwrap();

        let loader = ChunkLoader::new();
        assert_eq!(
            loader.reassemble(dir.path()).unwrap_err(),
            GeoError::Allocation { bytes: huge }
        );
        assert_eq!(loader.stats().chunks_decoded, 0);
    }

    #[test]
    fn test_reassemble_counts_passes() {
        let dir = tempfile::tempdir().unwrap();
        let blob: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        crate::splitter::split_bytes("blob.bin", &blob, dir.path(), 4096).unwrap();

        let loader = ChunkLoader::new();
        assert_eq!(loader.reassemble(dir.path()).unwrap(), blob);
        let stats = loader.stats();
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.chunks_decoded, 3);
        assert_eq!(stats.bytes_decoded, 10_000);
    }

    #[test]
    fn test_missing_chunk_names_index() {
        let dir = tempfile::tempdir().unwrap();
        crate::splitter::split_bytes("blob.bin", &[5u8; 300], dir.path(), 100).unwrap();
        std::fs::remove_file(dir.path().join("chunk_001.gz")).unwrap();

        let err = ChunkLoader::new().reassemble(dir.path()).unwrap_err();
        assert!(matches!(err, GeoError::ChunkNotFound { index: 1, .. }));
    }

    #[test]
    fn test_custom_manifest_name() {
        let dir = tempfile::tempdir().unwrap();
        crate::splitter::split_bytes("blob.bin", &[3u8; 50], dir.path(), 20).unwrap();
        std::fs::rename(dir.path().join(MANIFEST_FILE), dir.path().join("index.json")).unwrap();

        let err = ChunkLoader::new().reassemble(dir.path()).unwrap_err();
        assert!(matches!(err, GeoError::ManifestNotFound { .. }));

        let loader = ChunkLoader::new().with_manifest_name("index.json");
        assert_eq!(loader.reassemble(dir.path()).unwrap(), vec![3u8; 50]);
    }

    #[tokio::test]
    async fn test_reassemble_async_matches_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let blob: Vec<u8> = (0..7_777u32).map(|i| (i * 31 % 256) as u8).collect();
        crate::splitter::split_bytes("blob.bin", &blob, dir.path(), 1000).unwrap();

        let loader = ChunkLoader::new();
        let via_async = loader.reassemble_async(dir.path()).await.unwrap();
        let via_blocking = loader.reassemble(dir.path()).unwrap();
        assert_eq!(via_async, blob);
        assert_eq!(via_blocking, blob);
        assert_eq!(loader.stats().passes, 2);
    }
}
