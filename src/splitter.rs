//! Offline splitter
//!
//! Cuts a database file into fixed-size ranges, gzips each range into
//! `chunk_NNN.gz` and writes the `metadata.json` manifest the loader reads.
//! This runs at build time, never inside the serving process.

use crate::error::GeoError;
use crate::manifest::{chunk_filename, ChunkEntry, Manifest};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;

/// Default nominal chunk size: 5 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Split the file at `input` into `output_dir`
pub fn split_file(input: &Path, output_dir: &Path, chunk_size: u64) -> Result<Manifest, GeoError> {
    let bytes = match std::fs::read(input) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(GeoError::Io(format!("input file not found: {}", input.display())))
        }
        Err(e) => return Err(e.into()),
    };
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    split_bytes(&name, &bytes, output_dir, chunk_size)
}

/// Split an in-memory blob into `output_dir`
///
/// An empty blob produces a manifest with zero chunks.
pub fn split_bytes(
    original_file: &str,
    bytes: &[u8],
    output_dir: &Path,
    chunk_size: u64,
) -> Result<Manifest, GeoError> {
    let step = usize::try_from(chunk_size)
        .ok()
        .filter(|&s| s > 0)
        .ok_or_else(|| GeoError::Config(format!("invalid chunk size: {}", chunk_size)))?;

    std::fs::create_dir_all(output_dir)?;

    let mut chunks = Vec::with_capacity(bytes.len().div_ceil(step));
    let mut total_compressed = 0u64;

    for (index, range) in bytes.chunks(step).enumerate() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(range)?;
        let compressed = encoder.finish()?;

        let filename = chunk_filename(index);
        std::fs::write(output_dir.join(&filename), &compressed)?;

        total_compressed += compressed.len() as u64;
        chunks.push(ChunkEntry {
            index,
            original_size: range.len() as u64,
            compressed_size: compressed.len() as u64,
            filename,
        });
    }

    let ratio = if bytes.is_empty() {
        0.0
    } else {
        (1.0 - total_compressed as f64 / bytes.len() as f64) * 100.0
    };

    let manifest = Manifest {
        original_file: original_file.to_string(),
        total_size: bytes.len() as u64,
        chunk_size,
        num_chunks: chunks.len(),
        total_compressed_size: total_compressed,
        chunks,
        compression_ratio: Some(serde_json::Value::String(format!("{:.2}%", ratio))),
        created_at: Some(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
    };
    manifest.validate()?;
    manifest.write(output_dir)?;

    tracing::info!(
        original = original_file,
        chunks = manifest.num_chunks,
        total_size = manifest.total_size,
        compressed = total_compressed,
        "split database into chunks"
    );

    Ok(manifest)
}
