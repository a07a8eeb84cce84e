use anyhow::{bail, Context, Result};
use std::path::PathBuf;

use crate::cli_utils::{format_bytes, format_number};

pub fn cmd_split(input: PathBuf, output_dir: PathBuf, chunk_size_mb: u64) -> Result<()> {
    if !input.is_file() {
        bail!("Input file not found: {}", input.display());
    }
    if chunk_size_mb == 0 {
        bail!("Chunk size must be at least 1 MB");
    }
    let chunk_size = chunk_size_mb
        .checked_mul(1024 * 1024)
        .context("Chunk size is too large")?;

    let manifest = geoshard::split_file(&input, &output_dir, chunk_size)
        .with_context(|| format!("Failed to split {}", input.display()))?;

    println!("Input:       {}", input.display());
    println!("Output:      {}", output_dir.display());
    println!(
        "Original:    {} ({} bytes)",
        format_bytes(manifest.total_size),
        format_number(manifest.total_size)
    );
    println!("Compressed:  {}", format_bytes(manifest.total_compressed_size));
    if let Some(ratio) = manifest.compression_ratio.as_ref().and_then(|r| r.as_str()) {
        println!("Saved:       {}", ratio);
    }
    println!("Chunks:      {}", manifest.num_chunks);
    for chunk in &manifest.chunks {
        println!(
            "  {}  {:>10} -> {:>10}",
            chunk.filename,
            format_bytes(chunk.original_size),
            format_bytes(chunk.compressed_size)
        );
    }
    Ok(())
}
