use anyhow::{Context, Result};
use geoshard::Manifest;
use serde_json::json;
use std::path::PathBuf;

use super::load_config;
use crate::cli_utils::{format_bytes, format_number};

/// On-disk state of one chunk file
enum ChunkState {
    Ok,
    Missing,
    SizeMismatch(u64),
}

impl ChunkState {
    fn label(&self) -> String {
        match self {
            ChunkState::Ok => "ok".to_string(),
            ChunkState::Missing => "missing".to_string(),
            ChunkState::SizeMismatch(actual) => format!("size mismatch ({} bytes on disk)", actual),
        }
    }
}

pub fn cmd_inspect(chunks_dir: PathBuf, json_output: bool, config: Option<PathBuf>) -> Result<()> {
    let config = load_config(None, config)?;
    let manifest = Manifest::read_file(&chunks_dir.join(&config.manifest_name))
        .with_context(|| format!("Failed to read manifest in {}", chunks_dir.display()))?;

    let states: Vec<ChunkState> = manifest
        .chunks
        .iter()
        .map(|chunk| match std::fs::metadata(chunks_dir.join(&chunk.filename)) {
            Err(_) => ChunkState::Missing,
            Ok(meta) if meta.len() != chunk.compressed_size => ChunkState::SizeMismatch(meta.len()),
            Ok(_) => ChunkState::Ok,
        })
        .collect();
    let problems = states
        .iter()
        .filter(|s| !matches!(s, ChunkState::Ok))
        .count();

    if json_output {
        let chunks: Vec<_> = manifest
            .chunks
            .iter()
            .zip(&states)
            .map(|(chunk, state)| {
                json!({
                    "index": chunk.index,
                    "filename": chunk.filename,
                    "originalSize": chunk.original_size,
                    "compressedSize": chunk.compressed_size,
                    "status": state.label(),
                })
            })
            .collect();
        let output = json!({
            "directory": chunks_dir.display().to_string(),
            "originalFile": manifest.original_file,
            "totalSize": manifest.total_size,
            "chunkSize": manifest.chunk_size,
            "numChunks": manifest.num_chunks,
            "totalCompressedSize": manifest.total_compressed_size,
            "createdAt": manifest.created_at,
            "chunks": chunks,
            "problems": problems,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Directory:   {}", chunks_dir.display());
        println!("Original:    {}", manifest.original_file);
        println!(
            "Total size:  {} ({} bytes)",
            format_bytes(manifest.total_size),
            format_number(manifest.total_size)
        );
        println!("Chunk size:  {}", format_bytes(manifest.chunk_size));
        println!("Compressed:  {}", format_bytes(manifest.total_compressed_size));
        if let Some(created) = &manifest.created_at {
            println!("Created:     {}", created);
        }
        println!();
        println!("Chunks ({}):", manifest.num_chunks);
        for (chunk, state) in manifest.chunks.iter().zip(&states) {
            println!(
                "  [{:>3}] {}  {:>10} -> {:>10}  {}",
                chunk.index,
                chunk.filename,
                format_bytes(chunk.original_size),
                format_bytes(chunk.compressed_size),
                state.label()
            );
        }
    }

    if problems > 0 {
        anyhow::bail!("{} chunk file(s) do not match the manifest", problems);
    }
    Ok(())
}
