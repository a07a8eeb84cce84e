use anyhow::{Context, Result};
use geoshard::mmdb::read_metadata;
use geoshard::ChunkLoader;
use std::path::PathBuf;
use std::time::Instant;

use super::load_config;
use crate::cli_utils::{data_value_to_json, format_bytes};

pub fn cmd_verify(
    chunks_dir: PathBuf,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(None, config)?;
    let started = Instant::now();
    let loader = ChunkLoader::new().with_manifest_name(config.manifest_name);
    let bytes = loader
        .reassemble(&chunks_dir)
        .with_context(|| format!("Verification failed for {}", chunks_dir.display()))?;
    let stats = loader.stats();

    println!("✓ {} chunks verified", stats.chunks_decoded);
    println!("  Reassembled: {}", format_bytes(bytes.len() as u64));
    println!("  Elapsed:     {:.2?}", started.elapsed());

    match read_metadata(&bytes) {
        Ok(metadata) => {
            println!("  MMDB metadata:");
            println!("{}", serde_json::to_string_pretty(&data_value_to_json(&metadata))?);
        }
        Err(e) => println!("  Not an MMDB file: {}", e),
    }

    if let Some(path) = output {
        std::fs::write(&path, &bytes)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("  Written to:  {}", path.display());
    }
    Ok(())
}
