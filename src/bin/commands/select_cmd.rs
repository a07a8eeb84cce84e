use anyhow::{Context, Result};
use geoshard::DatabaseSelector;
use std::path::PathBuf;

use super::load_config;

pub fn cmd_select(root: Option<PathBuf>, config: Option<PathBuf>) -> Result<()> {
    let config = load_config(root, config)?;
    let selection = DatabaseSelector::from_config(&config)
        .select(&config.db_root)
        .context("No database selected")?;

    println!("Database: {}", selection.locator.display());
    println!("Kind:     {}", selection.kind);
    println!("Format:   {}", selection.format);
    Ok(())
}
