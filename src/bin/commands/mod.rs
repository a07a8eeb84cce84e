pub mod inspect_cmd;
pub mod resolve_cmd;
pub mod select_cmd;
pub mod split_cmd;
pub mod verify_cmd;

pub use inspect_cmd::cmd_inspect;
pub use resolve_cmd::cmd_resolve;
pub use select_cmd::cmd_select;
pub use split_cmd::cmd_split;
pub use verify_cmd::cmd_verify;

use anyhow::{Context, Result};
use geoshard::GeoConfig;
use std::path::PathBuf;

/// Config from `--config`, with `--root` taking precedence over its `db_root`
pub fn load_config(root: Option<PathBuf>, config: Option<PathBuf>) -> Result<GeoConfig> {
    let base = match config {
        Some(path) => GeoConfig::from_file(&path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => GeoConfig::default(),
    };
    Ok(match root {
        Some(root) => base.with_db_root(root),
        None => base,
    })
}
