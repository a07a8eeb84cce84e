//! Database selection
//!
//! Picks which database to serve from a root directory. Only existence is
//! checked here; a selected database that turns out to be unreadable fails
//! later, when it is loaded.

use crate::config::{GeoConfig, MonolithicCandidate};
use crate::error::GeoError;
use crate::record::RecordFormat;
use std::fmt;
use std::path::{Path, PathBuf};

/// How the selected database is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    /// Split into a chunk directory with a manifest
    Chunked,
    /// A single database file
    Monolithic,
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseKind::Chunked => write!(f, "chunked"),
            DatabaseKind::Monolithic => write!(f, "monolithic"),
        }
    }
}

/// The database chosen for serving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Chunk directory or database file
    pub locator: PathBuf,
    /// Record shape
    pub format: RecordFormat,
    /// Storage kind
    pub kind: DatabaseKind,
}

impl Selection {
    /// True when the locator is a chunk directory
    pub fn is_chunked(&self) -> bool {
        self.kind == DatabaseKind::Chunked
    }
}

/// Probes candidate locations in priority order
#[derive(Debug, Clone)]
pub struct DatabaseSelector {
    chunks_dir: String,
    manifest_name: String,
    chunked_format: RecordFormat,
    monolithic: Vec<MonolithicCandidate>,
}

impl Default for DatabaseSelector {
    fn default() -> Self {
        Self::from_config(&GeoConfig::default())
    }
}

impl DatabaseSelector {
    /// Build a selector from the candidate names in `config`
    pub fn from_config(config: &GeoConfig) -> Self {
        Self {
            chunks_dir: config.chunks_dir.clone(),
            manifest_name: config.manifest_name.clone(),
            chunked_format: config.chunked_format,
            monolithic: config.monolithic.clone(),
        }
    }

    /// Choose a database under `root`
    ///
    /// A chunk directory wins whenever its manifest exists, even if
    /// monolithic files sit beside it.
    pub fn select(&self, root: &Path) -> Result<Selection, GeoError> {
        let chunks = root.join(&self.chunks_dir);
        if chunks.join(&self.manifest_name).is_file() {
            return Ok(Selection {
                locator: chunks,
                format: self.chunked_format,
                kind: DatabaseKind::Chunked,
            });
        }

        self.monolithic
            .iter()
            .map(|candidate| (root.join(&candidate.file_name), candidate.format))
            .find(|(path, _)| path.is_file())
            .map(|(locator, format)| Selection {
                locator,
                format,
                kind: DatabaseKind::Monolithic,
            })
            .ok_or_else(|| GeoError::NoDatabase {
                root: root.to_path_buf(),
            })
    }
}
