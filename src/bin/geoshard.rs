mod cli_utils;
mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use commands::{cmd_inspect, cmd_resolve, cmd_select, cmd_split, cmd_verify};

#[derive(Parser)]
#[command(name = "geoshard")]
#[command(
    about = "Split, verify and query chunked GeoIP databases",
    long_about = "geoshard - IP to country resolution over chunked MaxMind DB files\n\n\
    Large databases can be split into gzip-compressed chunks plus a metadata.json\n\
    manifest, then reassembled and verified in memory at startup.\n\n\
    Examples:\n\
      geoshard split data/ip-country.mmdb data/chunks 5\n\
      geoshard inspect data/chunks\n\
      geoshard verify data/chunks --output /tmp/rebuilt.mmdb\n\
      geoshard select --root data\n\
      geoshard resolve 8.8.8.8 1.1.1.1 --root data\n\n\
    Logging is controlled with RUST_LOG (default: geoshard=info)."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a database file into gzip chunks and a manifest
    Split {
        /// Database file to split
        #[arg(value_name = "INPUT", default_value = "data/ip-country.mmdb")]
        input: PathBuf,

        /// Directory for the chunks and metadata.json
        #[arg(value_name = "OUTPUT_DIR", default_value = "data/chunks")]
        output_dir: PathBuf,

        /// Nominal chunk size in MiB
        #[arg(value_name = "CHUNK_SIZE_MB", default_value = "5")]
        chunk_size_mb: u64,
    },

    /// Show a chunk manifest and check the chunk files against it
    Inspect {
        /// Chunk directory containing the manifest
        #[arg(value_name = "CHUNKS_DIR")]
        chunks_dir: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// JSON config file (for `manifest_name`)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Reassemble a chunk directory and verify every chunk
    Verify {
        /// Chunk directory containing the manifest
        #[arg(value_name = "CHUNKS_DIR")]
        chunks_dir: PathBuf,

        /// Write the reassembled database here
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// JSON config file (for `manifest_name`)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Show which database would be served
    Select {
        /// Database root directory
        #[arg(short, long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// JSON config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Resolve IP addresses to country codes
    Resolve {
        /// Addresses to resolve
        #[arg(value_name = "IP", required = true)]
        ips: Vec<String>,

        /// Database root directory
        #[arg(short, long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// JSON config file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Address to try when an IP has no country
        #[arg(long, value_name = "IP")]
        fallback_v6: Option<String>,

        /// Include the raw database record
        #[arg(long)]
        raw: bool,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("geoshard=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Commands::Split {
            input,
            output_dir,
            chunk_size_mb,
        } => cmd_split(input, output_dir, chunk_size_mb),
        Commands::Inspect {
            chunks_dir,
            json,
            config,
        } => cmd_inspect(chunks_dir, json, config),
        Commands::Verify {
            chunks_dir,
            output,
            config,
        } => cmd_verify(chunks_dir, output, config),
        Commands::Select { root, config } => cmd_select(root, config),
        Commands::Resolve {
            ips,
            root,
            config,
            fallback_v6,
            raw,
        } => cmd_resolve(ips, root, config, fallback_v6, raw),
    }
}
