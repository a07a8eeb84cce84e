use anyhow::{Context, Result};
use geoshard::{GeoContext, IpResolver};
use serde_json::json;
use std::net::IpAddr;
use std::path::PathBuf;

use super::load_config;
use crate::cli_utils::data_value_to_json;

pub fn cmd_resolve(
    ips: Vec<String>,
    root: Option<PathBuf>,
    config: Option<PathBuf>,
    fallback_v6: Option<String>,
    raw: bool,
) -> Result<()> {
    let config = load_config(root, config)?;
    let ctx = GeoContext::new(config);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let db = runtime
        .block_on(ctx.load())
        .context("Failed to load geo database")?;

    let resolver = IpResolver::new(ctx);
    let mut results = Vec::with_capacity(ips.len());
    for ip in &ips {
        let country = match &fallback_v6 {
            Some(fallback) => resolver.resolve_from_two_addresses(ip, fallback),
            None => resolver.resolve_country(ip),
        };
        let mut entry = json!({ "ip": ip, "country": country });

        if raw {
            let record = match ip.parse::<IpAddr>() {
                Ok(addr) => db
                    .provider()
                    .lookup(addr)
                    .with_context(|| format!("Lookup failed for {}", ip))?,
                Err(_) => None,
            };
            entry["record"] = record.as_ref().map_or(json!(null), data_value_to_json);
        }
        results.push(entry);
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
