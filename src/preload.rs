//! Startup preloading
//!
//! Call [`preload`] (or [`spawn_preload`]) once at startup so that a
//! chunked database is ready before the first blocking lookup.

use crate::context::GeoContext;
use tokio::task::JoinHandle;

/// Load the database, logging instead of failing
///
/// Joins a load already in progress and returns immediately once a
/// database is loaded. A failure is logged at `warn` and swallowed; the
/// next lookup retries.
pub async fn preload(ctx: &GeoContext) {
    if ctx.is_loaded() {
        return;
    }
    match ctx.load().await {
        Ok(db) => tracing::debug!(source = %db.selection().locator.display(), "preload finished"),
        Err(e) => tracing::warn!(error = %e, "geo database preload failed"),
    }
}

/// Run [`preload`] on the current tokio runtime
pub fn spawn_preload(ctx: GeoContext) -> JoinHandle<()> {
    tokio::spawn(async move { preload(&ctx).await })
}
