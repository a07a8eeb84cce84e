//! Shared lookup context
//!
//! A [`GeoContext`] owns everything a process needs to answer lookups: the
//! configuration, the selector, the provider opener, the loaded database and
//! the resolution cache. It is a cheap `Clone` handle; clones share state.
//!
//! Loading is single-flight. The first caller of [`GeoContext::load`] starts
//! the load and parks a shared future in the context; later callers await
//! the same future and receive the same result. A successful load is kept
//! for the life of the context (or until [`GeoContext::reset`]). A failed
//! load is handed to everyone already waiting, then forgotten, so the next
//! caller starts a fresh attempt. A panic during the load (a faulty opener,
//! say) is caught and treated the same way as a failure.

use crate::cache::ResolutionCache;
use crate::config::GeoConfig;
use crate::error::{GeoError, LookupError};
use crate::loader::{ChunkLoader, LoadStatsSnapshot};
use crate::provider::{DatabaseBytes, LookupProvider, MmdbOpener, ProviderOpener};
use crate::record::Resolution;
use crate::selector::{DatabaseSelector, Selection};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::net::IpAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<LoadedDatabase>, GeoError>>>;

/// An opened database ready for lookups
pub struct LoadedDatabase {
    provider: Arc<dyn LookupProvider>,
    selection: Selection,
    size: usize,
}

impl LoadedDatabase {
    /// Where the database came from
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Size of the database bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// The underlying provider
    pub fn provider(&self) -> &Arc<dyn LookupProvider> {
        &self.provider
    }

    /// Look up `ip` and normalize the record into a country
    pub fn resolve(&self, ip: IpAddr) -> Result<Resolution, LookupError> {
        let record = self.provider.lookup(ip)?;
        Ok(Resolution::from_option(
            record.and_then(|r| self.selection.format.extract_country(&r)),
        ))
    }
}

impl std::fmt::Debug for LoadedDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedDatabase")
            .field("selection", &self.selection)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

struct Inner {
    config: GeoConfig,
    selector: DatabaseSelector,
    opener: Arc<dyn ProviderOpener>,
    loader: ChunkLoader,
    loaded: RwLock<Option<Arc<LoadedDatabase>>>,
    in_flight: Mutex<Option<SharedLoad>>,
    cache: ResolutionCache,
}

/// Handle to the process-wide lookup state
#[derive(Clone)]
pub struct GeoContext {
    inner: Arc<Inner>,
}

impl GeoContext {
    /// Context that opens MMDB files
    pub fn new(config: GeoConfig) -> Self {
        Self::with_opener(config, MmdbOpener)
    }

    /// Context with a custom provider opener
    pub fn with_opener<O>(config: GeoConfig, opener: O) -> Self
    where
        O: ProviderOpener + 'static,
    {
        let selector = DatabaseSelector::from_config(&config);
        let loader = ChunkLoader::new().with_manifest_name(config.manifest_name.clone());
        let cache = ResolutionCache::new(config.cache_capacity);
        Self {
            inner: Arc::new(Inner {
                config,
                selector,
                opener: Arc::new(opener),
                loader,
                loaded: RwLock::new(None),
                in_flight: Mutex::new(None),
                cache,
            }),
        }
    }

    /// Configuration this context was built with
    pub fn config(&self) -> &GeoConfig {
        &self.inner.config
    }

    /// The resolution cache
    pub fn cache(&self) -> &ResolutionCache {
        &self.inner.cache
    }

    /// The loaded database, if any
    pub fn loaded(&self) -> Option<Arc<LoadedDatabase>> {
        self.inner.loaded.read().clone()
    }

    /// True once a database has been loaded
    pub fn is_loaded(&self) -> bool {
        self.inner.loaded.read().is_some()
    }

    /// Selection of the loaded database
    pub fn loaded_selection(&self) -> Option<Selection> {
        self.loaded().map(|db| db.selection.clone())
    }

    /// Chunk loader counters
    pub fn load_stats(&self) -> LoadStatsSnapshot {
        self.inner.loader.stats()
    }

    /// Load the selected database, joining any load already in progress
    pub async fn load(&self) -> Result<Arc<LoadedDatabase>, GeoError> {
        let load = {
            let mut in_flight = self.inner.in_flight.lock();
            if let Some(db) = self.loaded() {
                return Ok(db);
            }
            match in_flight.as_ref() {
                Some(load) => load.clone(),
                None => {
                    let load = AssertUnwindSafe(self.clone().load_selected())
                        .catch_unwind()
                        .map(|outcome| outcome.unwrap_or_else(|payload| Err(load_panicked(payload))))
                        .boxed()
                        .shared();
                    *in_flight = Some(load.clone());
                    load
                }
            }
        };

        let result = load.clone().await;

        let mut in_flight = self.inner.in_flight.lock();
        if in_flight.as_ref().is_some_and(|current| current.ptr_eq(&load)) {
            *in_flight = None;
        }
        result
    }

    /// Load without an async runtime
    ///
    /// Monolithic databases are mapped on the calling thread. A chunked
    /// database must already have been loaded through [`GeoContext::load`];
    /// otherwise this fails with [`GeoError::NotPreloaded`].
    pub fn load_blocking(&self) -> Result<Arc<LoadedDatabase>, GeoError> {
        if let Some(db) = self.loaded() {
            return Ok(db);
        }

        let selection = self.inner.selector.select(&self.inner.config.db_root)?;
        if selection.is_chunked() {
            tracing::warn!(
                dir = %selection.locator.display(),
                "chunked database requested on the blocking path before preload"
            );
            return Err(GeoError::NotPreloaded);
        }

        let started = Instant::now();
        let bytes = DatabaseBytes::map_file(&selection.locator)?;
        self.install(selection, bytes, started)
    }

    /// Forget the loaded database and every cached resolution
    pub fn reset(&self) {
        *self.inner.in_flight.lock() = None;
        *self.inner.loaded.write() = None;
        self.inner.cache.clear();
    }

    async fn load_selected(self) -> Result<Arc<LoadedDatabase>, GeoError> {
        let started = Instant::now();
        let selection = self.inner.selector.select(&self.inner.config.db_root)?;
        let bytes = if selection.is_chunked() {
            DatabaseBytes::Owned(self.inner.loader.reassemble_async(&selection.locator).await?)
        } else {
            DatabaseBytes::map_file(&selection.locator)?
        };
        self.install(selection, bytes, started)
    }

    /// Open a provider and publish it; the first published database wins
    fn install(
        &self,
        selection: Selection,
        bytes: DatabaseBytes,
        started: Instant,
    ) -> Result<Arc<LoadedDatabase>, GeoError> {
        let size = bytes.len();
        let provider = self.inner.opener.open(bytes)?;

        let mut loaded = self.inner.loaded.write();
        if let Some(existing) = loaded.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let db = Arc::new(LoadedDatabase {
            provider,
            selection,
            size,
        });
        *loaded = Some(Arc::clone(&db));
        drop(loaded);

        tracing::info!(
            source = %db.selection.locator.display(),
            kind = %db.selection.kind,
            format = %db.selection.format,
            bytes = size,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "geo database loaded"
        );
        Ok(db)
    }
}

/// A panic inside the load becomes an ordinary failure for every waiter
fn load_panicked(payload: Box<dyn Any + Send>) -> GeoError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    tracing::error!(panic = %message, "geo database load panicked");
    GeoError::LoadPanicked(message)
}

impl std::fmt::Debug for GeoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoContext")
            .field("db_root", &self.inner.config.db_root)
            .field("loaded", &self.loaded_selection())
            .field("cache", &self.inner.cache)
            .finish()
    }
}
