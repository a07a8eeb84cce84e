//! IP to country resolution
//!
//! [`IpResolver`] is the lookup surface. The plain `resolve_*` methods
//! return `Option<CountryCode>` and never fail: a missing database, a bad
//! address or a provider error all become `None` and are logged. The
//! `try_resolve*` methods expose the same path with the error kept.
//!
//! Definite answers (a country, or "no country for this address") are
//! memoized in the context's cache. Errors never are.

use crate::context::{GeoContext, LoadedDatabase};
use crate::error::GeoError;
use crate::record::{CountryCode, Resolution};
use std::net::IpAddr;

enum Query {
    Answered(Resolution),
    Lookup(IpAddr),
}

/// Resolves textual IP addresses to country codes
#[derive(Debug, Clone)]
pub struct IpResolver {
    ctx: GeoContext,
}

impl IpResolver {
    /// Resolver over a shared context
    pub fn new(ctx: GeoContext) -> Self {
        Self { ctx }
    }

    /// The underlying context
    pub fn context(&self) -> &GeoContext {
        &self.ctx
    }

    /// Country for `ip`, blocking the caller
    ///
    /// Works against a monolithic database straight away. A chunked
    /// database yields `None` until it has been preloaded.
    pub fn resolve_country(&self, ip: &str) -> Option<CountryCode> {
        settle(ip, self.try_resolve(ip))
    }

    /// Country for `ip`, loading the database first if needed
    pub async fn resolve_country_async(&self, ip: &str) -> Option<CountryCode> {
        settle(ip, self.try_resolve_async(ip).await)
    }

    /// Country for `primary`, or for `fallback` when `primary` has none
    pub fn resolve_from_two_addresses(&self, primary: &str, fallback: &str) -> Option<CountryCode> {
        self.resolve_country(primary)
            .or_else(|| self.resolve_country(fallback))
    }

    /// Async variant of [`IpResolver::resolve_from_two_addresses`]
    pub async fn resolve_from_two_addresses_async(
        &self,
        primary: &str,
        fallback: &str,
    ) -> Option<CountryCode> {
        match self.resolve_country_async(primary).await {
            Some(code) => Some(code),
            None => self.resolve_country_async(fallback).await,
        }
    }

    /// Blocking resolution with errors kept
    pub fn try_resolve(&self, ip: &str) -> Result<Resolution, GeoError> {
        match self.begin(ip)? {
            Query::Answered(resolution) => Ok(resolution),
            Query::Lookup(addr) => {
                let db = self.ctx.load_blocking()?;
                self.finish(ip, &db, addr)
            }
        }
    }

    /// Async resolution with errors kept
    pub async fn try_resolve_async(&self, ip: &str) -> Result<Resolution, GeoError> {
        match self.begin(ip)? {
            Query::Answered(resolution) => Ok(resolution),
            Query::Lookup(addr) => {
                let db = self.ctx.load().await?;
                self.finish(ip, &db, addr)
            }
        }
    }

    /// Number of cached resolutions
    pub fn cache_size(&self) -> usize {
        self.ctx.cache().len()
    }

    /// Maximum number of cached resolutions
    pub fn cache_capacity(&self) -> usize {
        self.ctx.cache().capacity()
    }

    /// Drop all cached resolutions
    pub fn clear_cache(&self) {
        self.ctx.cache().clear();
    }

    fn begin(&self, ip: &str) -> Result<Query, GeoError> {
        if ip.is_empty() {
            return Ok(Query::Answered(Resolution::NotFound));
        }
        let addr: IpAddr = ip
            .parse()
            .map_err(|_| GeoError::InvalidAddress(ip.to_string()))?;
        if matches!(addr, IpAddr::V6(v6) if v6.is_unspecified()) {
            return Ok(Query::Answered(Resolution::NotFound));
        }
        Ok(match self.ctx.cache().get(ip) {
            Some(resolution) => Query::Answered(resolution),
            None => Query::Lookup(addr),
        })
    }

    fn finish(&self, ip: &str, db: &LoadedDatabase, addr: IpAddr) -> Result<Resolution, GeoError> {
        let resolution = db.resolve(addr)?;
        self.ctx.cache().put(ip, resolution.clone());
        Ok(resolution)
    }
}

fn settle(ip: &str, result: Result<Resolution, GeoError>) -> Option<CountryCode> {
    match result {
        Ok(resolution) => resolution.country(),
        Err(e) => {
            tracing::debug!(ip, error = %e, "country lookup failed");
            None
        }
    }
}
