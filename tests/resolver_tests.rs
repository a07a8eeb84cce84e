//! Resolver behavior against stub and real MMDB providers

use geoshard::{
    split_bytes, DataValue, DatabaseBytes, GeoConfig, GeoContext, GeoError, IpResolver, IpVersion,
    LookupError, LookupProvider, MmdbWriter, RecordFormat, Resolution,
};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Provider answering from a fixed table and counting calls
struct StubProvider {
    records: HashMap<IpAddr, DataValue>,
    calls: AtomicUsize,
    failing: bool,
}

impl StubProvider {
    fn new(entries: &[(&str, &str)]) -> Arc<Self> {
        let records = entries
            .iter()
            .map(|(ip, code)| {
                (
                    ip.parse().unwrap(),
                    DataValue::map([("country_code", DataValue::string(*code))]),
                )
            })
            .collect();
        Arc::new(Self {
            records,
            calls: AtomicUsize::new(0),
            failing: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            records: HashMap::new(),
            calls: AtomicUsize::new(0),
            failing: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LookupProvider for StubProvider {
    fn lookup(&self, ip: IpAddr) -> Result<Option<DataValue>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(LookupError::Other("backend unavailable".to_string()));
        }
        Ok(self.records.get(&ip).cloned())
    }
}

fn stub_resolver(root: &Path, config: GeoConfig, stub: &Arc<StubProvider>) -> IpResolver {
    std::fs::write(root.join("ip-country.mmdb"), b"stub").unwrap();
    let provider = Arc::clone(stub);
    let opener = move |_bytes: DatabaseBytes| -> Result<Arc<dyn LookupProvider>, GeoError> {
        Ok(provider.clone() as Arc<dyn LookupProvider>)
    };
    IpResolver::new(GeoContext::with_opener(config.with_db_root(root), opener))
}

#[test]
fn test_known_addresses() {
    let dir = tempfile::tempdir().unwrap();
    let stub = StubProvider::new(&[("8.8.8.8", "US"), ("1.1.1.1", "AU")]);
    let resolver = stub_resolver(dir.path(), GeoConfig::default(), &stub);

    assert_eq!(resolver.resolve_country("8.8.8.8").unwrap(), "US");
    assert_eq!(resolver.resolve_country("1.1.1.1").unwrap(), "AU");
    assert_eq!(stub.calls(), 2);

    // Second round is served from the cache
    assert_eq!(resolver.resolve_country("8.8.8.8").unwrap(), "US");
    assert_eq!(stub.calls(), 2);
    assert_eq!(resolver.cache_size(), 2);
}

#[test]
fn test_empty_and_unspecified_skip_provider() {
    let dir = tempfile::tempdir().unwrap();
    let stub = StubProvider::new(&[("8.8.8.8", "US")]);
    let resolver = stub_resolver(dir.path(), GeoConfig::default(), &stub);

    assert_eq!(resolver.resolve_country(""), None);
    assert_eq!(resolver.resolve_country("::"), None);
    assert_eq!(stub.calls(), 0);
    assert_eq!(resolver.cache_size(), 0);
}

#[test]
fn test_not_found_is_memoized() {
    let dir = tempfile::tempdir().unwrap();
    let stub = StubProvider::new(&[("8.8.8.8", "US")]);
    let resolver = stub_resolver(dir.path(), GeoConfig::default(), &stub);

    assert_eq!(resolver.resolve_country("203.0.113.1"), None);
    assert_eq!(resolver.resolve_country("203.0.113.1"), None);
    assert_eq!(stub.calls(), 1);
    assert_eq!(
        resolver.try_resolve("203.0.113.1").unwrap(),
        Resolution::NotFound
    );
}

#[test]
fn test_fifo_eviction_at_capacity() {
    let dir = tempfile::tempdir().unwrap();
    let stub = StubProvider::new(&[("10.0.0.1", "AA"), ("10.0.0.2", "BB"), ("10.0.0.3", "CC")]);
    let config = GeoConfig::default().with_cache_capacity(2);
    let resolver = stub_resolver(dir.path(), config, &stub);

    resolver.resolve_country("10.0.0.1");
    resolver.resolve_country("10.0.0.2");
    // Hitting the oldest entry does not save it
    resolver.resolve_country("10.0.0.1");
    assert_eq!(stub.calls(), 2);

    resolver.resolve_country("10.0.0.3");
    assert_eq!(resolver.cache_size(), 2);

    resolver.resolve_country("10.0.0.2");
    assert_eq!(stub.calls(), 3);
    resolver.resolve_country("10.0.0.1");
    assert_eq!(stub.calls(), 4);
}

#[test]
fn test_provider_failure_is_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let stub = StubProvider::failing();
    let resolver = stub_resolver(dir.path(), GeoConfig::default(), &stub);

    assert_eq!(resolver.resolve_country("8.8.8.8"), None);
    assert!(matches!(
        resolver.try_resolve("8.8.8.8"),
        Err(GeoError::Lookup(LookupError::Other(_)))
    ));
    assert_eq!(stub.calls(), 2);
    assert_eq!(resolver.cache_size(), 0);
}

#[test]
fn test_invalid_address() {
    let dir = tempfile::tempdir().unwrap();
    let stub = StubProvider::new(&[]);
    let resolver = stub_resolver(dir.path(), GeoConfig::default(), &stub);

    assert_eq!(resolver.resolve_country("999.1.2.3"), None);
    assert_eq!(resolver.resolve_country("example.com"), None);
    assert_eq!(stub.calls(), 0);
    assert_eq!(resolver.cache_size(), 0);
}

#[test]
fn test_two_address_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let stub = StubProvider::new(&[("2001:db8::1", "DE"), ("8.8.8.8", "US")]);
    let resolver = stub_resolver(dir.path(), GeoConfig::default(), &stub);

    assert_eq!(
        resolver.resolve_from_two_addresses("8.8.8.8", "2001:db8::1").unwrap(),
        "US"
    );
    // Primary matched, fallback never queried
    assert_eq!(stub.calls(), 1);

    assert_eq!(
        resolver.resolve_from_two_addresses("192.0.2.9", "2001:db8::1").unwrap(),
        "DE"
    );
    assert_eq!(resolver.resolve_from_two_addresses("192.0.2.9", "::"), None);
}

#[test]
fn test_no_database_yields_none() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = IpResolver::new(GeoContext::new(
        GeoConfig::default().with_db_root(dir.path()),
    ));
    assert_eq!(resolver.resolve_country("8.8.8.8"), None);
    assert!(matches!(
        resolver.try_resolve("8.8.8.8"),
        Err(GeoError::NoDatabase { .. })
    ));
}

#[tokio::test]
async fn test_chunked_requires_preload_on_blocking_path() {
    let dir = tempfile::tempdir().unwrap();
    split_bytes("ip-country.mmdb", b"opaque bytes", &dir.path().join("chunks"), 4).unwrap();
    let stub = StubProvider::new(&[("8.8.8.8", "US")]);
    let provider = Arc::clone(&stub);
    let opener = move |_bytes: DatabaseBytes| -> Result<Arc<dyn LookupProvider>, GeoError> {
        Ok(provider.clone() as Arc<dyn LookupProvider>)
    };
    let ctx = GeoContext::with_opener(GeoConfig::default().with_db_root(dir.path()), opener);
    let resolver = IpResolver::new(ctx.clone());

    assert!(matches!(
        resolver.try_resolve("8.8.8.8"),
        Err(GeoError::NotPreloaded)
    ));
    assert_eq!(resolver.resolve_country("8.8.8.8"), None);
    assert_eq!(resolver.cache_size(), 0);

    // The async path loads on demand
    assert_eq!(resolver.resolve_country_async("8.8.8.8").await.unwrap(), "US");
    // ...after which the blocking path works too
    assert_eq!(resolver.resolve_country("8.8.8.8").unwrap(), "US");
    assert_eq!(stub.calls(), 1);
}

#[tokio::test]
async fn test_nested_format_from_chunks() {
    let iso = |code: &str| DataValue::map([("iso_code", DataValue::string(code))]);
    let mut writer = MmdbWriter::new(IpVersion::V6).with_database_type("GeoLite2-City");
    writer
        .insert_network(
            "81.2.69.0/24",
            DataValue::map([("country", iso("GB")), ("registered_country", iso("GB"))]),
        )
        .unwrap();
    writer
        .insert_network("2a02:ff0::/32", DataValue::map([("registered_country", iso("IT"))]))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    split_bytes(
        "GeoLite2-City.mmdb",
        &writer.build().unwrap(),
        &dir.path().join("chunks"),
        128,
    )
    .unwrap();

    let config = GeoConfig::default()
        .with_db_root(dir.path())
        .with_chunked_format(RecordFormat::Nested);
    let resolver = IpResolver::new(GeoContext::new(config));

    assert_eq!(resolver.resolve_country_async("81.2.69.160").await.unwrap(), "GB");
    assert_eq!(resolver.resolve_country_async("2a02:ff0::1").await.unwrap(), "IT");
    assert_eq!(resolver.resolve_country_async("8.8.8.8").await, None);
}

#[test]
fn test_nested_monolithic_file() {
    let mut writer = MmdbWriter::new(IpVersion::V6);
    writer
        .insert_network(
            "2001:db8::/32",
            DataValue::map([("country", DataValue::map([("iso_code", DataValue::string("nl"))]))]),
        )
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("GeoLite2-City.mmdb"), writer.build().unwrap()).unwrap();

    let resolver = IpResolver::new(GeoContext::new(
        GeoConfig::default().with_db_root(dir.path()),
    ));
    assert_eq!(resolver.resolve_country("2001:db8::42").unwrap(), "NL");
    let selection = resolver.context().loaded_selection().unwrap();
    assert_eq!(selection.format, RecordFormat::Nested);
    assert!(!selection.is_chunked());
}
