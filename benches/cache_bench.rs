use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use geoshard::{
    CountryCode, DataValue, GeoConfig, GeoContext, IpResolver, IpVersion, MmdbWriter, Resolution,
    ResolutionCache,
};
use rand::Rng;
use std::hint::black_box;
use std::time::Duration;

fn random_ips(count: usize, unique: usize) -> Vec<String> {
    let mut rng = rand::rng();
    let pool: Vec<String> = (0..unique.max(1))
        .map(|_| {
            format!(
                "{}.{}.{}.{}",
                rng.random_range(1..224u8),
                rng.random::<u8>(),
                rng.random::<u8>(),
                rng.random::<u8>()
            )
        })
        .collect();
    (0..count)
        .map(|_| pool[rng.random_range(0..pool.len())].clone())
        .collect()
}

/// Raw cache put/get cost at steady state
fn bench_cache_ops(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_ops");
    group.measurement_time(Duration::from_secs(5));

    let queries = random_ips(10_000, 20_000);
    let us = Resolution::Country(CountryCode::new("US").unwrap());

    for capacity in [1_000usize, 10_000] {
        group.throughput(Throughput::Elements(queries.len() as u64));
        group.bench_with_input(BenchmarkId::new("put_get", capacity), &capacity, |b, &cap| {
            let cache = ResolutionCache::new(cap);
            b.iter(|| {
                for ip in &queries {
                    if cache.get(ip).is_none() {
                        cache.put(ip, us.clone());
                    }
                }
                black_box(cache.len())
            });
        });
    }
    group.finish();
}

/// Resolver throughput against a small MMDB at different cache hit rates
fn bench_resolver_hit_rates(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolver_hit_rate");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(50);

    let mut writer = MmdbWriter::new(IpVersion::V6);
    for first in 1..224u32 {
        let code = if first % 2 == 0 { "US" } else { "DE" };
        writer
            .insert_network(
                &format!("{}.0.0.0/8", first),
                DataValue::map([("country_code", DataValue::string(code))]),
            )
            .unwrap();
    }
    let db = writer.build().unwrap();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("ip-country.mmdb"), db).unwrap();

    for hit_rate in [0usize, 50, 90, 99] {
        let total = 10_000;
        let unique = if hit_rate == 0 {
            total
        } else {
            (total * (100 - hit_rate)) / 100
        };
        let queries = random_ips(total, unique);

        group.throughput(Throughput::Elements(total as u64));
        group.bench_with_input(BenchmarkId::new("resolve", hit_rate), &queries, |b, queries| {
            let ctx = GeoContext::new(
                GeoConfig::default()
                    .with_db_root(dir.path())
                    .with_cache_capacity(unique),
            );
            let resolver = IpResolver::new(ctx);
            b.iter(|| {
                for ip in queries {
                    black_box(resolver.resolve_country(ip));
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cache_ops, bench_resolver_hit_rates);
criterion_main!(benches);
