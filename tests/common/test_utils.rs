use std::sync::{Arc, Once};
use std::time::Duration;
use timeseries_bloom_rs::{
    BloomFilter, InMemoryStore, TimeSeriesBloomFilter, TimeSeriesConfigBuilder,
};

static TRACING: Once = Once::new();

/// Route filter logs through tracing-subscriber; filter with RUST_LOG.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env(),
            )
            .try_init();
    });
}

/// Single filter over a fresh in-memory store: 8 Kbit vector, 4 probes
/// per key, plenty for a handful of test keys.
#[allow(dead_code)]
pub fn single_filter(name: &str) -> BloomFilter<Arc<InMemoryStore>> {
    init_tracing();
    BloomFilter::new(Arc::new(InMemoryStore::new()), name, 1024 * 8, 4)
        .expect("Failed to create test BloomFilter")
}

/// Time-bucketed filter over a fresh in-memory store.
#[allow(dead_code)]
pub fn timeseries_filter(
    base_name: &str,
    resolution: Duration,
    limit: Duration,
) -> TimeSeriesBloomFilter<Arc<InMemoryStore>> {
    init_tracing();
    let config = TimeSeriesConfigBuilder::default()
        .base_name(base_name)
        .capacity(1000_usize)
        .error_rate(0.01)
        .resolution(resolution)
        .limit(limit)
        .build()
        .expect("Failed to build test TimeSeriesConfig");
    TimeSeriesBloomFilter::new(Arc::new(InMemoryStore::new()), config)
        .expect("Failed to create test TimeSeriesBloomFilter")
}
