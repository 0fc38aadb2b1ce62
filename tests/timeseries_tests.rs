mod common;

use crate::common::test_utils::{init_tracing, timeseries_filter};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use timeseries_bloom_rs::{
    BitOp, BitStore, FilterError, InMemoryStore, Result, TimeSeriesBloomFilter,
    TimeSeriesConfigBuilder,
};

fn fixed_now() -> DateTime<Utc> {
    DateTime::from_timestamp_micros(1_700_000_000_000_000)
        .expect("valid timestamp")
}

#[tokio::test]
async fn test_timeseries_add_and_contains() {
    let filter = timeseries_filter(
        "test_timed_bloomfilter",
        Duration::from_secs(1),
        Duration::from_secs(10),
    );

    filter
        .add(&[
            "three", "four", "five", "six", "seven", "eight", "nine", "ten",
        ])
        .await
        .unwrap();

    let res = filter
        .contains(&["ten", "two", "five", "eleven"])
        .await
        .unwrap();

    assert!(res["ten"]);
    assert!(res["five"]);
    assert!(!res["eleven"]);
    assert!(!res["two"]);
}

#[tokio::test]
async fn test_timeseries_delete() {
    let filter = timeseries_filter(
        "test_timed_bloomfilter_delete",
        Duration::from_secs(1),
        Duration::from_secs(10),
    );

    filter.add(&["ten"]).await.unwrap();
    assert!(
        filter
            .contains(&["ten", "five", "two", "eleven"])
            .await
            .unwrap()["ten"]
    );

    filter.delete("ten").await.unwrap();
    assert!(
        !filter
            .contains(&["ten", "five", "two", "eleven"])
            .await
            .unwrap()["ten"]
    );
}

#[tokio::test]
async fn test_window_membership_at_fixed_times() {
    let filter = timeseries_filter(
        "fixed_time_window",
        Duration::from_secs(1),
        Duration::from_secs(10),
    );
    let now = fixed_now();
    let limit = Duration::from_secs(10);

    filter
        .add_at(&["seen"], Duration::from_secs(1), now)
        .await
        .unwrap();

    // visible immediately and right up to the edge of the window
    let res = filter.contains_at(&["seen"], limit, now).await.unwrap();
    assert!(res["seen"]);
    let res = filter
        .contains_at(&["seen"], limit, now + TimeDelta::seconds(9))
        .await
        .unwrap();
    assert!(res["seen"]);

    // one bucket past the window the entry's bucket is no longer covered
    let res = filter
        .contains_at(&["seen"], limit, now + TimeDelta::seconds(11))
        .await
        .unwrap();
    assert!(!res["seen"]);
}

#[tokio::test]
async fn test_backdated_add_covers_every_bucket() {
    let filter = timeseries_filter(
        "backdated_add",
        Duration::from_secs(1),
        Duration::from_secs(10),
    );
    let now = fixed_now();

    // write the whole lookback window at once
    filter
        .add_at(&["old"], Duration::from_secs(10), now)
        .await
        .unwrap();

    // a narrow query against a mid-window instant still finds it
    let res = filter
        .contains_at(
            &["old"],
            Duration::from_secs(1),
            now - TimeDelta::seconds(5),
        )
        .await
        .unwrap();
    assert!(res["old"]);
}

#[tokio::test]
async fn test_delete_sweeps_the_whole_window() {
    let filter = timeseries_filter(
        "window_delete",
        Duration::from_secs(1),
        Duration::from_secs(10),
    );
    let now = fixed_now();
    let limit = Duration::from_secs(10);

    filter.add_at(&["ten"], limit, now).await.unwrap();
    assert!(filter.contains_at(&["ten"], limit, now).await.unwrap()["ten"]);

    filter.delete_at("ten", limit, now).await.unwrap();
    assert!(!filter.contains_at(&["ten"], limit, now).await.unwrap()["ten"]);
}

#[tokio::test]
async fn test_scenario_millisecond_window() {
    let filter = timeseries_filter(
        "scenario",
        Duration::from_millis(1),
        Duration::from_millis(10),
    );

    filter.add(&["test_value"]).await.unwrap();
    let res = filter.contains(&["test_value"]).await.unwrap();
    assert!(res["test_value"]);

    tokio::time::sleep(Duration::from_millis(15)).await;
    let res = filter.contains(&["test_value"]).await.unwrap();
    assert!(!res["test_value"]);
}

#[tokio::test]
async fn test_entry_decays_within_bounded_delay() {
    let filter = timeseries_filter(
        "decay",
        Duration::from_millis(1),
        Duration::from_millis(10),
    );
    // allow for scheduling jitter in storing/timer resolution
    let slack = Duration::from_millis(100);

    filter.add(&["test_value"]).await.unwrap();
    let start = Instant::now();

    // the filter must not keep reporting the value past the window
    while filter.contains(&["test_value"]).await.unwrap()["test_value"] {
        assert!(
            start.elapsed() < Duration::from_millis(10) + slack,
            "value outlived the lookback window"
        );
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert!(!filter.contains(&["test_value"]).await.unwrap()["test_value"]);
}

#[test]
fn test_configuration_is_validated_before_store_use() {
    init_tracing();
    let store = Arc::new(InMemoryStore::new());

    let cases = [
        TimeSeriesConfigBuilder::default()
            .base_name("bad_capacity")
            .capacity(0_usize),
        TimeSeriesConfigBuilder::default()
            .base_name("bad_error_rate")
            .error_rate(0.0),
        TimeSeriesConfigBuilder::default()
            .base_name("bad_error_rate_high")
            .error_rate(1.5),
        TimeSeriesConfigBuilder::default()
            .base_name("bad_resolution")
            .resolution(Duration::ZERO),
        TimeSeriesConfigBuilder::default()
            .base_name("limit_below_resolution")
            .resolution(Duration::from_secs(10))
            .limit(Duration::from_secs(1)),
    ];

    for builder in cases {
        let config = builder.build().expect("builder should accept raw values");
        let result = TimeSeriesBloomFilter::new(store.clone(), config);
        assert!(matches!(result, Err(FilterError::InvalidConfig(_))));
    }
}

/// Store stub whose every round trip fails, for error-path coverage.
#[derive(Clone)]
struct FailingStore;

#[async_trait]
impl BitStore for FailingStore {
    async fn get_bit(&self, _vector: &str, _offset: u64) -> Result<bool> {
        Err(FilterError::Connector("injected outage".to_string()))
    }

    async fn set_bit(
        &self,
        _vector: &str,
        _offset: u64,
        _value: bool,
    ) -> Result<bool> {
        Err(FilterError::Connector("injected outage".to_string()))
    }

    async fn batch(&self, _ops: &[BitOp]) -> Result<Vec<bool>> {
        Err(FilterError::Connector("injected outage".to_string()))
    }

    async fn transaction(&self, _ops: &[BitOp]) -> Result<Vec<bool>> {
        Err(FilterError::Connector("injected outage".to_string()))
    }

    async fn expire(&self, _vector: &str, _ttl: Duration) -> Result<()> {
        Err(FilterError::Connector("injected outage".to_string()))
    }

    async fn flush_all(&self) -> Result<()> {
        Err(FilterError::Connector("injected outage".to_string()))
    }
}

fn failing_filter() -> TimeSeriesBloomFilter<FailingStore> {
    let config = TimeSeriesConfigBuilder::default()
        .base_name("failing")
        .capacity(1000_usize)
        .error_rate(0.01)
        .resolution(Duration::from_secs(1))
        .limit(Duration::from_secs(10))
        .build()
        .expect("Failed to build config");
    TimeSeriesBloomFilter::new(FailingStore, config)
        .expect("Failed to create filter")
}

#[tokio::test]
async fn test_multi_bucket_failure_surfaces_as_partial_batch() {
    let filter = failing_filter();
    let now = fixed_now();

    // fan-out across ten buckets wraps the first error
    let err = filter
        .add_at(&["x"], Duration::from_secs(10), now)
        .await
        .unwrap_err();
    assert!(matches!(err, FilterError::PartialBatch(_)));

    let err = filter
        .contains_at(&["x"], Duration::from_secs(10), now)
        .await
        .unwrap_err();
    assert!(matches!(err, FilterError::PartialBatch(_)));
}

#[tokio::test]
async fn test_single_bucket_failure_propagates_directly() {
    let filter = failing_filter();
    let now = fixed_now();

    // default add touches only the current bucket: no partial semantics
    let err = filter
        .add_at(&["x"], Duration::from_secs(1), now)
        .await
        .unwrap_err();
    assert!(matches!(err, FilterError::Connector(_)));

    // the delete sweep is sequential, its first read fails as-is
    let err = filter
        .delete_at("x", Duration::from_secs(10), now)
        .await
        .unwrap_err();
    assert!(matches!(err, FilterError::Connector(_)));
}
