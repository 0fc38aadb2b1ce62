use crate::error::{FilterError, Result};
use crate::filter::BloomFilter;
use crate::hash::{optimal_bit_count, optimal_hash_count};
use crate::store::BitStore;
use chrono::{DateTime, Utc};
use derive_builder::Builder;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Configuration for a [`TimeSeriesBloomFilter`].
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(pattern = "owned", setter(into))]
pub struct TimeSeriesConfig {
    /// Namespace prefix for every bucket's bit vector in the store
    pub base_name: String,

    /// Expected number of distinct keys within one bucket
    #[builder(default = "1_000_000")]
    pub capacity: usize,

    /// Target false positive rate at that capacity (between 0 and 1)
    #[builder(default = "0.01")]
    pub error_rate: f64,

    /// Width of one time bucket
    #[builder(default = "Duration::from_secs(60)")]
    pub resolution: Duration,

    /// Total lookback window a membership query honors
    #[builder(default = "Duration::from_secs(600)")]
    pub limit: Duration,
}

impl TimeSeriesConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(FilterError::InvalidConfig(
                "Capacity must be greater than 0".to_string(),
            ));
        }
        if self.error_rate <= 0.0 || self.error_rate >= 1.0 {
            return Err(FilterError::InvalidConfig(
                "Error rate must be between 0 and 1".to_string(),
            ));
        }
        if self.resolution.is_zero() {
            return Err(FilterError::InvalidConfig(
                "Time resolution must be greater than 0".to_string(),
            ));
        }
        if self.limit < self.resolution {
            return Err(FilterError::InvalidConfig(
                "Time limit must be at least one resolution".to_string(),
            ));
        }
        Ok(())
    }
}

/// Sliding-time-window membership filter composed of rotating bloom filter
/// buckets, one per `resolution`-wide interval of wall-clock time.
///
/// There is no bucket registry: a bucket's identity is a pure function of
/// time, so every operation re-derives the buckets covering its window
/// from `now`. Each bucket is a [`BloomFilter`] named
/// `{base_name}|{bucket_start_iso}` whose time-to-live is refreshed on
/// every write; buckets age out store-side and the enumeration simply
/// stops naming them, so nothing is ever explicitly pruned.
pub struct TimeSeriesBloomFilter<S> {
    store: S,
    config: TimeSeriesConfig,
    bit_count: usize,
    hash_count: usize,
}

impl<S: BitStore + Clone> TimeSeriesBloomFilter<S> {
    /// Validates the configuration and derives the per-bucket sizing,
    /// before any store interaction. The store handle is borrowed, never
    /// reconfigured.
    pub fn new(store: S, config: TimeSeriesConfig) -> Result<Self> {
        config.validate()?;
        let bit_count = optimal_bit_count(config.capacity, config.error_rate);
        let hash_count = optimal_hash_count(bit_count, config.capacity);
        Ok(Self {
            store,
            config,
            bit_count,
            hash_count,
        })
    }

    pub fn config(&self) -> &TimeSeriesConfig {
        &self.config
    }

    /// Bits per bucket, shared by every bucket.
    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    /// Probes per key, shared by every bucket.
    pub fn hash_count(&self) -> usize {
        self.hash_count
    }

    /// Number of buckets needed to span the whole lookback window.
    pub fn bucket_count(&self) -> usize {
        let width = self.config.resolution.as_micros();
        self.config.limit.as_micros().div_ceil(width) as usize
    }

    /// Record keys as seen now, in the bucket(s) covering the last
    /// `resolution`.
    pub async fn add(&self, keys: &[&str]) -> Result<()> {
        self.add_at(keys, self.config.resolution, Utc::now()).await
    }

    /// Record keys into every bucket covering `within`, backdated against
    /// an explicit `now`.
    ///
    /// Bucket writes fan out concurrently and are joined; on failure the
    /// first error wins and writes already applied to other buckets stand.
    /// Safe to retry wholesale, since adds are idempotent.
    pub async fn add_at(
        &self,
        keys: &[&str],
        within: Duration,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let buckets = self.buckets_for(within, now)?;
        // buckets must outlive their window by a little so a query at the
        // edge of `limit` still sees them
        let ttl = self.config.limit + Duration::from_secs(1);
        debug!(
            base = %self.config.base_name,
            buckets = buckets.len(),
            keys = keys.len(),
            "fan-out add"
        );
        let writes = buckets.iter().map(|bucket| bucket.add(keys, Some(ttl)));
        try_join_all(writes)
            .await
            .map_err(|e| fan_out_failure(e, buckets.len()))?;
        Ok(())
    }

    /// Has each key been seen within the last `limit`?
    pub async fn contains(
        &self,
        keys: &[&str],
    ) -> Result<HashMap<String, bool>> {
        self.contains_at(keys, self.config.limit, Utc::now()).await
    }

    /// Membership over an explicit window: a key is present if ANY bucket
    /// covering `within` reports it present.
    pub async fn contains_at(
        &self,
        keys: &[&str],
        within: Duration,
        now: DateTime<Utc>,
    ) -> Result<HashMap<String, bool>> {
        let buckets = self.buckets_for(within, now)?;
        let reads = buckets.iter().map(|bucket| bucket.contains(keys));
        let per_bucket = try_join_all(reads)
            .await
            .map_err(|e| fan_out_failure(e, buckets.len()))?;

        let mut merged: HashMap<String, bool> =
            keys.iter().map(|key| ((*key).to_string(), false)).collect();
        for bucket_result in per_bucket {
            for (key, present) in bucket_result {
                if present {
                    merged.insert(key, true);
                }
            }
        }
        Ok(merged)
    }

    /// Remove a key wherever it currently reads as present within `limit`.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.delete_at(key, self.config.limit, Utc::now()).await
    }

    /// Best-effort sweep over the buckets covering `within`: each bucket
    /// is checked first (clearing an untouched bucket would create it in
    /// the store) and cleared atomically only where the key reads as
    /// present. Buckets do not track which one held an insertion, and a
    /// key can straddle a bucket boundary during the sweep, so callers
    /// must tolerate a delete that a racing add makes visible again.
    /// Not idempotent under concurrent writers.
    pub async fn delete_at(
        &self,
        key: &str,
        within: Duration,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for bucket in self.buckets_for(within, now)? {
            let membership = bucket.contains(&[key]).await?;
            if membership.get(key).copied().unwrap_or(false) {
                debug!(bucket = bucket.name(), key, "clearing key from bucket");
                bucket.delete(key).await?;
            }
        }
        Ok(())
    }

    /// Buckets covering the window `[now - within, now]`, most recent
    /// first. Bucket boundaries are aligned down to multiples of the
    /// resolution, so the newest bucket is the one containing `now`.
    fn buckets_for(
        &self,
        within: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<BloomFilter<S>>> {
        let width_us = self.config.resolution.as_micros() as i64;
        let anchor_us = now.timestamp_micros().div_euclid(width_us) * width_us;
        let count = within
            .as_micros()
            .div_ceil(self.config.resolution.as_micros()) as i64;

        (0..count)
            .map(|i| {
                let start_us = anchor_us - i * width_us;
                let start = DateTime::from_timestamp_micros(start_us)
                    .ok_or_else(|| {
                        FilterError::InvalidConfig(format!(
                            "Bucket timestamp out of range: {start_us}us"
                        ))
                    })?;
                BloomFilter::new(
                    self.store.clone(),
                    bucket_name(&self.config.base_name, start),
                    self.bit_count,
                    self.hash_count,
                )
            })
            .collect()
    }
}

fn fan_out_failure(err: FilterError, bucket_count: usize) -> FilterError {
    if bucket_count > 1 {
        FilterError::PartialBatch(Box::new(err))
    } else {
        err
    }
}

fn bucket_name(base_name: &str, start: DateTime<Utc>) -> String {
    format!("{}|{}", base_name, start.format("%Y-%m-%dT%H:%M:%S%.6f"))
}

impl<S> std::fmt::Debug for TimeSeriesBloomFilter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TimeSeriesBloomFilter {{ base_name: {}, capacity: {}, error_rate: {}, \
             resolution: {:?}, limit: {:?}, bit_count: {}, hash_count: {} }}",
            self.config.base_name,
            self.config.capacity,
            self.config.error_rate,
            self.config.resolution,
            self.config.limit,
            self.bit_count,
            self.hash_count
        )
    }
}
