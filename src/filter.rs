use crate::error::{FilterError, Result};
use crate::hash::{hash_ap32, hash_fnv32};
use crate::store::{BitOp, BitStore};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// A single fixed-size bloom filter backed by one named bit vector in the
/// store.
///
/// The filter owns no bits itself; `name` is the storage location and the
/// backing vector is created by the store on the first write. All
/// operations are batched: one store round trip regardless of how many
/// keys are passed.
pub struct BloomFilter<S> {
    store: S,
    name: String,
    bit_count: usize,
    hash_count: usize,
}

impl<S: BitStore> BloomFilter<S> {
    pub fn new(
        store: S,
        name: impl Into<String>,
        bit_count: usize,
        hash_count: usize,
    ) -> Result<Self> {
        if bit_count == 0 {
            return Err(FilterError::InvalidConfig(
                "Bit count must be greater than 0".to_string(),
            ));
        }
        if hash_count == 0 {
            return Err(FilterError::InvalidConfig(
                "Hash count must be greater than 0".to_string(),
            ));
        }
        // probe offsets are derived with 32-bit arithmetic
        if bit_count > u32::MAX as usize {
            return Err(FilterError::InvalidConfig(format!(
                "Bit count {bit_count} exceeds the 32-bit addressing limit"
            )));
        }
        Ok(Self {
            store,
            name: name.into(),
            bit_count,
            hash_count,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bit_count(&self) -> usize {
        self.bit_count
    }

    pub fn hash_count(&self) -> usize {
        self.hash_count
    }

    /// Probe positions for a key, derived from two base hashes as
    /// described by Kirsch & Mitzenmacher:
    /// <https://www.eecs.harvard.edu/~michaelm/postscripts/tr-02-05.pdf>
    ///
    /// Every offset lands in `[0, bit_count)`.
    pub fn probe_offsets(&self, key: &str) -> Vec<u32> {
        let h1 = hash_fnv32(key);
        let h2 = hash_ap32(key);
        (0..self.hash_count as u32)
            .map(|i| h1.wrapping_add(i.wrapping_mul(h2)) % self.bit_count as u32)
            .collect()
    }

    /// Set every probed bit for every key in one batched write, refreshing
    /// the vector's time-to-live in the same round trip when `ttl` is
    /// given.
    ///
    /// The batch is deliberately not transactional: bits only move 0 -> 1
    /// here, so a `contains` racing a half-applied add sees at worst a
    /// transient false negative, never a false positive.
    pub async fn add(&self, keys: &[&str], ttl: Option<Duration>) -> Result<()> {
        self.write_keys(keys, true, ttl, false).await
    }

    /// Batched membership check. A key is present iff all of its probed
    /// bits read 1. Pure read, no side effects.
    pub async fn contains(&self, keys: &[&str]) -> Result<HashMap<String, bool>> {
        let mut ops = Vec::with_capacity(keys.len() * self.hash_count);
        for key in keys {
            for offset in self.probe_offsets(key) {
                ops.push(BitOp::GetBit {
                    vector: self.name.clone(),
                    offset: u64::from(offset),
                });
            }
        }
        debug!(
            filter = %self.name,
            keys = keys.len(),
            ops = ops.len(),
            "batched membership read"
        );
        let bits = self.store.batch(&ops).await?;

        // results come back in submission order, hash_count bits per key
        Ok(keys
            .iter()
            .zip(bits.chunks(self.hash_count))
            .map(|(key, probes)| {
                ((*key).to_string(), probes.iter().all(|&bit| bit))
            })
            .collect())
    }

    /// Clear every probed bit for the key.
    ///
    /// A delete is just an add with value 0, but it must run as one
    /// atomic transaction so a concurrent `contains` observes the key
    /// fully set or fully cleared, never a mix.
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.write_keys(&[key], false, None, true).await
    }

    async fn write_keys(
        &self,
        keys: &[&str],
        value: bool,
        ttl: Option<Duration>,
        atomic: bool,
    ) -> Result<()> {
        let mut ops = Vec::with_capacity(keys.len() * self.hash_count + 1);
        for key in keys {
            for offset in self.probe_offsets(key) {
                ops.push(BitOp::SetBit {
                    vector: self.name.clone(),
                    offset: u64::from(offset),
                    value,
                });
            }
        }
        if let Some(ttl) = ttl {
            ops.push(BitOp::Expire {
                vector: self.name.clone(),
                ttl,
            });
        }
        debug!(
            filter = %self.name,
            keys = keys.len(),
            ops = ops.len(),
            value,
            atomic,
            "batched bit write"
        );
        if atomic {
            self.store.transaction(&ops).await?;
        } else {
            self.store.batch(&ops).await?;
        }
        Ok(())
    }
}

impl<S> std::fmt::Debug for BloomFilter<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BloomFilter {{ name: {}, bit_count: {}, hash_count: {} }}",
            self.name, self.bit_count, self.hash_count
        )
    }
}
