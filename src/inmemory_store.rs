use crate::error::{FilterError, Result};
use crate::store::{BitOp, BitStore};
use async_trait::async_trait;
use bitvec::{order::Lsb0, vec::BitVec};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

struct Vector {
    bits: BitVec<usize, Lsb0>,
    deadline: Option<Instant>,
}

impl Vector {
    fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| deadline <= now)
    }
}

/// In-memory [`BitStore`] with the same implicit-creation and expiry
/// semantics as a real bit-addressable store.
///
/// Vectors come into existence on their first `SetBit` and vanish lazily
/// once their time-to-live elapses; reads against a missing or expired
/// vector see all-zero bits. Everything runs under one mutex, so `batch`
/// and `transaction` are both atomic here; the distinction only bites on
/// real backends.
#[derive(Default)]
pub struct InMemoryStore {
    vectors: Mutex<HashMap<String, Vector>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Vector>>> {
        self.vectors
            .lock()
            .map_err(|e| FilterError::Connector(format!("Lock error: {e}")))
    }

    fn apply(
        vectors: &mut HashMap<String, Vector>,
        ops: &[BitOp],
    ) -> Vec<bool> {
        let now = Instant::now();
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                BitOp::GetBit { vector, offset } => {
                    prune_expired(vectors, vector, now);
                    let bit = vectors
                        .get(vector)
                        .and_then(|v| v.bits.get(*offset as usize))
                        .is_some_and(|bit| *bit);
                    results.push(bit);
                }
                BitOp::SetBit {
                    vector,
                    offset,
                    value,
                } => {
                    prune_expired(vectors, vector, now);
                    let entry =
                        vectors.entry(vector.clone()).or_insert_with(|| Vector {
                            bits: BitVec::new(),
                            deadline: None,
                        });
                    let offset = *offset as usize;
                    if offset >= entry.bits.len() {
                        entry.bits.resize(offset + 1, false);
                    }
                    let previous = entry.bits[offset];
                    entry.bits.set(offset, *value);
                    results.push(previous);
                }
                BitOp::Expire { vector, ttl } => {
                    prune_expired(vectors, vector, now);
                    if let Some(entry) = vectors.get_mut(vector) {
                        entry.deadline = Some(now + *ttl);
                    }
                    results.push(false);
                }
            }
        }
        results
    }
}

fn prune_expired(
    vectors: &mut HashMap<String, Vector>,
    name: &str,
    now: Instant,
) {
    if vectors.get(name).is_some_and(|v| v.expired(now)) {
        debug!(vector = name, "dropping expired bit vector");
        vectors.remove(name);
    }
}

#[async_trait]
impl BitStore for InMemoryStore {
    async fn get_bit(&self, vector: &str, offset: u64) -> Result<bool> {
        let ops = [BitOp::GetBit {
            vector: vector.to_string(),
            offset,
        }];
        Ok(self.batch(&ops).await?[0])
    }

    async fn set_bit(
        &self,
        vector: &str,
        offset: u64,
        value: bool,
    ) -> Result<bool> {
        let ops = [BitOp::SetBit {
            vector: vector.to_string(),
            offset,
            value,
        }];
        Ok(self.batch(&ops).await?[0])
    }

    async fn batch(&self, ops: &[BitOp]) -> Result<Vec<bool>> {
        let mut vectors = self.lock()?;
        Ok(Self::apply(&mut vectors, ops))
    }

    async fn transaction(&self, ops: &[BitOp]) -> Result<Vec<bool>> {
        // the whole batch already runs under one lock acquisition
        self.batch(ops).await
    }

    async fn expire(&self, vector: &str, ttl: Duration) -> Result<()> {
        let ops = [BitOp::Expire {
            vector: vector.to_string(),
            ttl,
        }];
        self.batch(&ops).await?;
        Ok(())
    }

    async fn flush_all(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}
