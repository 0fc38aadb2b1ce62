use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// One operation inside a batched store round trip.
///
/// `vector` is the name of a bit vector inside the store; vectors are
/// created implicitly by the first `SetBit` against their name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BitOp {
    /// Read one bit. Reads against a never-written vector yield 0.
    GetBit { vector: String, offset: u64 },
    /// Write one bit, yielding its previous value.
    SetBit {
        vector: String,
        offset: u64,
        value: bool,
    },
    /// Set the whole vector's time-to-live.
    Expire { vector: String, ttl: Duration },
}

/// Contract for the bit-addressable key-value store the filters run on.
///
/// A filter with ~7 probes checked for 500 keys is 3500 bit operations;
/// throughput and latency both live or die on `batch` turning those into a
/// single pipelined round trip instead of 3500 calls.
#[async_trait]
pub trait BitStore: Send + Sync {
    /// Read a single bit.
    async fn get_bit(&self, vector: &str, offset: u64) -> Result<bool>;

    /// Write a single bit, returning the previous value.
    async fn set_bit(&self, vector: &str, offset: u64, value: bool)
    -> Result<bool>;

    /// Execute many operations in one round trip. Results come back in
    /// submission order: the read bit for `GetBit`, the previous bit for
    /// `SetBit`, `false` for `Expire`.
    async fn batch(&self, ops: &[BitOp]) -> Result<Vec<bool>>;

    /// Like [`BitStore::batch`] but all-or-nothing: concurrent `batch` or
    /// `transaction` calls observe either none or all of these writes.
    async fn transaction(&self, ops: &[BitOp]) -> Result<Vec<bool>>;

    /// Set a vector's time-to-live; a no-op for vectors that do not exist.
    async fn expire(&self, vector: &str, ttl: Duration) -> Result<()>;

    /// Drop every vector. Test and benchmark utility only.
    async fn flush_all(&self) -> Result<()>;
}

// Shared handles satisfy the store bound, so filters can hold a cheap
// clone of an externally owned connection.
#[async_trait]
impl<T: BitStore + ?Sized> BitStore for Arc<T> {
    async fn get_bit(&self, vector: &str, offset: u64) -> Result<bool> {
        (**self).get_bit(vector, offset).await
    }

    async fn set_bit(
        &self,
        vector: &str,
        offset: u64,
        value: bool,
    ) -> Result<bool> {
        (**self).set_bit(vector, offset, value).await
    }

    async fn batch(&self, ops: &[BitOp]) -> Result<Vec<bool>> {
        (**self).batch(ops).await
    }

    async fn transaction(&self, ops: &[BitOp]) -> Result<Vec<bool>> {
        (**self).transaction(ops).await
    }

    async fn expire(&self, vector: &str, ttl: Duration) -> Result<()> {
        (**self).expire(vector, ttl).await
    }

    async fn flush_all(&self) -> Result<()> {
        (**self).flush_all().await
    }
}
