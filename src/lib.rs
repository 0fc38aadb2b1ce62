//! Time-windowed Bloom filter over a shared bit-addressable key-value store.
//!
//! Answers "has key K been seen within the last T duration?" with no false
//! negatives and a bounded false-positive rate, without storing per-key
//! timestamps or the keys themselves.
//!
//! HowTo:
//!    * Buckets: time is split into fixed-width intervals of `resolution`;
//!      each interval gets its own fixed-size bloom filter, named by the
//!      interval's start timestamp.
//!    * No registry: bucket identity is a pure function of wall-clock time,
//!      so every call re-derives the buckets covering its window.
//!    * Expiry: every write refreshes the bucket's store-side time-to-live
//!      (`limit` + 1s); buckets age out on their own and the enumeration
//!      simply stops naming them.
//!
//! Insertion:
//!     * `add` hashes each key into k probe positions (two 32-bit hashes,
//!       Kirsch-Mitzenmacher double hashing) and sets those bits in every
//!       bucket covering the requested window, one batched round trip per
//!       bucket, all buckets concurrently.
//! Query:
//!     * `contains` reads the probed bits from every bucket covering the
//!       lookback window; a key is present if ANY bucket has all k bits set.
//! Deletion:
//!     * `delete` sweeps the covered buckets and atomically clears the key's
//!       bits wherever it reads as present. Best effort across buckets.
//!
//! The store itself is an external collaborator behind the [`BitStore`]
//! trait; [`InMemoryStore`] implements it for tests and embedding. Since
//! 32-bit hashes are used, a single bucket tops out at 2**32-1 bits.

mod error;
mod filter;
mod hash;
mod inmemory_store;
mod store;
mod timeseries;

pub use error::{FilterError, Result};
pub use filter::BloomFilter;
pub use hash::{hash_ap32, hash_fnv32, optimal_bit_count, optimal_hash_count};
pub use inmemory_store::InMemoryStore;
pub use store::{BitOp, BitStore};
pub use timeseries::{
    TimeSeriesBloomFilter, TimeSeriesConfig, TimeSeriesConfigBuilder,
    TimeSeriesConfigBuilderError,
};
