//! Hash pair and sizing math shared by every filter.
//!
//! The two string hashes below are part of the storage contract, not an
//! implementation detail: bit vectors written by one process are queried by
//! another, so both sides must agree bit-for-bit. Both hashes use 32-bit
//! unsigned arithmetic with wraparound on overflow and walk the key one
//! Unicode code point at a time.
//!
//! See <http://www.partow.net/programming/hashfunctions/index.html> for the
//! hash family these come from.

/// FNV-style hash: start at 0, multiply by the FNV prime, XOR in the
/// code point.
pub fn hash_fnv32(key: &str) -> u32 {
    const FNV_PRIME: u32 = 0x811C_9DC5;
    let mut hash: u32 = 0;
    for ch in key.chars() {
        hash = hash.wrapping_mul(FNV_PRIME) ^ (ch as u32);
    }
    hash
}

/// AP-style hash: alternates two mixing steps on even/odd character
/// positions.
pub fn hash_ap32(key: &str) -> u32 {
    let mut hash: u32 = 0xAAAA_AAAA;
    for (i, ch) in key.chars().enumerate() {
        let ch = ch as u32;
        if i & 1 == 0 {
            hash ^= hash.wrapping_shl(7) ^ ch.wrapping_mul(hash >> 3);
        } else {
            hash ^= !(hash.wrapping_shl(11).wrapping_add(ch) ^ (hash >> 5));
        }
    }
    hash
}

/// Number of bits needed to hold `capacity` distinct keys at the target
/// false positive rate: `ceil(-capacity * ln(e) / ln(2)^2)`.
pub fn optimal_bit_count(capacity: usize, error_rate: f64) -> usize {
    let ln2 = std::f64::consts::LN_2;
    ((-(capacity as f64) * error_rate.ln()) / (ln2 * ln2)).ceil() as usize
}

/// Number of probe positions per key for a vector of `bit_count` bits:
/// `ceil(bit_count / capacity * ln(2))`.
pub fn optimal_hash_count(bit_count: usize, capacity: usize) -> usize {
    ((bit_count as f64 / capacity as f64) * std::f64::consts::LN_2).ceil()
        as usize
}
