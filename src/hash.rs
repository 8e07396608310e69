//! Hash function policies.
//!
//! [`BuildJenkinsHasher`] is the zero-configuration default. It hashes byte
//! strings with Bob Jenkins' one-at-a-time mixer and passes fixed-width
//! integers through unchanged, so an integer key `k` lands in bucket
//! `k & mask`. Compound keys (tuples, structs) combine each written word in
//! order.
//!
//! Any [`BuildHasher`] works as a table policy. With the `foldhash` feature,
//! [`FoldHashBuilder`] is available as a faster general-purpose alternative
//! whose distribution does not depend on key structure.

use core::hash::BuildHasher;
use core::hash::Hasher;

/// A fast, deterministic `BuildHasher` from the `foldhash` crate.
#[cfg(feature = "foldhash")]
pub type FoldHashBuilder = foldhash::fast::FixedState;

const FOLD_MULTIPLIER: u64 = 0x9e37_79b9_7f4a_7c15;

/// Bob Jenkins' one-at-a-time hash of `bytes`.
#[inline]
pub fn one_at_a_time(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 0;
    for &b in bytes {
        hash = hash.wrapping_add(b as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

/// The default hasher.
///
/// A fresh hasher (seed 0) that receives a single integer write finishes to
/// that integer. Byte writes are mixed with [`one_at_a_time`]. Successive
/// writes are folded together with a multiply-xor step, so `(a, b)` and
/// `(b, a)` hash differently and a trailing length or terminator word does
/// not mask the low bits of what came before.
///
/// This is not a cryptographic or DoS-resistant hash. Because a direct-mapped
/// table has no probing fallback, keys whose low bits repeat (for example
/// multiples of the bucket count) collide and evict each other.
#[derive(Debug, Clone, Copy, Default)]
pub struct JenkinsHasher {
    hash: u64,
}

impl JenkinsHasher {
    /// Creates a hasher whose state starts at `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self { hash: seed }
    }

    #[inline(always)]
    fn combine(&mut self, word: u64) {
        self.hash = self.hash.wrapping_mul(FOLD_MULTIPLIER) ^ word;
    }
}

impl Hasher for JenkinsHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.combine(one_at_a_time(bytes) as u64);
    }

    #[inline]
    fn write_u8(&mut self, n: u8) {
        self.combine(n as u64);
    }

    #[inline]
    fn write_u16(&mut self, n: u16) {
        self.combine(n as u64);
    }

    #[inline]
    fn write_u32(&mut self, n: u32) {
        self.combine(n as u64);
    }

    #[inline]
    fn write_u64(&mut self, n: u64) {
        self.combine(n);
    }

    #[inline]
    fn write_u128(&mut self, n: u128) {
        self.combine(n as u64);
        self.combine((n >> 64) as u64);
    }

    #[inline]
    fn write_usize(&mut self, n: usize) {
        self.combine(n as u64);
    }
}

/// Builds [`JenkinsHasher`]s. The default seed is 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildJenkinsHasher {
    seed: u64,
}

impl BuildJenkinsHasher {
    /// Creates a builder whose hashers start from `seed`.
    ///
    /// A non-zero seed disables the identity mapping for integer keys.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

impl BuildHasher for BuildJenkinsHasher {
    type Hasher = JenkinsHasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        JenkinsHasher::with_seed(self.seed)
    }
}
