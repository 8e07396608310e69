//! Error types for the direct-mapped cache.
//!
//! Only construction and storing can fail. Lookups and erasures of absent
//! keys are not errors; they report `None`, `false` or a removal count of
//! zero.

use core::alloc::Layout;
use core::fmt;

/// Error returned by fallible [`CacheTable`](crate::CacheTable) operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTableError {
    /// The requested capacity cannot be rounded to a power of two, or the
    /// slot array would exceed `isize::MAX` bytes.
    CapacityOverflow,
    /// The backing storage could not be acquired.
    AllocFailed {
        /// Layout of the failed slot array allocation.
        layout: Layout,
    },
    /// A value whose key equals the table's empty key was offered for
    /// storage. The empty key marks unused slots and can never be stored.
    SentinelKey,
}

impl fmt::Display for CacheTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheTableError::CapacityOverflow => f.write_str("cache table capacity overflow"),
            CacheTableError::AllocFailed { layout } => write!(
                f,
                "failed to allocate {} bytes (align {}) for cache table storage",
                layout.size(),
                layout.align()
            ),
            CacheTableError::SentinelKey => {
                f.write_str("the empty key is reserved and cannot be stored")
            }
        }
    }
}

impl core::error::Error for CacheTableError {}
