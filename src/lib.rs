#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

/// A key-value cache built on the direct-mapped table.
///
/// This module provides a `CacheMap` that stores `(key, value)` pairs in a
/// `CacheTable` keyed by the first element.
pub mod cache_map;

/// A value cache built on the direct-mapped table.
///
/// This module provides a `CacheSet` whose values are their own keys.
pub mod cache_set;

pub mod cache_table;
pub mod error;
pub mod hash;
pub mod policy;
pub mod storage;

pub use cache_map::CacheMap;
pub use cache_set::CacheSet;
pub use cache_table::CacheTable;
pub use cache_table::CacheTableBuilder;
pub use cache_table::Cursor;
pub use cache_table::Position;
pub use cache_table::TableStats;
pub use error::CacheTableError;
#[cfg(feature = "foldhash")]
pub use hash::FoldHashBuilder;
pub use hash::BuildJenkinsHasher;
pub use hash::JenkinsHasher;
pub use storage::Heap;
#[cfg(feature = "mmap")]
pub use storage::MmapAlloc;
pub use storage::TableAlloc;
