//! Backing-storage strategies for the slot array.
//!
//! A table acquires its slot array exactly once, when it is built, and
//! releases it when dropped. The strategy only decides where the memory comes
//! from; table behavior is identical for every strategy.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::error::CacheTableError;

/// Acquires and releases the slot array of a table.
///
/// # Safety
///
/// `allocate` must return a pointer to a block of at least `layout.size()`
/// bytes aligned to `layout.align()`, valid for reads and writes until it is
/// passed back to `deallocate` with the same layout. The table never calls
/// either method with a zero-sized layout.
pub unsafe trait TableAlloc {
    /// Acquires a block for `layout`.
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, CacheTableError>;

    /// Releases a block.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this allocator with the
    /// same `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The global heap allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Heap;

// SAFETY: Delegates to the global allocator, which upholds the contract.
unsafe impl TableAlloc for Heap {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, CacheTableError> {
        debug_assert!(layout.size() != 0);
        // SAFETY: The table never requests a zero-sized layout.
        let raw = unsafe { alloc::alloc::alloc(layout) };
        NonNull::new(raw).ok_or(CacheTableError::AllocFailed { layout })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: Caller guarantees `ptr` came from `allocate` with `layout`.
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) }
    }
}

#[cfg(feature = "mmap")]
pub use mmap::MmapAlloc;

#[cfg(feature = "mmap")]
mod mmap {
    use super::*;

    /// Anonymous private memory mappings.
    ///
    /// Pages are reserved up front but only backed by physical memory once
    /// touched, which suits very large tables. Layouts with an alignment
    /// above the page size are rejected. On non-unix targets this falls back
    /// to [`Heap`].
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct MmapAlloc;

    cfg_if::cfg_if! {
        if #[cfg(unix)] {
            const PAGE_ALIGN: usize = 4096;

            // SAFETY: `mmap` returns page-aligned, readable and writable memory
            // of the requested length, released only by the matching `munmap`.
            unsafe impl TableAlloc for MmapAlloc {
                fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, CacheTableError> {
                    if layout.align() > PAGE_ALIGN {
                        return Err(CacheTableError::AllocFailed { layout });
                    }

                    // SAFETY: Anonymous mapping with no fixed address; the kernel
                    // validates the length.
                    let raw = unsafe {
                        libc::mmap(
                            core::ptr::null_mut(),
                            layout.size(),
                            libc::PROT_READ | libc::PROT_WRITE,
                            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                            -1,
                            0,
                        )
                    };
                    if raw == libc::MAP_FAILED {
                        log::trace!("mmap of {} bytes failed", layout.size());
                        return Err(CacheTableError::AllocFailed { layout });
                    }

                    log::trace!("mapped {} bytes at {raw:p}", layout.size());
                    NonNull::new(raw.cast()).ok_or(CacheTableError::AllocFailed { layout })
                }

                unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
                    log::trace!("unmapping {} bytes at {:p}", layout.size(), ptr);
                    // SAFETY: Caller guarantees `ptr` is a live mapping of
                    // `layout.size()` bytes created by `allocate`.
                    unsafe {
                        libc::munmap(ptr.as_ptr().cast(), layout.size());
                    }
                }
            }
        } else {
            // SAFETY: Delegates to `Heap`.
            unsafe impl TableAlloc for MmapAlloc {
                fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, CacheTableError> {
                    Heap.allocate(layout)
                }

                unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
                    // SAFETY: Forwarded caller contract.
                    unsafe { Heap.deallocate(ptr, layout) }
                }
            }
        }
    }
}
