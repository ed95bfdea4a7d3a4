// OS page-mapping primitives. Both allocators obtain their backing region
// through this module alone; neither best_fit nor mkc ever calls
// libc::mmap directly. No alignment hints, no commit/decommit, no large
// pages.

use libc::{mmap, munmap, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE};
use log::warn;
use std::ptr::null_mut;

use crate::error::AllocatorError;

// The fixed page size the MKC allocator reasons about. A protocol
// constant, not a query of the host's actual page size.
pub const PAGE_SIZE: usize = 4096;

// Map a fresh, anonymous, zero-filled, read/write region of size bytes.
// size must be greater than zero. Returns the base address on success.
pub fn map_anonymous(size: usize) -> Result<*mut u8, AllocatorError> {
    debug_assert!(size > 0);
    let p = unsafe {
        mmap(
            null_mut(),
            size,
            PROT_READ | PROT_WRITE,
            MAP_PRIVATE | MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if p == MAP_FAILED {
        let err = std::io::Error::last_os_error();
        warn!("mmap failed for {} bytes: {}", size, err);
        return Err(AllocatorError::Mapping(err));
    }
    Ok(p as *mut u8)
}

// Release a region previously obtained from map_anonymous. A no-op if
// base is null or size is zero.
pub unsafe fn unmap(base: *mut u8, size: usize) {
    if base.is_null() || size == 0 {
        return;
    }
    if munmap(base as *mut _, size) != 0 {
        warn!(
            "munmap failed: {}, addr {:p}, size {}",
            errno::errno(),
            base,
            size
        );
    }
}

// Round size up to the next multiple of align (align a power of two).
pub fn align_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}
