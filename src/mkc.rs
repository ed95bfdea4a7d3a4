// The McKusick-Karels (MKC) slab/page allocator.
//
// A page-granular pool: small requests are served out of per-size-class
// pages carrying a bitmap of occupied slots, large requests out of runs of
// consecutive pages.

use std::mem::size_of;
use std::ptr::null_mut;

use crate::error::AllocatorError;
use crate::os::{self, PAGE_SIZE};

// Size classes small requests are rounded up into.
pub const CLASS_SIZES: [usize; 8] = [16, 32, 64, 128, 256, 512, 1024, 2048];
pub const NUM_CLASSES: usize = CLASS_SIZES.len();

// Sentinel tags for a page not currently serving a size class.
const TAG_FREE: u16 = 0xFFFF;
const TAG_LARGE: u16 = 0xFFFE;

// Header occupying the first bytes of every data-area page. next threads
// the page onto exactly one of: the free list, a per-class list, or (head
// pages only) the large-block list. count is overloaded: free-slot count
// on a class page, run length in pages on a large-block head, unused
// (zero) on a free or non-head-large page.
#[repr(C)]
struct PageHeader {
    tag: u16,
    count: u16,
    next: *mut PageHeader,
    bitmap: [u32; 8],
}

const PAGE_HEADER_SIZE: usize = size_of::<PageHeader>();

// Number of slots a class-c page can hold.
fn max_slots(class_idx: usize) -> usize {
    let slots = (PAGE_SIZE - PAGE_HEADER_SIZE) / CLASS_SIZES[class_idx];
    slots.min(256)
}

// First class whose size accommodates n, or None for the large path.
fn find_class_index(n: usize) -> Option<usize> {
    CLASS_SIZES.iter().position(|&class_size| n <= class_size)
}

// Lowest clear bit in bitmap[0..limit), left to right over the 32-bit words.
fn bitmap_find_free(bitmap: &[u32; 8], limit: usize) -> Option<usize> {
    for i in 0..limit {
        let word = bitmap[i >> 5];
        if word & (1 << (i & 31)) == 0 {
            return Some(i);
        }
    }
    None
}

pub struct MkcAllocator {
    base: *mut u8,
    total_size: usize,
    data_base: *mut u8,
    pages_count: usize,
    free_list: *mut PageHeader,
    class_lists: [*mut PageHeader; NUM_CLASSES],
    large_list: *mut PageHeader,
}

impl MkcAllocator {
    // Map region_size bytes and carve it into a control page plus a data
    // area of free pages.
    pub fn create(region_size: usize) -> Result<Self, AllocatorError> {
        let minimum = 2 * PAGE_SIZE;
        if region_size < minimum {
            return Err(AllocatorError::InsufficientRegion {
                requested: region_size,
                minimum,
            });
        }
        let base = os::map_anonymous(region_size)?;
        let data_base = unsafe { base.add(PAGE_SIZE) };
        let pages_count = region_size / PAGE_SIZE - 1;

        let mut alloc = MkcAllocator {
            base,
            total_size: region_size,
            data_base,
            pages_count,
            free_list: null_mut(),
            class_lists: [null_mut(); NUM_CLASSES],
            large_list: null_mut(),
        };

        for i in 0..pages_count {
            unsafe {
                let page = alloc.page_at(i);
                (*page).tag = TAG_FREE;
                (*page).count = 0;
                (*page).bitmap = [0; 8];
                (*page).next = alloc.free_list;
                alloc.free_list = page;
            }
        }
        Ok(alloc)
    }

    // Allocate n bytes; null on out-of-memory or n == 0.
    pub fn alloc(&mut self, n: usize) -> *mut u8 {
        if n == 0 {
            return null_mut();
        }
        match find_class_index(n) {
            Some(class_idx) => self.alloc_small(class_idx),
            None => self.alloc_large(n),
        }
    }

    // Free a pointer previously returned by alloc.
    pub fn free(&mut self, p: *mut u8) {
        if p.is_null() {
            return;
        }
        let idx = match self.page_index_of(p) {
            Some(idx) => idx,
            None => return, // foreign pointer; best-effort ignored
        };
        unsafe {
            let page = self.page_at(idx);
            match (*page).tag {
                TAG_FREE => {} // double-free tolerance
                TAG_LARGE => self.free_large(page),
                class_idx => self.free_small(page, class_idx as usize, p),
            }
        }
    }

    // Bytes currently available: whole free pages plus free slots on class
    // pages. Large-block interior fragmentation is not counted.
    pub fn free_memory(&self) -> usize {
        let mut total = 0usize;
        unsafe {
            let mut page = self.free_list;
            while !page.is_null() {
                total += PAGE_SIZE;
                page = (*page).next;
            }
            for class_idx in 0..NUM_CLASSES {
                let mut page = self.class_lists[class_idx];
                while !page.is_null() {
                    total += (*page).count as usize * CLASS_SIZES[class_idx];
                    page = (*page).next;
                }
            }
        }
        total
    }

    // Unmap the whole region and clear all fields.
    pub fn destroy(&mut self) {
        if !self.base.is_null() {
            unsafe { os::unmap(self.base, self.total_size) };
        }
        self.base = null_mut();
        self.total_size = 0;
        self.data_base = null_mut();
        self.pages_count = 0;
        self.free_list = null_mut();
        self.class_lists = [null_mut(); NUM_CLASSES];
        self.large_list = null_mut();
    }

    // -- internal helpers ------------------------------------------------

    // Canonical payload-pointer-to-page-index formula: both the
    // large-block free path and the small-block free path route through
    // this one function so the two can never disagree.
    fn page_index_of(&self, p: *mut u8) -> Option<usize> {
        if (p as usize) < self.data_base as usize {
            return None;
        }
        let idx = (p as usize - self.data_base as usize) / PAGE_SIZE;
        if idx < self.pages_count {
            Some(idx)
        } else {
            None
        }
    }

    fn page_at(&self, index: usize) -> *mut PageHeader {
        unsafe { self.data_base.add(index * PAGE_SIZE) as *mut PageHeader }
    }

    fn pop_free_page(&mut self) -> *mut PageHeader {
        let page = self.free_list;
        if page.is_null() {
            return null_mut();
        }
        unsafe {
            self.free_list = (*page).next;
            (*page).next = null_mut();
            (*page).bitmap = [0; 8];
        }
        page
    }

    fn alloc_small(&mut self, class_idx: usize) -> *mut u8 {
        unsafe {
            let mut page = self.class_lists[class_idx];
            while !page.is_null() && (*page).count == 0 {
                page = (*page).next;
            }
            if page.is_null() {
                page = self.pop_free_page();
                if page.is_null() {
                    return null_mut();
                }
                (*page).tag = class_idx as u16;
                (*page).count = max_slots(class_idx) as u16;
                (*page).next = self.class_lists[class_idx];
                self.class_lists[class_idx] = page;
            }

            let limit = max_slots(class_idx);
            let slot = match bitmap_find_free(&(*page).bitmap, limit) {
                Some(slot) => slot,
                None => return null_mut(),
            };
            (*page).bitmap[slot >> 5] |= 1 << (slot & 31);
            (*page).count -= 1;
            (page as *mut u8).add(PAGE_HEADER_SIZE + slot * CLASS_SIZES[class_idx])
        }
    }

    fn free_small(&mut self, page: *mut PageHeader, class_idx: usize, p: *mut u8) {
        unsafe {
            let class_size = CLASS_SIZES[class_idx];
            let page_data = (page as *mut u8).add(PAGE_HEADER_SIZE);
            let slot = (p as usize - page_data as usize) / class_size;
            let word = (*page).bitmap[slot >> 5];
            if word & (1 << (slot & 31)) == 0 {
                return; // double-free tolerance
            }
            (*page).bitmap[slot >> 5] &= !(1 << (slot & 31));
            (*page).count += 1;

            if (*page).count as usize == max_slots(class_idx) {
                remove_from_list(&mut self.class_lists[class_idx], page);
                self.return_free_page(page);
            }
        }
    }

    fn alloc_large(&mut self, n: usize) -> *mut u8 {
        let pages_needed = (n + PAGE_SIZE - 1) / PAGE_SIZE;
        let mut consecutive = 0usize;
        let mut start_index = 0usize;
        let mut found = false;

        unsafe {
            for i in 0..self.pages_count {
                let page = self.page_at(i);
                if (*page).tag == TAG_FREE {
                    if consecutive == 0 {
                        start_index = i;
                    }
                    consecutive += 1;
                    if consecutive == pages_needed {
                        found = true;
                        break;
                    }
                } else {
                    consecutive = 0;
                }
            }
            if !found {
                return null_mut();
            }

            for i in 0..pages_needed {
                let page = self.page_at(start_index + i);
                (*page).tag = TAG_LARGE;
                (*page).count = 0;
            }
            let head = self.page_at(start_index);
            (*head).count = pages_needed as u16;

            // splice all k pages out of the free list
            let mut cursor = &mut self.free_list as *mut *mut PageHeader;
            while !(*cursor).is_null() {
                let current = *cursor;
                let idx = self.page_index_of((current as *mut u8)).unwrap_or(usize::MAX);
                if idx >= start_index && idx < start_index + pages_needed {
                    *cursor = (*current).next;
                } else {
                    cursor = &mut (*current).next as *mut *mut PageHeader;
                }
            }

            (*head).next = self.large_list;
            self.large_list = head;

            (head as *mut u8).add(PAGE_HEADER_SIZE)
        }
    }

    fn free_large(&mut self, head: *mut PageHeader) {
        unsafe {
            let k = (*head).count as usize;
            let start_index = self.page_index_of(head as *mut u8).expect("large head in data area");
            for i in 0..k {
                self.return_free_page(self.page_at(start_index + i));
            }
            remove_from_list(&mut self.large_list, head);
        }
    }

    fn return_free_page(&mut self, page: *mut PageHeader) {
        unsafe {
            (*page).tag = TAG_FREE;
            (*page).count = 0;
            (*page).bitmap = [0; 8];
            (*page).next = self.free_list;
            self.free_list = page;
        }
    }
}

// Splice target out of a singly-linked page list.
unsafe fn remove_from_list(list: &mut *mut PageHeader, target: *mut PageHeader) {
    let mut cursor = list as *mut *mut PageHeader;
    while !(*cursor).is_null() {
        if *cursor == target {
            *cursor = (*target).next;
            (*target).next = null_mut();
            return;
        }
        cursor = &mut (**cursor).next as *mut *mut PageHeader;
    }
}

impl Drop for MkcAllocator {
    fn drop(&mut self) {
        self.destroy();
    }
}

// Raw-pointer owned region: safe to move across threads (never shared
// concurrently, per the single-threaded contract), but never Sync.
unsafe impl Send for MkcAllocator {}
