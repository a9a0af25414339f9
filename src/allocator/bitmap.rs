//! Linear bitmap physical page allocator.
//!
//! One bit per page, packed 32 to a word, `0` free / `1` in-use. Allocation
//! is next-fit from a cursor left at the last page handed out, so repeated
//! single-page allocations don't re-scan pages that were just taken.

use alloc::vec;
use alloc::vec::Vec;

use super::{div_ceil, PhysicalAllocator, PAGE_SIZE};
use crate::host::PrintSink;

const BITS_PER_WORD: usize = 32;

pub struct BitmapAllocator {
    bitmap: Vec<u32>,
    start: u32,
    total_pages: usize,
    free_pages: usize,
    cursor: usize,
}

impl Default for BitmapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BitmapAllocator {
    pub fn new() -> Self {
        BitmapAllocator {
            bitmap: Vec::new(),
            start: 0,
            total_pages: 0,
            free_pages: 0,
            cursor: 0,
        }
    }

    fn word_bit(page: usize) -> (usize, u32) {
        (page / BITS_PER_WORD, 1u32 << (page % BITS_PER_WORD))
    }

    fn is_page_free(&self, page: usize) -> bool {
        let (word, bit) = Self::word_bit(page);
        self.bitmap[word] & bit == 0
    }

    fn set_used(&mut self, page: usize) {
        let (word, bit) = Self::word_bit(page);
        self.bitmap[word] |= bit;
    }

    fn set_free(&mut self, page: usize) {
        let (word, bit) = Self::word_bit(page);
        self.bitmap[word] &= !bit;
    }

    /// Next-fit scan starting at `from`, wrapping once. `None` if every page
    /// is in use.
    fn find_free_page(&self, from: usize) -> Option<usize> {
        (from..self.total_pages)
            .chain(0..from)
            .find(|&page| self.is_page_free(page))
    }

    fn page_index(&self, addr: u32) -> Option<usize> {
        if addr < self.start {
            return None;
        }
        let index = ((addr - self.start) as usize) / PAGE_SIZE;
        if index >= self.total_pages {
            None
        } else {
            Some(index)
        }
    }
}

impl PhysicalAllocator for BitmapAllocator {
    fn name(&self) -> &'static str {
        "bitmap"
    }

    fn description(&self) -> &'static str {
        "Simple bitmap-based page allocator with linear search"
    }

    fn init(&mut self, start: u32, end: u32) -> i32 {
        if end <= start
            || start as usize % PAGE_SIZE != 0
            || end as usize % PAGE_SIZE != 0
        {
            return -1;
        }

        let total_pages = (end - start) as usize / PAGE_SIZE;
        let bitmap_words = div_ceil(total_pages, BITS_PER_WORD);
        let bitmap_bytes = bitmap_words * core::mem::size_of::<u32>();
        let bitmap_pages = div_ceil(bitmap_bytes, PAGE_SIZE);

        if bitmap_pages > total_pages {
            return -1;
        }

        self.start = start;
        self.total_pages = total_pages;
        self.free_pages = total_pages;
        self.cursor = 0;
        self.bitmap = vec![0u32; bitmap_words];

        for page in 0..bitmap_pages {
            self.set_used(page);
            self.free_pages -= 1;
        }

        0
    }

    fn alloc_page(&mut self) -> u32 {
        if self.free_pages == 0 {
            return 0;
        }

        let page = match self.find_free_page(self.cursor) {
            Some(page) => page,
            None => return 0,
        };

        self.set_used(page);
        self.free_pages -= 1;
        self.cursor = page;

        self.start + (page * PAGE_SIZE) as u32
    }

    fn alloc_pages(&mut self, count: usize) -> u32 {
        if count == 0 || self.free_pages < count || count > self.total_pages {
            return 0;
        }

        for start_page in 0..=(self.total_pages - count) {
            if (start_page..start_page + count).all(|p| self.is_page_free(p)) {
                for page in start_page..start_page + count {
                    self.set_used(page);
                }
                self.free_pages -= count;
                return self.start + (start_page * PAGE_SIZE) as u32;
            }
        }

        0
    }

    fn alloc_aligned(&mut self, size: usize, alignment: usize) -> u32 {
        if size == 0 {
            return 0;
        }
        let pages_needed = div_ceil(size, PAGE_SIZE);
        let align_pages = if alignment <= PAGE_SIZE {
            1
        } else {
            div_ceil(alignment, PAGE_SIZE)
        };
        if pages_needed > self.total_pages || self.free_pages < pages_needed {
            return 0;
        }

        let mut start_page = 0;
        while start_page + pages_needed <= self.total_pages {
            if (start_page..start_page + pages_needed).all(|p| self.is_page_free(p)) {
                for page in start_page..start_page + pages_needed {
                    self.set_used(page);
                }
                self.free_pages -= pages_needed;
                return self.start + (start_page * PAGE_SIZE) as u32;
            }
            start_page += align_pages;
        }

        0
    }

    fn free_page(&mut self, addr: u32) {
        let page = match self.page_index(addr) {
            Some(page) => page,
            None => return,
        };
        if self.is_page_free(page) {
            return;
        }
        self.set_free(page);
        self.free_pages += 1;
    }

    fn free_pages(&mut self, addr: u32, count: usize) {
        for i in 0..count {
            self.free_page(addr + (i * PAGE_SIZE) as u32);
        }
    }

    fn is_available(&self, addr: u32) -> bool {
        match self.page_index(addr) {
            Some(page) => self.is_page_free(page),
            None => false,
        }
    }

    fn get_free_pages(&self) -> usize {
        self.free_pages
    }

    fn get_total_pages(&self) -> usize {
        self.total_pages
    }

    fn print_stats(&self, sink: &mut dyn PrintSink) {
        let used = self.total_pages - self.free_pages;
        sink.print_line("BITMAP ALLOCATOR STATISTICS:");
        sink.print_line(&alloc::format!("  Total pages: {}", self.total_pages));
        sink.print_line(&alloc::format!("  Free pages: {}", self.free_pages));
        sink.print_line(&alloc::format!("  Used pages: {}", used));
        sink.print_line(&alloc::format!("  Last allocated page: {}", self.cursor));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init(pages: usize) -> (BitmapAllocator, u32, u32) {
        let start = 0u32;
        let end = (pages * PAGE_SIZE) as u32;
        let mut alloc = BitmapAllocator::new();
        assert_eq!(alloc.init(start, end), 0);
        (alloc, start, end)
    }

    #[test]
    fn init_reserves_its_own_bitmap_pages() {
        let (alloc, _, _) = init(16);
        assert_eq!(alloc.get_total_pages(), 16);
        assert!(alloc.get_free_pages() < 16);
    }

    #[test]
    fn alloc_page_zero_on_exhaustion() {
        let (mut alloc, _, _) = init(8);
        let total_free = alloc.get_free_pages();
        for _ in 0..total_free {
            assert_ne!(alloc.alloc_page(), 0);
        }
        assert_eq!(alloc.alloc_page(), 0);
    }

    #[test]
    fn free_then_alloc_is_idempotent_round_trip() {
        let (mut alloc, _, _) = init(16);
        let initial_free = alloc.get_free_pages();
        let a = alloc.alloc_page();
        let b = alloc.alloc_page();
        alloc.free_page(a);
        alloc.free_page(b);
        assert_eq!(alloc.get_free_pages(), initial_free);
        // Freeing twice is a no-op, not a double-credit.
        alloc.free_page(a);
        assert_eq!(alloc.get_free_pages(), initial_free);
    }

    #[test]
    fn scenario_s2_bitmap_contiguous() {
        // S2: init 16 pages; alloc_page x4; free the second-allocated page;
        // alloc_pages(2) fails; alloc_pages(1) returns the freed page.
        let (mut alloc, _, _) = init(16);
        let p1 = alloc.alloc_page();
        let p2 = alloc.alloc_page();
        let _p3 = alloc.alloc_page();
        let _p4 = alloc.alloc_page();
        assert_ne!(p1, 0);
        assert_ne!(p2, 0);

        alloc.free_page(p2);
        assert_eq!(alloc.alloc_pages(2), 0);

        let reused = alloc.alloc_pages(1);
        assert_eq!(reused, p2);
    }

    #[test]
    fn zero_size_allocations_fail() {
        let (mut alloc, _, _) = init(8);
        assert_eq!(alloc.alloc_pages(0), 0);
        assert_eq!(alloc.alloc_aligned(0, PAGE_SIZE), 0);
    }

    #[test]
    fn free_outside_region_is_a_silent_no_op() {
        let (mut alloc, _, end) = init(8);
        let before = alloc.get_free_pages();
        alloc.free_page(end); // one page past the managed region
        alloc.free_page(0); // inside the region, but still metadata (in-use)
        assert_eq!(alloc.get_free_pages(), before);
    }

    #[test]
    fn alloc_aligned_respects_alignment() {
        let (mut alloc, start, _) = init(64);
        let addr = alloc.alloc_aligned(PAGE_SIZE * 2, PAGE_SIZE * 4);
        assert_ne!(addr, 0);
        let page = (addr - start) as usize / PAGE_SIZE;
        assert_eq!(page % 4, 0);
    }
}
