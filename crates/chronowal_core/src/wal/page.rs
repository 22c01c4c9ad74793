//! In-memory staging buffer for the active page.

use crate::wal::record::HEADER_SIZE;
use chronowal_storage::PAGE_SIZE;

/// One page worth of bytes waiting to reach the active segment.
///
/// `alloc` counts bytes placed into the buffer, `flushed` counts bytes
/// already handed to the segment file. `flushed <= alloc <= PAGE_SIZE`
/// always holds. The buffer is allocated once and reused for every page.
#[derive(Debug)]
pub(crate) struct Page {
    pub(crate) buf: Box<[u8]>,
    pub(crate) alloc: usize,
    pub(crate) flushed: usize,
}

impl Page {
    pub(crate) fn new() -> Self {
        Self {
            buf: vec![0u8; PAGE_SIZE].into_boxed_slice(),
            alloc: 0,
            flushed: 0,
        }
    }

    /// Bytes still free in the page.
    pub(crate) fn remaining(&self) -> usize {
        PAGE_SIZE - self.alloc
    }

    /// True once another fragment header no longer fits.
    pub(crate) fn is_full(&self) -> bool {
        self.remaining() < HEADER_SIZE
    }

    /// True if nothing was placed in the page yet.
    pub(crate) fn is_empty(&self) -> bool {
        self.alloc == 0
    }

    /// Zeroes the buffer and starts a new page.
    pub(crate) fn reset(&mut self) {
        self.buf.fill(0);
        self.alloc = 0;
        self.flushed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_page_is_empty() {
        let page = Page::new();
        assert_eq!(page.remaining(), PAGE_SIZE);
        assert!(!page.is_full());
        assert!(page.is_empty());
    }

    #[test]
    fn full_when_header_no_longer_fits() {
        let mut page = Page::new();
        page.alloc = PAGE_SIZE - HEADER_SIZE;
        assert!(!page.is_full());
        page.alloc += 1;
        assert!(page.is_full());
    }

    #[test]
    fn reset_clears_buffer() {
        let mut page = Page::new();
        page.buf[..4].copy_from_slice(b"data");
        page.alloc = 4;
        page.flushed = 2;
        assert!(!page.is_empty());

        page.reset();
        assert_eq!(page.alloc, 0);
        assert_eq!(page.flushed, 0);
        assert!(page.buf.iter().all(|&b| b == 0));
    }
}
