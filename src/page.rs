//! Page-granularity address and size arithmetic.

/// Alignment helper built around the runtime page size.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry {
    page_size: usize,
}

impl PageGeometry {
    /// Reads the page size of the running system.
    pub fn current() -> Self {
        // _SC_PAGESIZE cannot fail on the platforms this tool targets.
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
        Self::with_page_size(page_size)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        assert!(
            page_size.is_power_of_two(),
            "page size must be a power of two, got {}",
            page_size
        );
        Self { page_size }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Largest page multiple not above `addr`.
    pub fn align_down(&self, addr: usize) -> usize {
        addr & !(self.page_size - 1)
    }

    /// Smallest page multiple not below `addr`.
    pub fn align_up(&self, addr: usize) -> usize {
        self.align_down(addr + self.page_size - 1)
    }

    /// `size` rounded up to whole pages, as mprotect wants it.
    pub fn aligned_size(&self, size: usize) -> usize {
        self.align_up(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_down_brackets_address() {
        let geom = PageGeometry::with_page_size(4096);

        for addr in [0, 1, 4095, 4096, 4097, 0x1234_5678] {
            let down = geom.align_down(addr);
            assert!(down <= addr);
            assert!(addr < down + geom.page_size());
            assert_eq!(down % geom.page_size(), 0);
        }
    }

    #[test]
    fn test_align_up_is_least_upper_multiple() {
        let geom = PageGeometry::with_page_size(4096);

        assert_eq!(geom.align_up(0), 0);
        assert_eq!(geom.align_up(1), 4096);
        assert_eq!(geom.align_up(4095), 4096);
        assert_eq!(geom.align_up(4096), 4096);
        assert_eq!(geom.align_up(4097), 8192);
    }

    #[test]
    fn test_align_down_exact_multiple_is_identity() {
        let geom = PageGeometry::with_page_size(4096);

        for addr in [0, 4096, 8192, 0x7fff_0000] {
            assert_eq!(geom.align_down(addr), addr);
        }
    }

    #[test]
    fn test_aligned_size_covers_and_is_page_multiple() {
        let geom = PageGeometry::with_page_size(4096);

        for size in [1, 17, 4095, 4096, 4097, 100_000] {
            let aligned = geom.aligned_size(size);
            assert!(aligned >= size);
            assert_eq!(aligned % geom.page_size(), 0);
            // Least such multiple
            assert!(aligned - size < geom.page_size());
        }
    }

    #[test]
    fn test_non_default_page_size() {
        let geom = PageGeometry::with_page_size(16384);

        assert_eq!(geom.align_down(16383), 0);
        assert_eq!(geom.align_up(16385), 32768);
        assert_eq!(geom.aligned_size(1), 16384);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_rejects_non_power_of_two_page_size() {
        PageGeometry::with_page_size(3000);
    }

    #[test]
    fn test_current_page_size_is_sane() {
        let geom = PageGeometry::current();

        assert!(geom.page_size() >= 4096);
        assert!(geom.page_size().is_power_of_two());
    }
}
