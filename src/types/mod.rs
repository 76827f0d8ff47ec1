//! Common types and constants used throughout the index.

mod page_number;

pub use page_number::PageNumber;

/// Absolute maximum length of an entry in bytes.
///
/// Each tree additionally caps entries at a quarter of its page size, so
/// that a handful of entries always fit on one page.
pub const MAX_ENTRY_LENGTH: usize = 2000;

/// Minimum supported page size in bytes
pub const MIN_PAGE_SIZE: usize = 128;

/// Maximum supported page size in bytes.
///
/// Offsets within a page are 16-bit, so a page must fit in `u16`.
pub const MAX_PAGE_SIZE: usize = 65535;

/// Merge threshold as a ratio: a page becomes a merge candidate when at
/// least 7/10 of its entries region (and, for inner pages, of its child
/// slots) is free.
pub const MERGE_NUMERATOR: usize = 7;
/// Denominator of [`MERGE_NUMERATOR`]
pub const MERGE_DENOMINATOR: usize = 10;

/// Maximum entry length for a tree with the given page size
pub fn max_entry_length(page_size: usize) -> usize {
    (page_size / 4).min(MAX_ENTRY_LENGTH)
}

/// Whether `free` out of `size` units clears the merge threshold
pub fn over_merge_threshold(free: usize, size: usize) -> bool {
    free * MERGE_DENOMINATOR >= size * MERGE_NUMERATOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_entry_length() {
        assert_eq!(max_entry_length(400), 100);
        assert_eq!(max_entry_length(65535), 2000);
        assert_eq!(max_entry_length(8192), 2000);
    }

    #[test]
    fn test_merge_threshold() {
        assert!(over_merge_threshold(70, 100));
        assert!(over_merge_threshold(100, 100));
        assert!(!over_merge_threshold(69, 100));
    }
}
