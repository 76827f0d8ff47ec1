//! Page provider contracts.
//!
//! The tree owns no storage. Every page it touches comes from a provider:
//! a read-only [`PageProvider`] for queries, and a [`PageProviderForWrite`]
//! adding copy-on-write materialization, allocation, and release for
//! mutations. Transactional page stores implement these traits; the crate
//! ships [`MemoryPageProvider`] as the in-memory reference implementation.

mod memory;

pub use memory::MemoryPageProvider;

use crate::page::PageBuf;
use crate::types::PageNumber;

/// Read-only access to pages.
///
/// All pages of one provider have the same size. `page` returns `None` when
/// a page is unavailable (for example not yet materialized by an outer
/// store); queries surface that as a distinct missing-page result.
pub trait PageProvider {
    /// Size in bytes of every page of this provider
    fn page_size(&self) -> usize;

    /// Get a page for reading, or `None` when it is unavailable
    fn page(&self, page: PageNumber) -> Option<PageBuf>;
}

/// Page access for mutating operations.
///
/// All three operations must succeed; a provider that cannot honor them has
/// to fail fatally (panic) rather than hand back bad data. After the first
/// `page_for_update` call on a page within an operation, `page` for the same
/// number must observe the same buffer. A `page` handle obtained *before*
/// the `page_for_update` may alias a different (pre-copy) buffer; this
/// mirrors copy-on-write page stores.
pub trait PageProviderForWrite: PageProvider {
    /// Get a page for mutation, materializing a writable copy if needed
    fn page_for_update(&mut self, page: PageNumber) -> PageBuf;

    /// Allocate a fresh zeroed page and return its number
    fn allocate(&mut self) -> PageNumber;

    /// Release a page; its number may be recycled by later allocations
    fn release(&mut self, page: PageNumber);
}

impl<T: PageProvider + ?Sized> PageProvider for &T {
    fn page_size(&self) -> usize {
        (**self).page_size()
    }

    fn page(&self, page: PageNumber) -> Option<PageBuf> {
        (**self).page(page)
    }
}

impl<T: PageProvider + ?Sized> PageProvider for &mut T {
    fn page_size(&self) -> usize {
        (**self).page_size()
    }

    fn page(&self, page: PageNumber) -> Option<PageBuf> {
        (**self).page(page)
    }
}

impl<T: PageProviderForWrite + ?Sized> PageProviderForWrite for &mut T {
    fn page_for_update(&mut self, page: PageNumber) -> PageBuf {
        (**self).page_for_update(page)
    }

    fn allocate(&mut self) -> PageNumber {
        (**self).allocate()
    }

    fn release(&mut self, page: PageNumber) {
        (**self).release(page)
    }
}
