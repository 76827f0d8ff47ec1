//! # BTree Index
//!
//! An embeddable, paged B+-tree index over variable-length byte-string keys.
//!
//! The tree lives entirely inside fixed-size pages supplied by an external
//! page provider: it owns no I/O, no allocator, and no concurrency
//! primitives. Entries are byte strings ordered by unsigned lexicographic
//! comparison; the tree keeps them sorted across a forest of pages under
//! insertion, deletion, scans, range counting, and prefix lookup.
//!
//! ## Architecture
//!
//! - **Page layer** (`page`): [`PageBuf`] buffer handles and the slotted
//!   [`PageEntries`] format treating one region as a sorted set
//! - **Provider layer** (`provider`): the [`PageProvider`] contracts and an
//!   in-memory reference implementation
//! - **B-tree layer** (`btree`): tree operations over leaf and inner pages
//!
//! ## Usage
//!
//! ```rust
//! use btree_index::{BTree, MemoryPageProvider};
//!
//! # fn main() -> btree_index::Result<()> {
//! let mut tree = BTree::create(MemoryPageProvider::new(400))?;
//!
//! tree.insert(b"cherry")?;
//! tree.insert(b"apple")?;
//!
//! let mut entries = Vec::new();
//! tree.scan(None, |entry| {
//!     entries.push(entry.to_vec());
//!     true
//! })?;
//! assert_eq!(entries, vec![b"apple".to_vec(), b"cherry".to_vec()]);
//!
//! tree.remove(b"apple")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Contracts
//!
//! Operations are single-threaded and run to completion. Entry views passed
//! to scan callbacks alias page buffers; copy them before the next mutating
//! operation on the same tree. Queries report unavailable pages as distinct
//! values ([`ScanOutcome::MissingPage`], [`FindOutcome::MissingPage`], `None`
//! counts); writes require every page to be available.

pub mod btree;
pub mod error;
pub mod page;
pub mod provider;
pub mod types;

pub use btree::{BTree, FindOutcome, ScanOutcome, TreeNode};
pub use error::{Result, TreeError};
pub use page::{PageBuf, PageEntries, PageEntriesMut, ScanFrom};
pub use provider::{MemoryPageProvider, PageProvider, PageProviderForWrite};
pub use types::{PageNumber, MAX_ENTRY_LENGTH, MAX_PAGE_SIZE, MIN_PAGE_SIZE};
