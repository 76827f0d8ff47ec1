//! Structural integrity check.
//!
//! Walks the whole tree and asserts the format invariants: known page
//! roles, sorted unique entries on every page, equal leaf depth, stored
//! heights matching actual subtree depth, and separator bounds. Meant as an
//! assertion harness for tests and for debugging page stores.

use crate::btree::node::{Node, PageRole, HEIGHT_SENTINEL};
use crate::btree::tree::BTree;
use crate::error::{Result, TreeError};
use crate::provider::PageProvider;
use crate::types::PageNumber;

/// Facts about a verified subtree
struct SubtreeInfo {
    depth: usize,
    first: Option<Vec<u8>>,
    last: Option<Vec<u8>>,
}

impl<P: PageProvider> BTree<P> {
    /// Verify the structural invariants of the whole tree.
    ///
    /// Returns [`TreeError::IntegrityViolation`] describing the first
    /// violation found. An unavailable page is a violation here, unlike in
    /// queries: the check is only meaningful over a complete tree.
    pub fn check_integrity(&self) -> Result<()> {
        self.check_page(self.root())?;
        Ok(())
    }

    fn check_page(&self, page_no: PageNumber) -> Result<SubtreeInfo> {
        let buf = self.read_page(page_no).ok_or_else(|| {
            TreeError::integrity(format!("page {page_no} unavailable during check"))
        })?;
        let data = buf.borrow();
        let node = Node::parse(&data).map_err(|e| {
            TreeError::integrity(format!("page {page_no} has a bad format: {e}"))
        })?;
        let entries = node.entries()?;

        let mut previous: Option<&[u8]> = None;
        for ordinal in 0..entries.count() {
            let entry = entries.get(ordinal)?;
            if let Some(prev) = previous {
                if prev >= entry {
                    return Err(TreeError::integrity(format!(
                        "page {page_no} entries out of order at ordinal {ordinal}"
                    )));
                }
            }
            previous = Some(entry);
        }

        match node.role() {
            PageRole::Leaf => {
                let all = entries.read_all()?;
                Ok(SubtreeInfo {
                    depth: 1,
                    first: all.first().map(|e| e.to_vec()),
                    last: all.last().map(|e| e.to_vec()),
                })
            }
            PageRole::Inner => {
                let separator_count = entries.count();
                let separators: Vec<Vec<u8>> = entries
                    .read_all()?
                    .into_iter()
                    .map(<[u8]>::to_vec)
                    .collect();
                let children: Vec<PageNumber> =
                    (0..=separator_count).map(|i| node.child(i)).collect();
                let stored_height = node.height();
                drop(data);

                let mut infos = Vec::with_capacity(children.len());
                for child in &children {
                    infos.push(self.check_page(*child)?);
                }

                let depth = infos[0].depth;
                if infos.iter().any(|info| info.depth != depth) {
                    return Err(TreeError::integrity(format!(
                        "children of page {page_no} differ in depth"
                    )));
                }
                let actual = depth + 1;
                let height_ok = if stored_height == HEIGHT_SENTINEL {
                    actual >= HEIGHT_SENTINEL as usize
                } else {
                    stored_height as usize == actual
                };
                if !height_ok {
                    return Err(TreeError::integrity(format!(
                        "page {page_no} stores height {stored_height} but has depth {actual}"
                    )));
                }

                for (i, separator) in separators.iter().enumerate() {
                    match &infos[i].last {
                        Some(last) if last.as_slice() >= separator.as_slice() => {
                            return Err(TreeError::integrity(format!(
                                "page {page_no}: left child of separator {i} reaches past it"
                            )));
                        }
                        Some(_) => {}
                        None => {
                            return Err(TreeError::integrity(format!(
                                "page {page_no}: child {i} holds no entries"
                            )));
                        }
                    }
                    match &infos[i + 1].first {
                        Some(first) if first.as_slice() < separator.as_slice() => {
                            return Err(TreeError::integrity(format!(
                                "page {page_no}: right child of separator {i} starts before it"
                            )));
                        }
                        Some(_) => {}
                        None => {
                            return Err(TreeError::integrity(format!(
                                "page {page_no}: child {} holds no entries",
                                i + 1
                            )));
                        }
                    }
                }

                let first = infos.first().and_then(|info| info.first.clone());
                let last = infos.last().and_then(|info| info.last.clone());
                Ok(SubtreeInfo {
                    depth: actual,
                    first,
                    last,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MemoryPageProvider, PageProviderForWrite};

    #[test]
    fn test_check_empty_tree() {
        let tree = BTree::create(MemoryPageProvider::new(400)).unwrap();
        tree.check_integrity().unwrap();
    }

    #[test]
    fn test_check_multi_level_tree() {
        let mut tree = BTree::create(MemoryPageProvider::new(400)).unwrap();
        for i in 0..500u16 {
            let entry = [vec![0u8; 20], i.to_be_bytes().to_vec()].concat();
            assert!(tree.insert(&entry).unwrap());
        }
        tree.check_integrity().unwrap();
    }

    #[test]
    fn test_check_detects_unsorted_page() {
        let mut tree = BTree::create(MemoryPageProvider::new(400)).unwrap();
        assert!(tree.insert(b"aa").unwrap());
        assert!(tree.insert(b"bb").unwrap());

        // Swap the two slot pointers behind the tree's back.
        let root = tree.root();
        let buf = tree.provider_mut().page_for_update(root);
        {
            let mut data = buf.borrow_mut();
            // Leaf entries region starts at byte 1; slots start at region
            // offset 7.
            let slots = 1 + 7;
            data.swap(slots, slots + 2);
            data.swap(slots + 1, slots + 3);
        }
        assert!(matches!(
            tree.check_integrity(),
            Err(TreeError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn test_check_detects_bad_height() {
        let mut tree = BTree::create(MemoryPageProvider::new(400)).unwrap();
        for i in 0..200u16 {
            let entry = [vec![7u8; 30], i.to_be_bytes().to_vec()].concat();
            assert!(tree.insert(&entry).unwrap());
        }
        let root = tree.root();
        let buf = tree.provider_mut().page_for_update(root);
        buf.borrow_mut()[1] = 9;
        assert!(matches!(
            tree.check_integrity(),
            Err(TreeError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn test_check_detects_missing_page() {
        let mut provider = MemoryPageProvider::new(400);
        let root = provider.allocate();
        {
            let buf = provider.page_for_update(root);
            let mut data = buf.borrow_mut();
            crate::btree::node::init_inner(&mut data, 2);
            let mut node = crate::btree::node::NodeMut::parse(&mut data).unwrap();
            node.set_child(0, crate::types::PageNumber::new(77));
            node.set_child(1, crate::types::PageNumber::new(78));
            node.entries_mut().unwrap().insert(b"m").unwrap();
        }
        let tree = BTree::open(provider, root).unwrap();
        assert!(matches!(
            tree.check_integrity(),
            Err(TreeError::IntegrityViolation(_))
        ));
    }
}
