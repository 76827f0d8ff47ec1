//! Read-side tree operations: scans, point finds, prefix lookups, counting.
//!
//! Queries never fail on an unavailable page; they report it as a distinct
//! result (`MissingPage` outcomes, `None` counts) so read-only callers over
//! partially materialized page stores can react. Structural damage (bad
//! role bytes, broken records) still surfaces as an error.

use std::ops::Bound;

use crate::btree::node::{Node, PageRole};
use crate::btree::tree::BTree;
use crate::error::Result;
use crate::page::{PageEntries, ScanFrom};
use crate::provider::PageProvider;
use crate::types::PageNumber;

/// How a scan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Every entry in range was visited
    Completed,
    /// The callback asked to stop
    Stopped,
    /// A page on the scan path was unavailable
    MissingPage,
}

/// Result of a point query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindOutcome {
    /// The matching entry, copied out of its page
    Found(Vec<u8>),
    /// No entry matches
    NotFound,
    /// A page on the lookup path was unavailable
    MissingPage,
}

/// First child slot that can hold entries at or after `key`
fn start_child_for(separators: &PageEntries<'_>, key: &[u8]) -> Result<usize> {
    Ok(match separators.search(key)? {
        Ok(i) => i + 1,
        Err(i) => i,
    })
}

impl<P: PageProvider> BTree<P> {
    /// Scan entries in ascending order, starting at `start` (or the first
    /// entry). The callback gets a view aliasing the page buffer and returns
    /// whether to continue.
    pub fn scan<F>(&self, start: Option<&[u8]>, mut f: F) -> Result<ScanOutcome>
    where
        F: FnMut(&[u8]) -> bool,
    {
        self.scan_page(self.root(), start, &mut f)
    }

    /// Scan entries in descending order, starting at the greatest entry
    /// `<= start` (or the last entry)
    pub fn scan_reverse<F>(&self, start: Option<&[u8]>, mut f: F) -> Result<ScanOutcome>
    where
        F: FnMut(&[u8]) -> bool,
    {
        self.scan_page_reverse(self.root(), start, &mut f)
    }

    fn scan_page<F>(
        &self,
        page_no: PageNumber,
        start: Option<&[u8]>,
        f: &mut F,
    ) -> Result<ScanOutcome>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let Some(buf) = self.read_page(page_no) else {
            return Ok(ScanOutcome::MissingPage);
        };
        let children = {
            let data = buf.borrow();
            let node = Node::parse(&data)?;
            match node.role() {
                PageRole::Leaf => {
                    let completed = node
                        .entries()?
                        .scan(start.map(ScanFrom::Entry), |_, entry| f(entry))?;
                    return Ok(if completed {
                        ScanOutcome::Completed
                    } else {
                        ScanOutcome::Stopped
                    });
                }
                PageRole::Inner => {
                    let separators = node.entries()?;
                    let first = match start {
                        None => 0,
                        Some(key) => start_child_for(&separators, key)?,
                    };
                    (first..=separators.count())
                        .map(|i| node.child(i))
                        .collect::<Vec<_>>()
                }
            }
        };
        for child in children {
            match self.scan_page(child, start, f)? {
                ScanOutcome::Completed => {}
                other => return Ok(other),
            }
        }
        Ok(ScanOutcome::Completed)
    }

    fn scan_page_reverse<F>(
        &self,
        page_no: PageNumber,
        start: Option<&[u8]>,
        f: &mut F,
    ) -> Result<ScanOutcome>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let Some(buf) = self.read_page(page_no) else {
            return Ok(ScanOutcome::MissingPage);
        };
        let children = {
            let data = buf.borrow();
            let node = Node::parse(&data)?;
            match node.role() {
                PageRole::Leaf => {
                    let completed = node
                        .entries()?
                        .scan_reverse(start.map(ScanFrom::Entry), |_, entry| f(entry))?;
                    return Ok(if completed {
                        ScanOutcome::Completed
                    } else {
                        ScanOutcome::Stopped
                    });
                }
                PageRole::Inner => {
                    let separators = node.entries()?;
                    // An entry equal to a separator lives in its right child,
                    // so a start key matching a separator includes that child
                    // as well; the leaf-level start filter drops anything
                    // beyond the key.
                    let last = match start {
                        None => separators.count(),
                        Some(key) => start_child_for(&separators, key)?,
                    };
                    (0..=last).rev().map(|i| node.child(i)).collect::<Vec<_>>()
                }
            }
        };
        for child in children {
            match self.scan_page_reverse(child, start, f)? {
                ScanOutcome::Completed => {}
                other => return Ok(other),
            }
        }
        Ok(ScanOutcome::Completed)
    }

    /// Smallest entry of the tree
    pub fn find_first(&self) -> Result<FindOutcome> {
        let mut found = None;
        match self.scan(None, |entry| {
            found = Some(entry.to_vec());
            false
        })? {
            ScanOutcome::MissingPage => Ok(FindOutcome::MissingPage),
            _ => Ok(found.map_or(FindOutcome::NotFound, FindOutcome::Found)),
        }
    }

    /// Greatest entry of the tree
    pub fn find_last(&self) -> Result<FindOutcome> {
        let mut found = None;
        match self.scan_reverse(None, |entry| {
            found = Some(entry.to_vec());
            false
        })? {
            ScanOutcome::MissingPage => Ok(FindOutcome::MissingPage),
            _ => Ok(found.map_or(FindOutcome::NotFound, FindOutcome::Found)),
        }
    }

    /// Smallest entry that starts with `prefix`
    pub fn find_first_with_prefix(&self, prefix: &[u8]) -> Result<FindOutcome> {
        let mut found = None;
        match self.scan(Some(prefix), |entry| {
            if entry.starts_with(prefix) {
                found = Some(entry.to_vec());
            }
            false
        })? {
            ScanOutcome::MissingPage => Ok(FindOutcome::MissingPage),
            _ => Ok(found.map_or(FindOutcome::NotFound, FindOutcome::Found)),
        }
    }

    /// All entries that start with `prefix`, in ascending order; `None` when
    /// a page was unavailable
    pub fn find_all_with_prefix(&self, prefix: &[u8]) -> Result<Option<Vec<Vec<u8>>>> {
        let mut matches = Vec::new();
        match self.scan(Some(prefix), |entry| {
            if entry.starts_with(prefix) {
                matches.push(entry.to_vec());
                true
            } else {
                false
            }
        })? {
            ScanOutcome::MissingPage => Ok(None),
            _ => Ok(Some(matches)),
        }
    }

    /// Count the entries within the given bounds without visiting every
    /// leaf: children strictly inside the range are counted wholesale and
    /// only the boundary children are descended. Returns `None` when a page
    /// on the path was unavailable.
    pub fn count_in_range(
        &self,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
    ) -> Result<Option<u64>> {
        self.count_page(self.root(), start, end)
    }

    fn count_page(
        &self,
        page_no: PageNumber,
        start: Bound<&[u8]>,
        end: Bound<&[u8]>,
    ) -> Result<Option<u64>> {
        let Some(buf) = self.read_page(page_no) else {
            return Ok(None);
        };
        enum Plan {
            Leaf(u64),
            Inner {
                children: Vec<PageNumber>,
                first: usize,
                last: usize,
            },
        }
        let plan = {
            let data = buf.borrow();
            let node = Node::parse(&data)?;
            let entries = node.entries()?;
            match node.role() {
                PageRole::Leaf => {
                    let low = match start {
                        Bound::Unbounded => 0,
                        Bound::Included(key) => match entries.search(key)? {
                            Ok(i) | Err(i) => i,
                        },
                        Bound::Excluded(key) => match entries.search(key)? {
                            Ok(i) => i + 1,
                            Err(i) => i,
                        },
                    };
                    let high = match end {
                        Bound::Unbounded => entries.count(),
                        Bound::Included(key) => match entries.search(key)? {
                            Ok(i) => i + 1,
                            Err(i) => i,
                        },
                        Bound::Excluded(key) => match entries.search(key)? {
                            Ok(i) | Err(i) => i,
                        },
                    };
                    Plan::Leaf(high.saturating_sub(low) as u64)
                }
                PageRole::Inner => {
                    let first = match start {
                        Bound::Unbounded => 0,
                        // Entries equal to a separator live in its right
                        // child, so an inclusive start matching a separator
                        // must descend there.
                        Bound::Included(key) | Bound::Excluded(key) => {
                            start_child_for(&entries, key)?
                        }
                    };
                    let last = match end {
                        Bound::Unbounded => entries.count(),
                        Bound::Included(key) => start_child_for(&entries, key)?,
                        // An exclusive end equal to a separator stops at the
                        // separator's left child.
                        Bound::Excluded(key) => match entries.search(key)? {
                            Ok(i) | Err(i) => i,
                        },
                    };
                    if last < first {
                        return Ok(Some(0));
                    }
                    let children = (first..=last).map(|i| node.child(i)).collect();
                    Plan::Inner {
                        children,
                        first,
                        last,
                    }
                }
            }
        };
        match plan {
            Plan::Leaf(count) => Ok(Some(count)),
            Plan::Inner {
                children,
                first,
                last,
            } => {
                let mut total = 0u64;
                for (offset, child) in children.into_iter().enumerate() {
                    let index = first + offset;
                    // Boundary children are clipped recursively; everything
                    // strictly between them lies inside the range.
                    let count = if index == first || index == last {
                        self.count_page(child, start, end)?
                    } else {
                        self.count_all(child)?
                    };
                    match count {
                        Some(n) => total += n,
                        None => return Ok(None),
                    }
                }
                Ok(Some(total))
            }
        }
    }

    fn count_all(&self, page_no: PageNumber) -> Result<Option<u64>> {
        let Some(buf) = self.read_page(page_no) else {
            return Ok(None);
        };
        let children = {
            let data = buf.borrow();
            let node = Node::parse(&data)?;
            match node.role() {
                PageRole::Leaf => return Ok(Some(node.entries()?.count() as u64)),
                PageRole::Inner => (0..=node.entries()?.count())
                    .map(|i| node.child(i))
                    .collect::<Vec<_>>(),
            }
        };
        let mut total = 0u64;
        for child in children {
            match self.count_all(child)? {
                Some(n) => total += n,
                None => return Ok(None),
            }
        }
        Ok(Some(total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::btree::node::{self, NodeMut};
    use crate::page::PageBuf;
    use crate::provider::{MemoryPageProvider, PageProviderForWrite};

    /// A provider whose pages are all unavailable
    struct UnavailableProvider;

    impl PageProvider for UnavailableProvider {
        fn page_size(&self) -> usize {
            400
        }

        fn page(&self, _page: PageNumber) -> Option<PageBuf> {
            None
        }
    }

    fn write_leaf(provider: &mut MemoryPageProvider, page: PageNumber, entries: &[&[u8]]) {
        let buf = provider.page_for_update(page);
        let mut data = buf.borrow_mut();
        node::init_leaf(&mut data);
        let mut node = NodeMut::parse(&mut data).unwrap();
        let mut region = node.entries_mut().unwrap();
        for entry in entries {
            assert!(region.insert(entry).unwrap());
        }
    }

    /// The counting fixture: two small leaves and one five-entry leaf under
    /// an inner root with separators `[3]` and `[4, 1]`
    fn count_fixture() -> BTree<MemoryPageProvider> {
        let mut provider = MemoryPageProvider::new(400);
        let root = provider.allocate();
        let leaves: Vec<PageNumber> = (0..3).map(|_| provider.allocate()).collect();
        write_leaf(&mut provider, leaves[0], &[&[1], &[2]]);
        write_leaf(&mut provider, leaves[1], &[&[3], &[4]]);
        write_leaf(
            &mut provider,
            leaves[2],
            &[&[5], &[6], &[6, 1], &[7], &[8]],
        );
        {
            let buf = provider.page_for_update(root);
            let mut data = buf.borrow_mut();
            node::init_inner(&mut data, 2);
            let mut node = NodeMut::parse(&mut data).unwrap();
            for (i, leaf) in leaves.iter().enumerate() {
                node.set_child(i, *leaf);
            }
            let mut region = node.entries_mut().unwrap();
            assert!(region.insert(&[3]).unwrap());
            assert!(region.insert(&[4, 1]).unwrap());
        }
        BTree::open(provider, root).unwrap()
    }

    fn fixture_entries() -> Vec<Vec<u8>> {
        vec![
            vec![1],
            vec![2],
            vec![3],
            vec![4],
            vec![5],
            vec![6],
            vec![6, 1],
            vec![7],
            vec![8],
        ]
    }

    #[test]
    fn test_count_total_and_empty_range() {
        let tree = count_fixture();
        tree.check_integrity().unwrap();
        assert_eq!(
            tree.count_in_range(Bound::Unbounded, Bound::Unbounded)
                .unwrap(),
            Some(9)
        );
        assert_eq!(
            tree.count_in_range(Bound::Included(&[100][..]), Bound::Excluded(&[0][..]))
                .unwrap(),
            Some(0)
        );
    }

    #[test]
    fn test_count_between_entries() {
        let tree = count_fixture();
        let entries = fixture_entries();
        for i in 0..entries.len() {
            for j in i..entries.len() {
                let start = entries[i].as_slice();
                let end = entries[j].as_slice();
                assert_eq!(
                    tree.count_in_range(Bound::Included(start), Bound::Excluded(end))
                        .unwrap(),
                    Some((j - i) as u64),
                    "[e{i}, e{j})"
                );
                assert_eq!(
                    tree.count_in_range(Bound::Included(start), Bound::Included(end))
                        .unwrap(),
                    Some((j - i + 1) as u64),
                    "[e{i}, e{j}]"
                );
                assert_eq!(
                    tree.count_in_range(Bound::Excluded(start), Bound::Included(end))
                        .unwrap(),
                    Some((j - i) as u64),
                    "(e{i}, e{j}]"
                );
                assert_eq!(
                    tree.count_in_range(Bound::Excluded(start), Bound::Excluded(end))
                        .unwrap(),
                    Some((j - i).saturating_sub(1) as u64),
                    "(e{i}, e{j})"
                );
            }
        }
    }

    #[test]
    fn test_count_unknown_on_missing_root() {
        let tree = BTree::open(UnavailableProvider, PageNumber::new(0)).unwrap();
        assert_eq!(
            tree.count_in_range(Bound::Unbounded, Bound::Unbounded)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_count_matches_scan_on_grown_tree() {
        let mut tree = BTree::create(MemoryPageProvider::new(400)).unwrap();
        let entries: Vec<Vec<u8>> = (0..300u16)
            .map(|i| [vec![9u8; 25], i.to_be_bytes().to_vec()].concat())
            .collect();
        for entry in &entries {
            assert!(tree.insert(entry).unwrap());
        }

        for (i, j) in [(0usize, 300usize), (0, 1), (17, 212), (100, 100), (299, 300)] {
            let start = entries[i].as_slice();
            let end_bound = match entries.get(j) {
                Some(e) => Bound::Excluded(e.as_slice()),
                None => Bound::Unbounded,
            };
            let mut scanned = 0u64;
            tree.scan(Some(start), |entry| {
                let below_end = match end_bound {
                    Bound::Excluded(end) => entry < end,
                    _ => true,
                };
                if below_end {
                    scanned += 1;
                }
                below_end
            })
            .unwrap();
            assert_eq!(
                tree.count_in_range(Bound::Included(start), end_bound).unwrap(),
                Some(scanned),
                "range {i}..{j}"
            );
        }
    }

    #[test]
    fn test_find_first_and_last() {
        let mut tree = BTree::create(MemoryPageProvider::new(400)).unwrap();
        assert_eq!(tree.find_first().unwrap(), FindOutcome::NotFound);
        assert_eq!(tree.find_last().unwrap(), FindOutcome::NotFound);

        for i in 0..200u16 {
            let entry = [vec![3u8; 30], i.to_be_bytes().to_vec()].concat();
            assert!(tree.insert(&entry).unwrap());
        }
        assert_eq!(
            tree.find_first().unwrap(),
            FindOutcome::Found([vec![3u8; 30], 0u16.to_be_bytes().to_vec()].concat())
        );
        assert_eq!(
            tree.find_last().unwrap(),
            FindOutcome::Found([vec![3u8; 30], 199u16.to_be_bytes().to_vec()].concat())
        );
    }

    fn prefix_tree() -> BTree<MemoryPageProvider> {
        let mut tree = BTree::create(MemoryPageProvider::new(400)).unwrap();
        for i in 0..3u8 {
            for j in 0..100u8 {
                assert!(tree.insert(&[i, j]).unwrap());
            }
        }
        tree
    }

    #[test]
    fn test_prefix_lookup() {
        let tree = prefix_tree();

        assert_eq!(
            tree.find_first_with_prefix(&[1]).unwrap(),
            FindOutcome::Found(vec![1, 0])
        );
        let all = tree.find_all_with_prefix(&[1]).unwrap().unwrap();
        assert_eq!(all.len(), 100);
        assert_eq!(all.first().unwrap(), &vec![1, 0]);
        assert_eq!(all.last().unwrap(), &vec![1, 99]);
        assert!(all.iter().all(|e| e.starts_with(&[1])));

        assert_eq!(
            tree.find_first_with_prefix(&[3]).unwrap(),
            FindOutcome::NotFound
        );
        assert_eq!(
            tree.find_all_with_prefix(&[3]).unwrap(),
            Some(Vec::new())
        );
    }

    #[test]
    fn test_prefix_completeness() {
        let tree = prefix_tree();

        let mut full = Vec::new();
        tree.scan(None, |entry| {
            full.push(entry.to_vec());
            true
        })
        .unwrap();
        let filtered: Vec<Vec<u8>> = full
            .iter()
            .filter(|e| e.starts_with(&[2]))
            .cloned()
            .collect();
        assert_eq!(tree.find_all_with_prefix(&[2]).unwrap().unwrap(), filtered);

        // The empty prefix matches everything.
        assert_eq!(tree.find_all_with_prefix(&[]).unwrap().unwrap(), full);
    }

    #[test]
    fn test_queries_report_missing_pages() {
        let tree = BTree::open(UnavailableProvider, PageNumber::new(5)).unwrap();

        let outcome = tree.scan(None, |_| true).unwrap();
        assert_eq!(outcome, ScanOutcome::MissingPage);
        let outcome = tree.scan_reverse(None, |_| true).unwrap();
        assert_eq!(outcome, ScanOutcome::MissingPage);

        assert_eq!(tree.find_first().unwrap(), FindOutcome::MissingPage);
        assert_eq!(tree.find_last().unwrap(), FindOutcome::MissingPage);
        assert_eq!(
            tree.find_first_with_prefix(&[1]).unwrap(),
            FindOutcome::MissingPage
        );
        assert_eq!(tree.find_all_with_prefix(&[1]).unwrap(), None);
    }

    #[test]
    fn test_scan_stops_at_released_leaf() {
        let mut tree = BTree::create(MemoryPageProvider::new(400)).unwrap();
        let entries: Vec<Vec<u8>> = (0..120u16)
            .map(|i| [vec![5u8; 30], i.to_be_bytes().to_vec()].concat())
            .collect();
        for entry in &entries {
            assert!(tree.insert(entry).unwrap());
        }
        // Drop the right-most subtree behind the tree's back.
        let rightmost = {
            let buf = tree.provider().page(tree.root()).unwrap();
            let data = buf.borrow();
            let node = Node::parse(&data).unwrap();
            assert!(!node.is_leaf());
            node.child(node.separator_count().unwrap())
        };
        tree.provider_mut().release(rightmost);

        assert_eq!(tree.scan(None, |_| true).unwrap(), ScanOutcome::MissingPage);
        assert_eq!(
            tree.count_in_range(Bound::Unbounded, Bound::Unbounded).unwrap(),
            None
        );
    }
}
