//! B+-tree core: construction, insertion with splits, removal with merges.
//!
//! The tree is identified by its root page number, which stays the same for
//! the whole lifetime of the tree: growing rewrites the root in place as an
//! inner page over freshly allocated children, collapsing copies the last
//! surviving child back into the root buffer.
//!
//! Inserts descend to a leaf and split on the way back up; each split hands
//! `(separator, new right sibling)` to its parent. Removals descend with
//! the parent position at hand and merge underfull pages into their *left*
//! sibling only, which keeps the bookkeeping small at the cost of leaving
//! the left-most page of each level exempt from merging.

use crate::btree::node::{self, Node, NodeMut, PageRole};
use crate::error::{Result, TreeError};
use crate::page::{entry_cost, PageBuf, PageEntries};
use crate::provider::{PageProvider, PageProviderForWrite};
use crate::types::{
    max_entry_length, over_merge_threshold, PageNumber, MAX_PAGE_SIZE, MIN_PAGE_SIZE,
};
use log::debug;

/// A B+-tree over pages supplied by a page provider.
///
/// Queries need only a [`PageProvider`]; mutations additionally require a
/// [`PageProviderForWrite`]. Entry views handed to scan callbacks alias page
/// buffers and must be copied before the next mutating operation.
pub struct BTree<P> {
    provider: P,
    root: PageNumber,
    page_size: usize,
}

/// Result of a recursive insert below some page
enum InsertOutcome {
    /// Insert finished; `inserted` is false when an equal entry existed
    Done { inserted: bool },
    /// The page split; the parent must record the new right sibling
    Split {
        separator: Vec<u8>,
        right: PageNumber,
    },
}

/// Result of a recursive remove below some page
enum RemoveOutcome {
    NotPresent,
    Removed,
    /// The child page released itself; the parent must drop one separator
    /// and one child pointer
    ChildGone,
}

/// Position of a page within its parent during a removal descent
struct ParentCtx {
    page: PageNumber,
    child_index: usize,
}

/// Child slot to descend into for an entry: the number of separators
/// less than or equal to it (separators bound their right child inclusively)
fn child_index_for(separators: &PageEntries<'_>, entry: &[u8]) -> Result<usize> {
    Ok(match separators.search(entry)? {
        Ok(i) => i + 1,
        Err(i) => i,
    })
}

/// Smallest split index where the cumulative byte length of the left part
/// reaches half of the total, clamped so both sides stay non-empty
fn find_split_index(entries: &[Vec<u8>]) -> usize {
    let total: usize = entries.iter().map(Vec::len).sum();
    let mut cumulative = 0;
    for (i, entry) in entries.iter().enumerate() {
        cumulative += entry.len();
        if 2 * cumulative >= total {
            return (i + 1).clamp(1, entries.len() - 1);
        }
    }
    entries.len() - 1
}

/// Shortest prefix of `right` that sorts strictly greater than `left`:
/// everything up to and including the first differing byte
fn separator_between(left: &[u8], right: &[u8]) -> Vec<u8> {
    let common = left
        .iter()
        .zip(right.iter())
        .take_while(|(a, b)| a == b)
        .count();
    debug_assert!(common < right.len());
    right[..common + 1].to_vec()
}

impl<P: PageProvider> BTree<P> {
    /// Attach to an existing tree rooted at `root`
    pub fn open(provider: P, root: PageNumber) -> Result<Self> {
        let page_size = provider.page_size();
        validate_page_size(page_size)?;
        Ok(Self {
            provider,
            root,
            page_size,
        })
    }

    /// The root page number; stable for the lifetime of the tree
    pub fn root(&self) -> PageNumber {
        self.root
    }

    /// Page size of the underlying provider
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Longest entry this tree accepts
    pub fn max_entry_length(&self) -> usize {
        max_entry_length(self.page_size)
    }

    /// Shared access to the page provider
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Exclusive access to the page provider
    pub fn provider_mut(&mut self) -> &mut P {
        &mut self.provider
    }

    /// Consume the tree, returning the provider
    pub fn into_provider(self) -> P {
        self.provider
    }

    pub(crate) fn read_page(&self, page: PageNumber) -> Option<PageBuf> {
        self.provider.page(page)
    }

    fn require_page(&self, page: PageNumber) -> Result<PageBuf> {
        self.provider
            .page(page)
            .ok_or(TreeError::PageUnavailable(page))
    }
}

fn validate_page_size(page_size: usize) -> Result<()> {
    if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(TreeError::bad_page(format!(
            "page size {page_size} out of range [{MIN_PAGE_SIZE}, {MAX_PAGE_SIZE}]"
        )));
    }
    // An inner split must leave both halves with a child and room for one
    // more.
    if node::child_capacity(page_size) < 3 {
        return Err(TreeError::bad_page(format!(
            "page size {page_size} leaves fewer than 3 child slots"
        )));
    }
    Ok(())
}

impl<P: PageProviderForWrite> BTree<P> {
    /// Allocate and initialize a new empty tree (a single empty leaf)
    pub fn create(mut provider: P) -> Result<Self> {
        let page_size = provider.page_size();
        validate_page_size(page_size)?;
        let root = provider.allocate();
        {
            let buf = provider.page_for_update(root);
            let mut data = buf.borrow_mut();
            node::init_leaf(&mut data);
        }
        debug!("created tree with root page {root}");
        Ok(Self {
            provider,
            root,
            page_size,
        })
    }

    /// Insert an entry. Returns `false` when an equal entry already exists.
    pub fn insert(&mut self, entry: &[u8]) -> Result<bool> {
        let max = self.max_entry_length();
        if entry.len() > max {
            return Err(TreeError::EntryTooLong {
                size: entry.len(),
                max,
            });
        }
        match self.insert_into(self.root, entry, true)? {
            InsertOutcome::Done { inserted } => Ok(inserted),
            InsertOutcome::Split { separator, right } => {
                self.split_root(separator, right)?;
                Ok(true)
            }
        }
    }

    /// Remove an entry. Returns `false` when no equal entry exists.
    pub fn remove(&mut self, entry: &[u8]) -> Result<bool> {
        match self.remove_from(self.root, entry, None)? {
            RemoveOutcome::NotPresent => Ok(false),
            RemoveOutcome::Removed => Ok(true),
            RemoveOutcome::ChildGone => Err(TreeError::corruption(
                "root page reported itself removed",
            )),
        }
    }

    fn insert_into(
        &mut self,
        page_no: PageNumber,
        entry: &[u8],
        right_edge: bool,
    ) -> Result<InsertOutcome> {
        let buf = self.require_page(page_no)?;
        let role = {
            let data = buf.borrow();
            Node::parse(&data)?.role()
        };
        match role {
            PageRole::Leaf => self.insert_into_leaf(page_no, entry, right_edge),
            PageRole::Inner => {
                let (child_index, child_no, separator_count) = {
                    let data = buf.borrow();
                    let node = Node::parse(&data)?;
                    let separators = node.entries()?;
                    let index = child_index_for(&separators, entry)?;
                    (index, node.child(index), separators.count())
                };
                let child_right_edge = right_edge && child_index == separator_count;
                match self.insert_into(child_no, entry, child_right_edge)? {
                    InsertOutcome::Split { separator, right } => {
                        self.insert_into_inner(page_no, child_index, separator, right, right_edge)
                    }
                    done => Ok(done),
                }
            }
        }
    }

    fn insert_into_leaf(
        &mut self,
        page_no: PageNumber,
        entry: &[u8],
        right_edge: bool,
    ) -> Result<InsertOutcome> {
        {
            let buf = self.require_page(page_no)?;
            let data = buf.borrow();
            if Node::parse(&data)?.entries()?.contains(entry)? {
                return Ok(InsertOutcome::Done { inserted: false });
            }
        }
        let buf = self.provider.page_for_update(page_no);
        {
            let mut data = buf.borrow_mut();
            let mut node = NodeMut::parse(&mut data)?;
            if node.entries_mut()?.insert(entry)? {
                return Ok(InsertOutcome::Done { inserted: true });
            }
        }
        self.split_leaf(page_no, &buf, entry, right_edge)
    }

    /// Split a full leaf while inserting `entry`
    fn split_leaf(
        &mut self,
        page_no: PageNumber,
        buf: &PageBuf,
        entry: &[u8],
        right_edge: bool,
    ) -> Result<InsertOutcome> {
        let (all, new_index) = {
            let data = buf.borrow();
            let entries = Node::parse(&data)?.entries()?;
            let mut all: Vec<Vec<u8>> = entries
                .read_all()?
                .into_iter()
                .map(<[u8]>::to_vec)
                .collect();
            let index = match entries.search(entry)? {
                Ok(_) => {
                    return Err(TreeError::corruption(
                        "splitting a leaf for an entry it already holds",
                    ))
                }
                Err(i) => i,
            };
            all.insert(index, entry.to_vec());
            (all, index)
        };
        let total = all.len();

        // Ascending inserts at the right edge of the tree would leave every
        // leaf half-empty; send only the new entry to the new page instead.
        let split_at = if right_edge && new_index == total - 1 {
            total - 1
        } else {
            find_split_index(&all)
        };
        let separator = separator_between(&all[split_at - 1], &all[split_at]);

        let right_no = self.provider.allocate();
        {
            let right_buf = self.provider.page_for_update(right_no);
            let mut right_data = right_buf.borrow_mut();
            node::init_leaf(&mut right_data);
            let mut right_node = NodeMut::parse(&mut right_data)?;
            let mut right_entries = right_node.entries_mut()?;
            for moved in &all[split_at..] {
                if !right_entries.insert(moved)? {
                    return Err(TreeError::corruption("split target leaf overflowed"));
                }
            }
        }
        {
            let mut data = buf.borrow_mut();
            let mut node = NodeMut::parse(&mut data)?;
            let mut entries = node.entries_mut()?;
            for (i, moved) in all.iter().enumerate().skip(split_at).rev() {
                if i == new_index {
                    continue;
                }
                if !entries.remove(moved)? {
                    return Err(TreeError::corruption("entry vanished during leaf split"));
                }
            }
            if new_index < split_at && !entries.insert_or_defragment(entry)? {
                return Err(TreeError::corruption(
                    "new entry does not fit the left leaf after split",
                ));
            }
        }

        let left_count = self.entry_count_of(page_no)?;
        let right_count = self.entry_count_of(right_no)?;
        if left_count == 0 || right_count == 0 || left_count + right_count != total {
            return Err(TreeError::corruption(format!(
                "leaf split lost entries: {left_count} + {right_count} != {total}"
            )));
        }
        debug!(
            "split leaf {page_no} at {split_at}/{total} into {right_no} \
             (separator {} bytes)",
            separator.len()
        );
        Ok(InsertOutcome::Split {
            separator,
            right: right_no,
        })
    }

    /// Record a child split in an inner page, splitting it in turn when full
    fn insert_into_inner(
        &mut self,
        page_no: PageNumber,
        child_index: usize,
        separator: Vec<u8>,
        new_child: PageNumber,
        right_edge: bool,
    ) -> Result<InsertOutcome> {
        let capacity = node::child_capacity(self.page_size);
        let buf = self.provider.page_for_update(page_no);
        {
            let mut data = buf.borrow_mut();
            let mut node = NodeMut::parse(&mut data)?;
            let child_count = node.as_node().separator_count()? + 1;
            if child_count < capacity - 1 {
                let inserted = node.entries_mut()?.insert(&separator)?;
                if inserted {
                    node.insert_child(child_index + 1, new_child, child_count);
                    return Ok(InsertOutcome::Done { inserted: true });
                }
            }
        }
        self.split_inner(page_no, &buf, child_index, separator, new_child, right_edge)
    }

    /// Split a full inner page while recording `(separator, new_child)`
    fn split_inner(
        &mut self,
        page_no: PageNumber,
        buf: &PageBuf,
        child_index: usize,
        separator: Vec<u8>,
        new_child: PageNumber,
        right_edge: bool,
    ) -> Result<InsertOutcome> {
        let (mut separators, mut children, height) = {
            let data = buf.borrow();
            let node = Node::parse(&data)?;
            let entries = node.entries()?;
            let separators: Vec<Vec<u8>> = entries
                .read_all()?
                .into_iter()
                .map(<[u8]>::to_vec)
                .collect();
            let children: Vec<PageNumber> =
                (0..=separators.len()).map(|i| node.child(i)).collect();
            (separators, children, node.height())
        };
        debug_assert!(child_index == 0 || separators[child_index - 1] < separator);
        debug_assert!(child_index >= separators.len() || separator < separators[child_index]);
        separators.insert(child_index, separator);
        children.insert(child_index + 1, new_child);
        let count = separators.len();

        // The promoted separator moves to the parent instead of being copied.
        let middle = if right_edge && child_index == count - 1 {
            count - 1
        } else {
            let split_at = find_split_index(&separators);
            if split_at > 1 {
                split_at - 1
            } else {
                split_at
            }
        };
        let promoted = separators[middle].clone();

        let right_no = self.provider.allocate();
        {
            let right_buf = self.provider.page_for_update(right_no);
            let mut right_data = right_buf.borrow_mut();
            node::init_inner(&mut right_data, height);
            let mut right_node = NodeMut::parse(&mut right_data)?;
            for (i, child) in children[middle + 1..].iter().enumerate() {
                right_node.set_child(i, *child);
            }
            let mut right_entries = right_node.entries_mut()?;
            for moved in &separators[middle + 1..] {
                if !right_entries.insert(moved)? {
                    return Err(TreeError::corruption("split target inner page overflowed"));
                }
            }
        }
        {
            let mut data = buf.borrow_mut();
            node::init_inner(&mut data, height);
            let mut node = NodeMut::parse(&mut data)?;
            for (i, child) in children[..=middle].iter().enumerate() {
                node.set_child(i, *child);
            }
            let mut entries = node.entries_mut()?;
            for kept in &separators[..middle] {
                if !entries.insert(kept)? {
                    return Err(TreeError::corruption(
                        "separators no longer fit their own page after split",
                    ));
                }
            }
        }
        debug!(
            "split inner {page_no} at {middle}/{count} into {right_no}, \
             promoting a {}-byte separator",
            promoted.len()
        );
        Ok(InsertOutcome::Split {
            separator: promoted,
            right: right_no,
        })
    }

    /// Grow the tree: move the old root contents aside and rewrite the root
    /// in place as a two-child inner page, keeping its page number
    fn split_root(&mut self, separator: Vec<u8>, right: PageNumber) -> Result<()> {
        let left = self.provider.allocate();
        let root_buf = self.provider.page_for_update(self.root);
        let left_buf = self.provider.page_for_update(left);
        let old_height = {
            let root_data = root_buf.borrow();
            let mut left_data = left_buf.borrow_mut();
            left_data.copy_from_slice(&root_data);
            Node::parse(&root_data)?.height()
        };
        {
            let mut root_data = root_buf.borrow_mut();
            node::init_inner(&mut root_data, old_height.saturating_add(1));
            let mut root_node = NodeMut::parse(&mut root_data)?;
            root_node.set_child(0, left);
            root_node.set_child(1, right);
            if !root_node.entries_mut()?.insert(&separator)? {
                return Err(TreeError::corruption(
                    "separator does not fit an empty root",
                ));
            }
        }
        debug!(
            "root {} grew to height {}: old contents moved to {left}, right sibling {right}",
            self.root,
            old_height.saturating_add(1)
        );
        Ok(())
    }

    fn remove_from(
        &mut self,
        page_no: PageNumber,
        entry: &[u8],
        parent: Option<&ParentCtx>,
    ) -> Result<RemoveOutcome> {
        let buf = self.require_page(page_no)?;
        let role = {
            let data = buf.borrow();
            Node::parse(&data)?.role()
        };
        match role {
            PageRole::Leaf => self.remove_from_leaf(page_no, entry, parent),
            PageRole::Inner => {
                let (child_index, child_no) = {
                    let data = buf.borrow();
                    let node = Node::parse(&data)?;
                    let index = child_index_for(&node.entries()?, entry)?;
                    (index, node.child(index))
                };
                let ctx = ParentCtx {
                    page: page_no,
                    child_index,
                };
                match self.remove_from(child_no, entry, Some(&ctx))? {
                    RemoveOutcome::ChildGone => {
                        self.handle_removed_child(page_no, child_index, parent)
                    }
                    other => Ok(other),
                }
            }
        }
    }

    fn remove_from_leaf(
        &mut self,
        page_no: PageNumber,
        entry: &[u8],
        parent: Option<&ParentCtx>,
    ) -> Result<RemoveOutcome> {
        let count = {
            let buf = self.require_page(page_no)?;
            let data = buf.borrow();
            let entries = Node::parse(&data)?.entries()?;
            if !entries.contains(entry)? {
                return Ok(RemoveOutcome::NotPresent);
            }
            entries.count()
        };

        if let Some(ctx) = parent {
            if count == 1 {
                self.provider.release(page_no);
                debug!("released leaf {page_no} after removing its last entry");
                return Ok(RemoveOutcome::ChildGone);
            }
            if ctx.child_index > 0 {
                let left_no = self.child_of(ctx.page, ctx.child_index - 1)?;
                if self.leaf_merge_candidate(page_no)? && self.leaf_merge_candidate(left_no)? {
                    self.merge_leaf_into_left(page_no, left_no, entry)?;
                    self.provider.release(page_no);
                    return Ok(RemoveOutcome::ChildGone);
                }
            }
        }

        let buf = self.provider.page_for_update(page_no);
        let mut data = buf.borrow_mut();
        let mut node = NodeMut::parse(&mut data)?;
        if !node.entries_mut()?.remove(entry)? {
            return Err(TreeError::corruption("entry vanished before removal"));
        }
        Ok(RemoveOutcome::Removed)
    }

    /// React to a child page having released itself at `child_index`
    fn handle_removed_child(
        &mut self,
        page_no: PageNumber,
        child_index: usize,
        parent: Option<&ParentCtx>,
    ) -> Result<RemoveOutcome> {
        let separator_count = {
            let buf = self.require_page(page_no)?;
            let data = buf.borrow();
            Node::parse(&data)?.separator_count()?
        };

        let Some(ctx) = parent else {
            // The root absorbs shrinkage in place to keep its page number.
            if separator_count == 0 {
                let buf = self.provider.page_for_update(page_no);
                let mut data = buf.borrow_mut();
                node::init_leaf(&mut data);
                debug!("root {page_no} lost its only child; tree is empty");
                return Ok(RemoveOutcome::Removed);
            }
            if separator_count == 1 {
                let survivor = self.child_of(page_no, 1 - child_index)?;
                let survivor_buf = self.require_page(survivor)?;
                let root_buf = self.provider.page_for_update(page_no);
                {
                    let survivor_data = survivor_buf.borrow();
                    let mut root_data = root_buf.borrow_mut();
                    root_data.copy_from_slice(&survivor_data);
                }
                self.provider.release(survivor);
                debug!("collapsed root {page_no}: adopted surviving child {survivor}");
                return Ok(RemoveOutcome::Removed);
            }
            self.drop_separator_and_child(page_no, child_index)?;
            return Ok(RemoveOutcome::Removed);
        };

        if separator_count == 0 {
            // This page just lost its only child; nothing remains.
            self.provider.release(page_no);
            debug!("released empty inner page {page_no}");
            return Ok(RemoveOutcome::ChildGone);
        }
        self.drop_separator_and_child(page_no, child_index)?;

        if ctx.child_index > 0 {
            let left_no = self.child_of(ctx.page, ctx.child_index - 1)?;
            let pulled = self.separator_at(ctx.page, ctx.child_index - 1)?;
            if self.inner_merge_candidate(page_no, 0)?
                && self.inner_merge_candidate(left_no, entry_cost(pulled.len()))?
            {
                self.merge_inner_into_left(page_no, left_no, &pulled)?;
                self.provider.release(page_no);
                return Ok(RemoveOutcome::ChildGone);
            }
        }
        Ok(RemoveOutcome::Removed)
    }

    /// Locally remove separator `max(0, child_index - 1)` and the child
    /// pointer at `child_index`
    fn drop_separator_and_child(&mut self, page_no: PageNumber, child_index: usize) -> Result<()> {
        let buf = self.provider.page_for_update(page_no);
        let mut data = buf.borrow_mut();
        let mut node = NodeMut::parse(&mut data)?;
        let separator_count = node.as_node().separator_count()?;
        let separator = node
            .as_node()
            .entries()?
            .get(child_index.saturating_sub(1))?
            .to_vec();
        if !node.entries_mut()?.remove(&separator)? {
            return Err(TreeError::corruption("separator vanished during removal"));
        }
        node.remove_child(child_index, separator_count + 1);
        Ok(())
    }

    fn entry_count_of(&self, page_no: PageNumber) -> Result<usize> {
        let buf = self.require_page(page_no)?;
        let data = buf.borrow();
        Ok(Node::parse(&data)?.entries()?.count())
    }

    fn child_of(&self, page_no: PageNumber, index: usize) -> Result<PageNumber> {
        let buf = self.require_page(page_no)?;
        let data = buf.borrow();
        Ok(Node::parse(&data)?.child(index))
    }

    fn separator_at(&self, page_no: PageNumber, index: usize) -> Result<Vec<u8>> {
        let buf = self.require_page(page_no)?;
        let data = buf.borrow();
        Ok(Node::parse(&data)?.entries()?.get(index)?.to_vec())
    }

    /// Whether a leaf qualifies for merging: at least 7/10 of its entries
    /// region is free
    fn leaf_merge_candidate(&self, page_no: PageNumber) -> Result<bool> {
        let buf = self.require_page(page_no)?;
        let data = buf.borrow();
        let node = Node::parse(&data)?;
        if !node.is_leaf() {
            return Err(TreeError::corruption("leaf sibling expected"));
        }
        let entries = node.entries()?;
        Ok(over_merge_threshold(
            entries.free_space(),
            entries.region_size(),
        ))
    }

    /// Whether an inner page qualifies for merging, requiring `extra_bytes`
    /// of headroom on top of the threshold (the separator pulled down from
    /// the parent when this page is the merge target)
    fn inner_merge_candidate(&self, page_no: PageNumber, extra_bytes: usize) -> Result<bool> {
        let buf = self.require_page(page_no)?;
        let data = buf.borrow();
        let node = Node::parse(&data)?;
        if node.is_leaf() {
            return Err(TreeError::corruption("inner sibling expected"));
        }
        let entries = node.entries()?;
        let capacity = node::child_capacity(self.page_size);
        let free_slots = capacity - (entries.count() + 1);
        Ok(over_merge_threshold(
            entries.free_space().saturating_sub(extra_bytes),
            entries.region_size(),
        ) && over_merge_threshold(free_slots, capacity))
    }

    /// Copy every entry of `from` except `excluded` into `to`
    fn merge_leaf_into_left(
        &mut self,
        from: PageNumber,
        to: PageNumber,
        excluded: &[u8],
    ) -> Result<()> {
        let survivors: Vec<Vec<u8>> = {
            let buf = self.require_page(from)?;
            let data = buf.borrow();
            Node::parse(&data)?
                .entries()?
                .read_all()?
                .into_iter()
                .filter(|e| *e != excluded)
                .map(<[u8]>::to_vec)
                .collect()
        };
        let buf = self.provider.page_for_update(to);
        let mut data = buf.borrow_mut();
        let mut node = NodeMut::parse(&mut data)?;
        let mut entries = node.entries_mut()?;
        for survivor in &survivors {
            if !entries.insert_or_defragment(survivor)? {
                return Err(TreeError::corruption("merge target leaf overflowed"));
            }
        }
        debug!("merged leaf {from} into left sibling {to}");
        Ok(())
    }

    /// Pull the parent separator down and append the separators and child
    /// pointers of `from` to `to`
    fn merge_inner_into_left(
        &mut self,
        from: PageNumber,
        to: PageNumber,
        pulled_separator: &[u8],
    ) -> Result<()> {
        let (from_separators, from_children) = {
            let buf = self.require_page(from)?;
            let data = buf.borrow();
            let node = Node::parse(&data)?;
            let separators: Vec<Vec<u8>> = node
                .entries()?
                .read_all()?
                .into_iter()
                .map(<[u8]>::to_vec)
                .collect();
            let children: Vec<PageNumber> =
                (0..=separators.len()).map(|i| node.child(i)).collect();
            (separators, children)
        };
        let buf = self.provider.page_for_update(to);
        let mut data = buf.borrow_mut();
        let mut node = NodeMut::parse(&mut data)?;
        let to_children = node.as_node().separator_count()? + 1;
        if to_children + from_children.len() > node::child_capacity(self.page_size) {
            return Err(TreeError::corruption("merge target ran out of child slots"));
        }
        {
            let mut entries = node.entries_mut()?;
            if !entries.insert_or_defragment(pulled_separator)? {
                return Err(TreeError::corruption("merge target inner page overflowed"));
            }
            for separator in &from_separators {
                if !entries.insert_or_defragment(separator)? {
                    return Err(TreeError::corruption("merge target inner page overflowed"));
                }
            }
        }
        for (i, child) in from_children.iter().enumerate() {
            node.set_child(to_children + i, *child);
        }
        debug!("merged inner page {from} into left sibling {to}");
        Ok(())
    }
}
