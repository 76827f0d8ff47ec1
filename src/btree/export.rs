//! Tree structure export for visualization and debugging.

use serde::{Deserialize, Serialize};

use crate::btree::node::{Node, PageRole};
use crate::btree::tree::BTree;
use crate::error::Result;
use crate::provider::PageProvider;
use crate::types::PageNumber;

/// One tree page for visualization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Page number
    pub page: u32,
    /// Whether this is a leaf
    pub leaf: bool,
    /// Stored height (inner pages only)
    pub height: Option<u8>,
    /// Entries (leaf) or separators (inner), rendered as lossy UTF-8
    pub entries: Vec<String>,
    /// Child nodes (inner pages only)
    pub children: Vec<TreeNode>,
}

impl<P: PageProvider> BTree<P> {
    /// Export the tree structure for visualization.
    ///
    /// Returns `None` when any page of the tree is unavailable.
    pub fn export_tree(&self) -> Result<Option<TreeNode>> {
        self.export_page(self.root())
    }

    fn export_page(&self, page_no: PageNumber) -> Result<Option<TreeNode>> {
        let Some(buf) = self.read_page(page_no) else {
            return Ok(None);
        };
        let (leaf, height, entries, child_numbers) = {
            let data = buf.borrow();
            let node = Node::parse(&data)?;
            let entries: Vec<String> = node
                .entries()?
                .read_all()?
                .into_iter()
                .map(|e| String::from_utf8_lossy(e).into_owned())
                .collect();
            match node.role() {
                PageRole::Leaf => (true, None, entries, Vec::new()),
                PageRole::Inner => {
                    let children: Vec<PageNumber> =
                        (0..=entries.len()).map(|i| node.child(i)).collect();
                    (false, Some(node.height()), entries, children)
                }
            }
        };

        let mut children = Vec::with_capacity(child_numbers.len());
        for child in child_numbers {
            match self.export_page(child)? {
                Some(node) => children.push(node),
                None => return Ok(None),
            }
        }

        Ok(Some(TreeNode {
            page: page_no.value(),
            leaf,
            height,
            entries,
            children,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MemoryPageProvider;

    #[test]
    fn test_export_single_leaf() {
        let mut tree = BTree::create(MemoryPageProvider::new(400)).unwrap();
        assert!(tree.insert(b"alpha").unwrap());
        assert!(tree.insert(b"beta").unwrap());

        let exported = tree.export_tree().unwrap().unwrap();
        assert!(exported.leaf);
        assert_eq!(exported.page, tree.root().value());
        assert_eq!(exported.entries, vec!["alpha", "beta"]);
        assert!(exported.children.is_empty());

        let json = serde_json::to_value(&exported).unwrap();
        assert_eq!(json["leaf"], serde_json::json!(true));
        assert_eq!(json["entries"][0], serde_json::json!("alpha"));
    }

    #[test]
    fn test_export_two_levels() {
        let mut tree = BTree::create(MemoryPageProvider::new(400)).unwrap();
        for i in 0..40u8 {
            assert!(tree.insert(&[vec![b'k'; 20], vec![i]].concat()).unwrap());
        }
        let exported = tree.export_tree().unwrap().unwrap();
        assert!(!exported.leaf);
        assert_eq!(exported.height, Some(2));
        assert_eq!(exported.children.len(), exported.entries.len() + 1);
        assert!(exported.children.iter().all(|c| c.leaf));
    }

    #[test]
    fn test_export_missing_page() {
        let tree = BTree::create(MemoryPageProvider::new(400)).unwrap();
        let root = tree.root();
        let mut provider = tree.into_provider();
        use crate::provider::PageProviderForWrite;
        provider.release(root);
        let tree = BTree::open(provider, root).unwrap();
        assert!(tree.export_tree().unwrap().is_none());
    }
}
