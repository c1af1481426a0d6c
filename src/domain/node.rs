//! In-memory tree model of a mind-map document.

use std::collections::BTreeSet;

use serde::Serialize;
use termtree::Tree;

use crate::domain::tag::TagId;

/// Tree element: title, attached tags and ordered children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub title: String,
    pub tags: BTreeSet<TagId>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tags: BTreeSet::new(),
            children: Vec::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<TagId>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn has_any_tag(&self, selected: &BTreeSet<TagId>) -> bool {
        self.tags.iter().any(|t| selected.contains(t))
    }

    /// Number of nodes in this subtree, including self.
    pub fn count(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.children.iter());
        }
        total
    }

    /// Pre-order iterator over this subtree, paired with the depth (root = 1).
    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter {
            stack: vec![(self, 1)],
        }
    }
}

// Children are released from a heap stack. The derived `Clone` and `PartialEq`
// still recurse; loaded documents stay within serde_json's nesting limit.
impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

pub struct NodeIter<'a> {
    stack: Vec<(&'a Node, usize)>,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = (&'a Node, usize);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, depth) = self.stack.pop()?;
        // Reverse push keeps left-to-right document order
        for child in node.children.iter().rev() {
            self.stack.push((child, depth + 1));
        }
        Some((node, depth))
    }
}

/// One independent tree of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sheet {
    pub title: String,
    pub root: Node,
}

impl Sheet {
    pub fn new(title: impl Into<String>, root: Node) -> Self {
        Self {
            title: title.into(),
            root,
        }
    }
}

/// A whole document: one tree per sheet, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Forest {
    pub sheets: Vec<Sheet>,
}

impl Forest {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self { sheets }
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.sheets.iter().map(|s| s.root.count()).sum()
    }

    pub fn iter_nodes(&self) -> impl Iterator<Item = (&Node, usize)> {
        self.sheets.iter().flat_map(|s| s.root.iter())
    }
}

pub trait ToTree {
    fn to_tree(&self) -> Tree<String>;
}

fn tree_label(node: &Node) -> String {
    if node.tags.is_empty() {
        node.title.clone()
    } else {
        let tags: Vec<&str> = node.tags.iter().map(TagId::as_str).collect();
        format!("{} [{}]", node.title, tags.join(", "))
    }
}

impl ToTree for Node {
    fn to_tree(&self) -> Tree<String> {
        Tree::new(tree_label(self)).with_leaves(self.children.iter().map(|c| c.to_tree()))
    }
}

impl ToTree for Sheet {
    fn to_tree(&self) -> Tree<String> {
        self.root.to_tree()
    }
}
