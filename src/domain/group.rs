//! Re-nesting flat records into a grouping tree with per-subtree row counts.

use std::fmt;

use generational_arena::{Arena, Index};
use indexmap::IndexMap;
use termtree::Tree;
use tracing::{debug, instrument};

use crate::domain::node::ToTree;
use crate::domain::record::Record;

/// One group of the re-nested tree.
#[derive(Debug)]
pub struct GroupNode {
    /// Path component shared by every record below this group
    pub label: String,
    /// 1-based depth, equal to the spreadsheet column the label lands in
    pub depth: usize,
    pub parent: Option<Index>,
    /// Child groups keyed by label, in first-seen order
    pub children: IndexMap<String, Index>,
    /// Records whose path ends exactly at this group
    pub direct_records: Vec<Record>,
    /// Rows occupied by this group: direct records plus all descendant rows
    pub subtree_row_count: usize,
}

impl fmt::Display for GroupNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.subtree_row_count)
    }
}

/// Arena-backed grouping tree.
///
/// Records sharing a path prefix of length k live under the same group at
/// depth k. Top-level groups are kept in first-seen order in `roots`.
#[derive(Debug, Default)]
pub struct GroupTree {
    arena: Arena<GroupNode>,
    roots: IndexMap<String, Index>,
}

impl GroupTree {
    /// Sort, group and count. Records are stably sorted component-wise by
    /// path, so identical prefixes are contiguous and a prefix sorts before
    /// its extensions.
    #[instrument(level = "debug", skip(records), fields(records = records.len()))]
    pub fn build(mut records: Vec<Record>) -> Self {
        records.sort_by(|a, b| a.path.cmp(&b.path));

        let mut tree = Self::default();
        for record in records {
            tree.insert(record);
        }
        tree.finalize();
        debug!(
            "group: {} groups, {} rows, max depth {}",
            tree.len(),
            tree.total_rows(),
            tree.max_depth()
        );
        tree
    }

    #[instrument(level = "trace", skip(self, record))]
    fn insert(&mut self, record: Record) {
        let mut parent: Option<Index> = None;
        for (i, component) in record.path.iter().enumerate() {
            let existing = match parent {
                None => self.roots.get(component).copied(),
                Some(p) => self.arena[p].children.get(component).copied(),
            };
            let idx = match existing {
                Some(idx) => idx,
                None => self.insert_group(component.clone(), i + 1, parent),
            };
            parent = Some(idx);
        }

        match parent {
            Some(idx) => self.arena[idx].direct_records.push(record),
            None => debug!("group: ignoring record with empty path"),
        }
    }

    fn insert_group(&mut self, label: String, depth: usize, parent: Option<Index>) -> Index {
        let idx = self.arena.insert(GroupNode {
            label: label.clone(),
            depth,
            parent,
            children: IndexMap::new(),
            direct_records: Vec::new(),
            subtree_row_count: 0,
        });
        match parent {
            Some(p) => {
                self.arena[p].children.insert(label, idx);
            }
            None => {
                self.roots.insert(label, idx);
            }
        }
        idx
    }

    /// Bottom-up row counting. A broken count invariant is a bug, so it panics.
    fn finalize(&mut self) {
        let order: Vec<Index> = self.iter_postorder().map(|(idx, _)| idx).collect();
        for idx in order {
            let node = &self.arena[idx];
            let below: usize = node
                .children
                .values()
                .map(|&c| self.arena[c].subtree_row_count)
                .sum();
            let count = node.direct_records.len() + below;
            self.arena[idx].subtree_row_count = count;
        }

        for (_, node) in self.arena.iter() {
            let below: usize = node
                .children
                .values()
                .map(|&c| self.arena[c].subtree_row_count)
                .sum();
            assert_eq!(
                node.subtree_row_count,
                node.direct_records.len() + below,
                "row count invariant violated at group {:?}",
                node.label
            );
            assert!(node.subtree_row_count > 0, "empty group {:?}", node.label);
        }
    }

    #[instrument(level = "trace", skip(self))]
    pub fn get(&self, idx: Index) -> Option<&GroupNode> {
        self.arena.get(idx)
    }

    pub fn roots(&self) -> impl Iterator<Item = (Index, &GroupNode)> {
        self.roots.values().map(move |&idx| (idx, &self.arena[idx]))
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn iter(&self) -> GroupIterator<'_> {
        GroupIterator::new(self)
    }

    pub fn iter_postorder(&self) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self)
    }

    /// Records in output row order: a group's direct records come before the
    /// rows of its children.
    pub fn rows(&self) -> impl Iterator<Item = &Record> {
        self.iter().flat_map(|(_, node)| node.direct_records.iter())
    }

    pub fn total_rows(&self) -> usize {
        self.roots().map(|(_, n)| n.subtree_row_count).sum()
    }

    pub fn max_depth(&self) -> usize {
        self.arena.iter().map(|(_, n)| n.depth).max().unwrap_or(0)
    }

    fn subtree(&self, idx: Index) -> Tree<String> {
        let node = &self.arena[idx];
        Tree::new(node.to_string()).with_leaves(node.children.values().map(|&c| self.subtree(c)))
    }
}

impl ToTree for GroupTree {
    fn to_tree(&self) -> Tree<String> {
        let label = format!("rows ({})", self.total_rows());
        Tree::new(label).with_leaves(self.roots.values().map(|&idx| self.subtree(idx)))
    }
}

/// Pre-order traversal across all top-level groups.
pub struct GroupIterator<'a> {
    tree: &'a GroupTree,
    stack: Vec<Index>,
}

impl<'a> GroupIterator<'a> {
    fn new(tree: &'a GroupTree) -> Self {
        let stack = tree.roots.values().rev().copied().collect();
        Self { tree, stack }
    }
}

impl<'a> Iterator for GroupIterator<'a> {
    type Item = (Index, &'a GroupNode);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.stack.pop()?;
        let node = self.tree.arena.get(idx)?;
        // Reverse push for left-to-right traversal
        self.stack.extend(node.children.values().rev().copied());
        Some((idx, node))
    }
}

pub struct PostOrderIterator<'a> {
    tree: &'a GroupTree,
    stack: Vec<(Index, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(tree: &'a GroupTree) -> Self {
        let stack = tree.roots.values().rev().map(|&idx| (idx, false)).collect();
        Self { tree, stack }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (Index, &'a GroupNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((idx, visited)) = self.stack.pop() {
            if let Some(node) = self.tree.arena.get(idx) {
                if visited {
                    return Some((idx, node));
                }
                self.stack.push((idx, true));
                for &child in node.children.values().rev() {
                    self.stack.push((child, false));
                }
            }
        }
        None
    }
}
