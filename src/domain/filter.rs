//! Tag-driven pruning of a document forest.
//!
//! A node survives when it carries a selected tag or when at least one of its
//! descendants does. Everything else is removed outright. Roots are anchors:
//! an untagged root is kept while something below it survives. A root that
//! itself carries a selected tag is governed by [`RootTagPolicy`].

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::node::{Forest, Node, Sheet};
use crate::domain::tag::TagId;

/// What to do with a sheet whose root carries a selected tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RootTagPolicy {
    /// Drop the whole sheet.
    #[default]
    DropSheet,
    /// Treat the root like any other tagged node.
    Retain,
}

/// Statistics of one filter pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    pub selected_tags: Vec<TagId>,
    pub sheets_processed: usize,
    pub sheets_removed: usize,
    pub nodes_removed: usize,
}

/// Prunes forests by a non-empty set of selected tags.
#[derive(Debug, Clone)]
pub struct TagFilter {
    selected: BTreeSet<TagId>,
    policy: RootTagPolicy,
}

impl TagFilter {
    pub fn new(
        selected: impl IntoIterator<Item = TagId>,
        policy: RootTagPolicy,
    ) -> DomainResult<Self> {
        let selected: BTreeSet<TagId> = selected.into_iter().collect();
        if selected.is_empty() {
            return Err(DomainError::EmptySelection);
        }
        Ok(Self { selected, policy })
    }

    pub fn selected(&self) -> &BTreeSet<TagId> {
        &self.selected
    }

    pub fn policy(&self) -> RootTagPolicy {
        self.policy
    }

    /// Produce the pruned forest. The input is left untouched.
    #[instrument(level = "debug", skip(self, forest), fields(sheets = forest.sheets.len()))]
    pub fn apply(&self, forest: &Forest) -> (Forest, FilterReport) {
        let mut report = FilterReport {
            selected_tags: self.selected.iter().cloned().collect(),
            ..Default::default()
        };
        let mut sheets = Vec::with_capacity(forest.sheets.len());

        for sheet in &forest.sheets {
            report.sheets_processed += 1;
            match self.filter_sheet(sheet) {
                Some(kept) => sheets.push(kept),
                None => report.sheets_removed += 1,
            }
        }

        let filtered = Forest::new(sheets);
        report.nodes_removed = forest.node_count() - filtered.node_count();
        info!(
            "filter: {} sheets processed, {} removed, {} nodes removed",
            report.sheets_processed, report.sheets_removed, report.nodes_removed
        );
        (filtered, report)
    }

    fn filter_sheet(&self, sheet: &Sheet) -> Option<Sheet> {
        let root = &sheet.root;
        if root.title.trim().is_empty() && root.children.is_empty() {
            debug!("filter: sheet {:?} has an empty root, dropping", sheet.title);
            return None;
        }

        if self.policy == RootTagPolicy::DropSheet && root.has_any_tag(&self.selected) {
            info!(
                "filter: root of sheet {:?} carries a selected tag, dropping sheet",
                sheet.title
            );
            return None;
        }

        self.prune(root).map(|root| Sheet {
            title: sheet.title.clone(),
            root,
        })
    }

    /// Post-order pruning with an explicit stack, so document depth is not
    /// limited by the call stack.
    fn prune(&self, root: &Node) -> Option<Node> {
        struct Frame<'a> {
            node: &'a Node,
            next_child: usize,
            kept: Vec<Node>,
        }

        let mut stack = vec![Frame {
            node: root,
            next_child: 0,
            kept: Vec::new(),
        }];

        loop {
            let pending = match stack.last_mut() {
                None => return None,
                Some(frame) => {
                    let node: &Node = frame.node;
                    let child = node.children.get(frame.next_child);
                    if child.is_some() {
                        frame.next_child += 1;
                    }
                    child
                }
            };

            if let Some(child) = pending {
                stack.push(Frame {
                    node: child,
                    next_child: 0,
                    kept: Vec::new(),
                });
                continue;
            }

            let frame = stack.pop()?;
            let retained = frame.node.has_any_tag(&self.selected) || !frame.kept.is_empty();
            let result = retained.then(|| Node {
                title: frame.node.title.clone(),
                tags: frame.node.tags.clone(),
                children: frame.kept,
            });

            match stack.last_mut() {
                Some(parent) => parent.kept.extend(result),
                None => return result,
            }
        }
    }
}
