//! Flattening a forest into path-labeled records.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::node::{Forest, Node};
use crate::domain::record::Record;

/// Which nodes become records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractMode {
    /// Every content-bearing node (non-empty title).
    #[default]
    EveryNode,
    /// Only nodes without children.
    Leaves,
}

/// Builds records structurally from the tree, in document pre-order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathExtractor {
    mode: ExtractMode,
}

impl PathExtractor {
    pub fn new(mode: ExtractMode) -> Self {
        Self { mode }
    }

    #[instrument(level = "debug", skip(self, forest))]
    pub fn extract(&self, forest: &Forest) -> Vec<Record> {
        let mut records = Vec::new();
        for sheet in &forest.sheets {
            self.extract_tree(&sheet.root, &mut records);
        }
        debug!("extract: {} records ({:?})", records.len(), self.mode);
        records
    }

    fn extract_tree(&self, root: &Node, records: &mut Vec<Record>) {
        // `path` holds the titles of the current node's ancestors; depth tells
        // how much of it belongs to the node being visited.
        let mut path: Vec<String> = Vec::new();
        let mut stack: Vec<(&Node, usize)> = vec![(root, 0)];

        while let Some((node, depth)) = stack.pop() {
            let title = node.title.trim();
            if title.is_empty() {
                debug!("extract: skipping untitled node and its subtree at depth {}", depth + 1);
                continue;
            }

            path.truncate(depth);
            path.push(title.to_string());

            let emit = match self.mode {
                ExtractMode::EveryNode => true,
                ExtractMode::Leaves => node.is_leaf(),
            };
            if emit {
                records.push(Record {
                    path: path.clone(),
                    tags: node.tags.clone(),
                    attributes: Default::default(),
                });
            }

            for child in node.children.iter().rev() {
                stack.push((child, depth + 1));
            }
        }
    }
}

/// Degraded path reconstruction from a pre-joined path string.
///
/// Splits on the first separator that occurs in `joined`. This is lossy: a
/// title that contains the separator is split in two. Only use it for sources
/// that carry no tree structure.
///
/// Components never come back empty or as a bare separator; a string with no
/// content left yields `[unclassified]`.
pub fn reconstruct_path_degraded(
    joined: &str,
    separators: &[String],
    unclassified: &str,
) -> Vec<String> {
    let separators: Vec<&str> = separators
        .iter()
        .map(String::as_str)
        .filter(|sep| !sep.trim().is_empty())
        .collect();

    let pieces: Vec<&str> = match separators.iter().find(|sep| joined.contains(**sep)) {
        Some(sep) => joined.split(*sep).collect(),
        None => vec![joined],
    };
    let parts: Vec<String> = pieces
        .into_iter()
        .map(|piece| strip_separators(piece, &separators))
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect();

    if parts.is_empty() {
        vec![unclassified.to_string()]
    } else {
        parts
    }
}

/// Trim whitespace and dangling separator marks (`>` of `" > "`) from both ends.
fn strip_separators<'a>(piece: &'a str, separators: &[&str]) -> &'a str {
    let mut part = piece.trim();
    loop {
        let before = part.len();
        for mark in separators.iter().map(|sep| sep.trim()) {
            part = part
                .trim_start_matches(mark)
                .trim_end_matches(mark)
                .trim();
        }
        if part.len() == before {
            return part;
        }
    }
}
