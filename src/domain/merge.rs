//! Merge-region planning: contiguous multi-row spans per column.

use serde::Serialize;
use tracing::{instrument, trace};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::group::GroupTree;

/// A vertical span of cells in one column that the renderer merges.
/// Rows are inclusive and `end_row > start_row`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeRegion {
    pub column: usize,
    pub start_row: usize,
    pub end_row: usize,
    pub label: String,
}

impl MergeRegion {
    pub fn rows(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    pub fn contains_row(&self, row: usize) -> bool {
        (self.start_row..=self.end_row).contains(&row)
    }
}

/// Regions for the groups at depth `column` that span more than one row.
///
/// Walks the tree in pre-order with a row cursor. Groups shallower than the
/// target column advance the cursor over their direct records (which occupy
/// the rows before their children) and are then descended into. Groups at the
/// target depth consume their whole subtree count at once.
#[instrument(level = "debug", skip(tree))]
pub fn plan_column(
    tree: &GroupTree,
    column: usize,
    first_row: usize,
) -> DomainResult<Vec<MergeRegion>> {
    if column == 0 {
        return Err(DomainError::InvalidColumn { column });
    }
    if first_row == 0 {
        return Err(DomainError::InvalidRow { row: first_row });
    }

    let mut regions = Vec::new();
    let mut cursor = first_row;
    let mut stack: Vec<_> = tree.roots().map(|(idx, _)| idx).collect();
    stack.reverse();

    while let Some(idx) = stack.pop() {
        let Some(node) = tree.get(idx) else { continue };

        if node.depth == column {
            let count = node.subtree_row_count;
            if count > 1 {
                regions.push(MergeRegion {
                    column,
                    start_row: cursor,
                    end_row: cursor + count - 1,
                    label: node.label.clone(),
                });
            }
            cursor += count;
        } else {
            cursor += node.direct_records.len();
            stack.extend(node.children.values().rev().copied());
        }
    }

    trace!("column {}: {} regions", column, regions.len());
    Ok(regions)
}

/// Regions for every column `1..=max_depth`, ordered by column then start row.
pub fn plan_all(tree: &GroupTree, first_row: usize) -> DomainResult<Vec<MergeRegion>> {
    let mut regions = Vec::new();
    for column in 1..=tree.max_depth() {
        regions.extend(plan_column(tree, column, first_row)?);
    }
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Record;
    use std::collections::BTreeSet;

    fn tree(paths: &[&[&str]]) -> GroupTree {
        GroupTree::build(
            paths
                .iter()
                .map(|p| {
                    Record::new(p.iter().map(|s| s.to_string()).collect(), BTreeSet::new())
                        .expect("non-empty path")
                })
                .collect(),
        )
    }

    #[test]
    fn given_column_zero_when_planning_then_errors() {
        let t = tree(&[&["A"]]);
        assert_eq!(
            plan_column(&t, 0, 1),
            Err(DomainError::InvalidColumn { column: 0 })
        );
        assert_eq!(plan_column(&t, 1, 0), Err(DomainError::InvalidRow { row: 0 }));
    }

    #[test]
    fn given_group_with_direct_record_and_children_when_planning_then_single_span() {
        let t = tree(&[&["A"], &["A", "B"], &["A", "C"]]);

        let regions = plan_column(&t, 1, 1).expect("valid column");

        assert_eq!(
            regions,
            vec![MergeRegion {
                column: 1,
                start_row: 1,
                end_row: 3,
                label: "A".to_string()
            }]
        );
    }

    #[test]
    fn given_shallow_direct_records_when_planning_deeper_column_then_cursor_skips_them() {
        let t = tree(&[&["A"], &["A", "B", "x"], &["A", "B", "y"]]);

        let regions = plan_column(&t, 2, 1).expect("valid column");

        assert_eq!(regions.len(), 1);
        assert_eq!((regions[0].start_row, regions[0].end_row), (2, 3));
    }

    #[test]
    fn given_region_when_checking_rows_then_bounds_are_inclusive() {
        let r = MergeRegion {
            column: 1,
            start_row: 2,
            end_row: 4,
            label: "x".into(),
        };
        assert_eq!(r.rows(), 3);
        assert!(r.contains_row(4));
        assert!(!r.contains_row(5));
    }
}
