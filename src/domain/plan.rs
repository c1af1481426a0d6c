//! The hand-off structure for a tabular renderer.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::instrument;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::group::GroupTree;
use crate::domain::merge::{plan_all, MergeRegion};
use crate::domain::record::{AttributeValue, Record};
use crate::domain::tag::TagId;

/// A single node-column cell. `depth` is 0 for padding cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanCell {
    pub value: String,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanRow {
    /// 1-based sheet row
    pub row: usize,
    pub cells: Vec<PlanCell>,
    pub tags: Vec<TagId>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanMetadata {
    pub source_name: String,
    pub selected_tags: Vec<TagId>,
    pub exported_at: String,
    pub record_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetPlan {
    pub columns: usize,
    pub first_data_row: usize,
    pub rows: Vec<PlanRow>,
    pub regions: Vec<MergeRegion>,
    pub metadata: PlanMetadata,
}

impl SheetPlan {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn regions_in_column(&self, column: usize) -> impl Iterator<Item = &MergeRegion> {
        self.regions.iter().filter(move |r| r.column == column)
    }
}

/// Lays out a grouping tree as rows and merge regions.
#[derive(Debug, Clone, Copy)]
pub struct SheetPlanner {
    node_columns: usize,
    first_data_row: usize,
}

impl SheetPlanner {
    pub fn new(node_columns: usize, first_data_row: usize) -> DomainResult<Self> {
        if first_data_row == 0 {
            return Err(DomainError::InvalidRow {
                row: first_data_row,
            });
        }
        Ok(Self {
            node_columns,
            first_data_row,
        })
    }

    #[instrument(level = "debug", skip(self, tree, metadata))]
    pub fn plan(&self, tree: &GroupTree, mut metadata: PlanMetadata) -> DomainResult<SheetPlan> {
        let columns = self.node_columns.max(tree.max_depth());
        let rows: Vec<PlanRow> = tree
            .rows()
            .enumerate()
            .map(|(i, record)| self.plan_row(self.first_data_row + i, record, columns))
            .collect();
        let regions = plan_all(tree, self.first_data_row)?;
        metadata.record_count = rows.len();

        Ok(SheetPlan {
            columns,
            first_data_row: self.first_data_row,
            rows,
            regions,
            metadata,
        })
    }

    fn plan_row(&self, row: usize, record: &Record, columns: usize) -> PlanRow {
        let mut cells: Vec<PlanCell> = record
            .path
            .iter()
            .enumerate()
            .map(|(i, value)| PlanCell {
                value: value.clone(),
                depth: i + 1,
            })
            .collect();
        cells.resize(
            columns,
            PlanCell {
                value: String::new(),
                depth: 0,
            },
        );

        PlanRow {
            row,
            cells,
            tags: record.tags.iter().cloned().collect(),
            attributes: record.attributes.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn rec(path: &[&str]) -> Record {
        Record::new(path.iter().map(|s| s.to_string()).collect(), BTreeSet::new())
            .expect("non-empty path")
    }

    #[test]
    fn given_short_paths_when_planning_then_cells_are_padded() {
        let tree = GroupTree::build(vec![rec(&["A", "B"]), rec(&["A", "C"])]);

        let plan = SheetPlanner::new(4, 2)
            .expect("valid row")
            .plan(&tree, PlanMetadata::default())
            .expect("plan");

        assert_eq!(plan.columns, 4);
        assert_eq!(plan.rows.len(), 2);
        assert_eq!(plan.rows[0].row, 2);
        assert_eq!(plan.rows[0].cells[1].value, "B");
        assert_eq!(plan.rows[0].cells[1].depth, 2);
        assert_eq!(plan.rows[0].cells[3].depth, 0);
        assert_eq!(plan.metadata.record_count, 2);
        assert_eq!(plan.regions_in_column(1).count(), 1);
    }

    #[test]
    fn given_tree_deeper_than_columns_when_planning_then_widens() {
        let tree = GroupTree::build(vec![rec(&["A", "B", "C"])]);

        let plan = SheetPlanner::new(2, 1)
            .expect("valid row")
            .plan(&tree, PlanMetadata::default())
            .expect("plan");

        assert_eq!(plan.columns, 3);
        assert!(plan.regions.is_empty());
    }

    #[test]
    fn given_row_zero_when_creating_planner_then_errors() {
        assert!(SheetPlanner::new(5, 0).is_err());
    }
}
