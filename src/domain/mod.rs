//! Domain layer: tree model, pruning, grouping and merge planning
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod error;
pub mod extract;
pub mod filter;
pub mod group;
pub mod merge;
pub mod node;
pub mod plan;
pub mod record;
pub mod tag;

pub use error::{DomainError, DomainResult};
pub use extract::{reconstruct_path_degraded, ExtractMode, PathExtractor};
pub use filter::{FilterReport, RootTagPolicy, TagFilter};
pub use group::{GroupNode, GroupTree};
pub use merge::{plan_all, plan_column, MergeRegion};
pub use node::{Forest, Node, Sheet, ToTree};
pub use plan::{PlanCell, PlanMetadata, PlanRow, SheetPlan, SheetPlanner};
pub use record::{AttributeValue, Record};
pub use tag::{default_tag_definitions, TagDefinition, TagId, TagVocabulary};
