//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, DocumentLoader)
//! but are themselves concrete structs, not traits.

mod analyze;
mod cases;
mod export;

pub use analyze::{AnalyzeService, TagAnalysis, TagStat};
pub use cases::{
    CaseList, CaseListService, CaseStep, CaseSuite, SmokeCase, SmokeCriteria, SuiteMetadata,
};
pub use export::{ExportOutcome, ExportRequest, ExportService};
