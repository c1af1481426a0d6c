//! Export pipeline service
//!
//! load → filter → extract → resolve attributes → group → plan

use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, info, instrument};

use crate::application::attributes::AttributeResolver;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::{
    ExtractMode, FilterReport, Forest, GroupTree, PathExtractor, PlanMetadata, Record,
    RootTagPolicy, SheetPlan, SheetPlanner, TagFilter, TagId,
};
use crate::infrastructure::traits::{DocumentLoader, FileSystem};

/// What to export and how.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub tags: Vec<TagId>,
    pub policy: RootTagPolicy,
    pub mode: ExtractMode,
}

impl ExportRequest {
    /// Request with policy and mode taken from settings.
    pub fn new(tags: Vec<TagId>, settings: &Settings) -> Self {
        Self {
            tags,
            policy: settings.root_tag_policy,
            mode: settings.extract_mode,
        }
    }
}

/// Result of one export run.
#[derive(Debug)]
pub struct ExportOutcome {
    pub plan: SheetPlan,
    pub groups: GroupTree,
    /// Filter statistics; absent for flat case lists
    pub report: Option<FilterReport>,
}

impl ExportOutcome {
    pub fn is_empty(&self) -> bool {
        self.plan.is_empty()
    }
}

/// Service running the export pipeline.
pub struct ExportService {
    fs: Arc<dyn FileSystem>,
    loader: Arc<dyn DocumentLoader>,
    resolver: Arc<dyn AttributeResolver>,
    settings: Arc<Settings>,
}

pub(crate) fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Read an input file; a missing file is reported as `NotFound`.
pub(crate) fn read_document(fs: &dyn FileSystem, path: &Path) -> ApplicationResult<String> {
    if !fs.is_file(path) {
        return Err(ApplicationError::OperationFailed {
            context: format!("document not found: {}", path.display()),
            source: Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "file does not exist",
            )),
        });
    }
    fs.read_to_string(path)
        .with_path_context("read document", path)
}

impl ExportService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        loader: Arc<dyn DocumentLoader>,
        resolver: Arc<dyn AttributeResolver>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            fs,
            loader,
            resolver,
            settings,
        }
    }

    fn read(&self, path: &Path) -> ApplicationResult<String> {
        read_document(self.fs.as_ref(), path)
    }

    /// Load a mind-map document.
    pub fn load(&self, path: &Path) -> ApplicationResult<Forest> {
        debug!("load: path={}", path.display());
        let content = self.read(path)?;
        self.loader.load(&source_name(path), &content)
    }

    /// Load and prune a document.
    pub fn filter(
        &self,
        path: &Path,
        tags: &[TagId],
        policy: RootTagPolicy,
    ) -> ApplicationResult<(Forest, FilterReport)> {
        let filter = TagFilter::new(tags.iter().cloned(), policy)?;
        let forest = self.load(path)?;
        Ok(filter.apply(&forest))
    }

    /// Full pipeline for a mind-map document.
    #[instrument(level = "debug", skip(self, request))]
    pub fn export_document(
        &self,
        path: &Path,
        request: &ExportRequest,
    ) -> ApplicationResult<ExportOutcome> {
        let filter = TagFilter::new(request.tags.iter().cloned(), request.policy)?;
        let forest = self.load(path)?;
        self.export_forest(&source_name(path), &forest, &filter, request.mode)
    }

    /// Pipeline over an already loaded forest.
    pub fn export_forest(
        &self,
        source_name: &str,
        forest: &Forest,
        filter: &TagFilter,
        mode: ExtractMode,
    ) -> ApplicationResult<ExportOutcome> {
        let (pruned, report) = filter.apply(forest);
        let records = PathExtractor::new(mode).extract(&pruned);
        let selected: Vec<TagId> = filter.selected().iter().cloned().collect();

        let (plan, groups) = self.plan(source_name, records, selected)?;
        Ok(ExportOutcome {
            plan,
            groups,
            report: Some(report),
        })
    }

    /// Pipeline for a flat case list. Cases carrying none of the selected
    /// tags are skipped.
    #[instrument(level = "debug", skip(self, request))]
    pub fn export_cases(
        &self,
        path: &Path,
        request: &ExportRequest,
    ) -> ApplicationResult<ExportOutcome> {
        let filter = TagFilter::new(request.tags.iter().cloned(), request.policy)?;
        let content = self.read(path)?;
        let name = source_name(path);

        let mut records = self.loader.load_cases(&name, &content)?;
        let total = records.len();
        records.retain(|r| r.tags.iter().any(|t| filter.selected().contains(t)));
        info!("cases: {} of {} match the selected tags", records.len(), total);

        let selected: Vec<TagId> = filter.selected().iter().cloned().collect();
        let (plan, groups) = self.plan(&name, records, selected)?;
        Ok(ExportOutcome {
            plan,
            groups,
            report: None,
        })
    }

    fn plan(
        &self,
        source_name: &str,
        mut records: Vec<Record>,
        selected_tags: Vec<TagId>,
    ) -> ApplicationResult<(SheetPlan, GroupTree)> {
        self.resolver.resolve_all(&mut records);
        let groups = GroupTree::build(records);

        let planner = SheetPlanner::new(self.settings.node_columns, self.settings.first_data_row)?;
        let metadata = PlanMetadata {
            source_name: source_name.to_string(),
            selected_tags,
            exported_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            record_count: 0,
        };
        let plan = planner.plan(&groups, metadata)?;
        debug!(
            "plan: {} rows, {} regions, {} columns",
            plan.rows.len(),
            plan.regions.len(),
            plan.columns
        );
        Ok((plan, groups))
    }

    /// Serialize a plan as pretty JSON.
    pub fn render_plan(plan: &SheetPlan) -> ApplicationResult<String> {
        serde_json::to_string_pretty(plan).map_err(|e| ApplicationError::OperationFailed {
            context: "serialize sheet plan".into(),
            source: Box::new(e),
        })
    }

    /// Write a plan as JSON, creating parent directories.
    pub fn write_plan(&self, plan: &SheetPlan, path: &Path) -> ApplicationResult<()> {
        let json = Self::render_plan(plan)?;
        self.fs
            .ensure_parent(path)
            .with_path_context("create parent directory", path)?;
        self.fs
            .write(path, &json)
            .with_path_context("write sheet plan", path)?;
        info!("wrote sheet plan to {}", path.display());
        Ok(())
    }
}
