//! Tag usage analysis of a document

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use serde::Serialize;
use tracing::debug;

use crate::application::services::export::source_name;
use crate::application::{ApplicationResult, IoResultExt};
use crate::domain::{Forest, TagId, TagVocabulary};
use crate::infrastructure::traits::{DocumentLoader, FileSystem};

const MAX_SAMPLES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagStat {
    pub tag: TagId,
    pub label: Option<String>,
    pub count: usize,
    /// Up to three titles of tagged nodes, in document order
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagAnalysis {
    pub source_name: String,
    pub sheets: usize,
    pub total_nodes: usize,
    /// Most used first
    pub tags: Vec<TagStat>,
}

pub struct AnalyzeService {
    fs: Arc<dyn FileSystem>,
    loader: Arc<dyn DocumentLoader>,
    vocabulary: Arc<TagVocabulary>,
}

impl AnalyzeService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        loader: Arc<dyn DocumentLoader>,
        vocabulary: Arc<TagVocabulary>,
    ) -> Self {
        Self {
            fs,
            loader,
            vocabulary,
        }
    }

    pub fn analyze(&self, path: &Path) -> ApplicationResult<TagAnalysis> {
        debug!("analyze: path={}", path.display());
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read document", path)?;
        let name = source_name(path);
        let forest = self.loader.load(&name, &content)?;
        Ok(self.analyze_forest(&name, &forest))
    }

    pub fn analyze_forest(&self, source_name: &str, forest: &Forest) -> TagAnalysis {
        let mut stats: BTreeMap<&TagId, (usize, Vec<String>)> = BTreeMap::new();
        let mut total_nodes = 0;

        for (node, _) in forest.iter_nodes() {
            total_nodes += 1;
            for tag in &node.tags {
                let (count, samples) = stats.entry(tag).or_default();
                *count += 1;
                if samples.len() < MAX_SAMPLES && !node.title.is_empty() {
                    samples.push(node.title.clone());
                }
            }
        }

        let tags = stats
            .into_iter()
            .map(|(tag, (count, samples))| TagStat {
                tag: tag.clone(),
                label: self.vocabulary.label(tag).map(str::to_string),
                count,
                samples,
            })
            .sorted_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)))
            .collect();

        TagAnalysis {
            source_name: source_name.to_string(),
            sheets: forest.sheets.len(),
            total_nodes,
            tags,
        }
    }
}
