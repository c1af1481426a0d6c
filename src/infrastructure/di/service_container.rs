//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::attributes::{AttributeResolver, RuleAttributeResolver};
use crate::application::services::{AnalyzeService, CaseListService, ExportService};
use crate::config::Settings;
use crate::domain::TagVocabulary;
use crate::infrastructure::loader::JsonDocumentLoader;
use crate::infrastructure::traits::{DocumentLoader, FileSystem, RealFileSystem};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Document parsing
    pub loader: Arc<dyn DocumentLoader>,

    /// Business attribute derivation
    pub resolver: Arc<dyn AttributeResolver>,

    pub vocabulary: Arc<TagVocabulary>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    ///
    /// The loader and the analyze service share one vocabulary.
    pub fn new(settings: Settings) -> Self {
        let vocabulary = Arc::new(TagVocabulary::new(settings.tags.clone()));
        let loader = JsonDocumentLoader::new(
            vocabulary.clone(),
            settings.path_separators.clone(),
            settings.unclassified_label.clone(),
        );
        let resolver = RuleAttributeResolver::new(settings.attributes.clone());
        Self::assemble(
            settings,
            Arc::new(RealFileSystem),
            Arc::new(loader),
            Arc::new(resolver),
            vocabulary,
        )
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        loader: Arc<dyn DocumentLoader>,
        resolver: Arc<dyn AttributeResolver>,
    ) -> Self {
        let vocabulary = Arc::new(TagVocabulary::new(settings.tags.clone()));
        Self::assemble(settings, fs, loader, resolver, vocabulary)
    }

    fn assemble(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        loader: Arc<dyn DocumentLoader>,
        resolver: Arc<dyn AttributeResolver>,
        vocabulary: Arc<TagVocabulary>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            fs,
            loader,
            resolver,
            vocabulary,
        }
    }

    pub fn export_service(&self) -> ExportService {
        ExportService::new(
            self.fs.clone(),
            self.loader.clone(),
            self.resolver.clone(),
            self.settings.clone(),
        )
    }

    pub fn analyze_service(&self) -> AnalyzeService {
        AnalyzeService::new(
            self.fs.clone(),
            self.loader.clone(),
            self.vocabulary.clone(),
        )
    }

    pub fn case_list_service(&self) -> CaseListService {
        CaseListService::new(
            self.fs.clone(),
            self.loader.clone(),
            self.settings.clone(),
        )
    }
}
