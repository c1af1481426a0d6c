//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/mindtab/mindtab.toml`
//! 3. Local config: `./.mindtab.toml` or the file given with `--config`
//! 4. Environment variables: `MINDTAB_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::{default_tag_definitions, ExtractMode, RootTagPolicy, TagDefinition};

pub const LOCAL_CONFIG_FILE: &str = ".mindtab.toml";

/// Maps path/title keywords to a value. First matching rule wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordRule {
    pub keywords: Vec<String>,
    pub value: String,
}

impl KeywordRule {
    pub fn new(value: &str, keywords: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            value: value.to_string(),
        }
    }
}

/// Tables driving the business attribute columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AttributeConfig {
    /// Platform by keyword in path or title (case-insensitive)
    pub platform: Vec<KeywordRule>,
    pub default_platform: String,
    /// Owner by keyword in path
    pub owners: Vec<KeywordRule>,
    pub default_owner: String,
    /// Path keywords that mark a core function
    pub core_paths: Vec<String>,
    /// Path keywords that mark the main flow
    pub main_flow_keywords: Vec<String>,
}

impl Default for AttributeConfig {
    fn default() -> Self {
        Self {
            platform: vec![
                KeywordRule::new("API", &["api", "接口", "服务", "数据库"]),
                KeywordRule::new("Web", &["web", "网页", "浏览器"]),
                KeywordRule::new("APP", &["app", "移动", "手机"]),
            ],
            default_platform: "Web/APP".into(),
            owners: vec![],
            default_owner: "待分配".into(),
            core_paths: vec![],
            main_flow_keywords: vec!["展示".into(), "查看".into(), "显示".into()],
        }
    }
}

/// Raw attribute config: every field optional so a layer only overrides
/// what it names.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawAttributeConfig {
    pub platform: Option<Vec<KeywordRule>>,
    pub default_platform: Option<String>,
    pub owners: Option<Vec<KeywordRule>>,
    pub default_owner: Option<String>,
    pub core_paths: Option<Vec<String>>,
    pub main_flow_keywords: Option<Vec<String>>,
}

impl AttributeConfig {
    /// Overlay wins field by field; lists are replaced, not merged.
    pub fn merge(&self, overlay: &RawAttributeConfig) -> Self {
        Self {
            platform: overlay
                .platform
                .clone()
                .unwrap_or_else(|| self.platform.clone()),
            default_platform: overlay
                .default_platform
                .clone()
                .unwrap_or_else(|| self.default_platform.clone()),
            owners: overlay.owners.clone().unwrap_or_else(|| self.owners.clone()),
            default_owner: overlay
                .default_owner
                .clone()
                .unwrap_or_else(|| self.default_owner.clone()),
            core_paths: overlay
                .core_paths
                .clone()
                .unwrap_or_else(|| self.core_paths.clone()),
            main_flow_keywords: overlay
                .main_flow_keywords
                .clone()
                .unwrap_or_else(|| self.main_flow_keywords.clone()),
        }
    }
}

/// Selection rules for smoke-test case lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CaseConfig {
    /// Shallowest node level that may become a case (root = 1)
    pub min_level: usize,
    /// Deepest node level that may become a case
    pub max_level: usize,
    /// Titles shorter than this (in characters) are skipped
    pub min_title_chars: usize,
    /// Child topics beyond this count are not turned into steps
    pub max_steps: usize,
    /// Titles containing one of these are setup work, not smoke cases
    pub exclude_keywords: Vec<String>,
}

impl Default for CaseConfig {
    fn default() -> Self {
        Self {
            min_level: 2,
            max_level: 6,
            min_title_chars: 3,
            max_steps: 10,
            exclude_keywords: ["配置", "环境", "数据准备", "初始化", "设置", "安装", "部署"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawCaseConfig {
    pub min_level: Option<usize>,
    pub max_level: Option<usize>,
    pub min_title_chars: Option<usize>,
    pub max_steps: Option<usize>,
    pub exclude_keywords: Option<Vec<String>>,
}

impl CaseConfig {
    pub fn merge(&self, overlay: &RawCaseConfig) -> Self {
        Self {
            min_level: overlay.min_level.unwrap_or(self.min_level),
            max_level: overlay.max_level.unwrap_or(self.max_level),
            min_title_chars: overlay.min_title_chars.unwrap_or(self.min_title_chars),
            max_steps: overlay.max_steps.unwrap_or(self.max_steps),
            exclude_keywords: overlay
                .exclude_keywords
                .clone()
                .unwrap_or_else(|| self.exclude_keywords.clone()),
        }
    }
}

/// Raw settings for intermediate parsing.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub root_tag_policy: Option<RootTagPolicy>,
    pub extract_mode: Option<ExtractMode>,
    pub node_columns: Option<usize>,
    pub first_data_row: Option<usize>,
    pub path_separators: Option<Vec<String>>,
    pub unclassified_label: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub tags: Option<Vec<TagDefinition>>,
    pub attributes: RawAttributeConfig,
    pub cases: RawCaseConfig,
}

/// Unified configuration for mindtab.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// What happens to a sheet whose root carries a selected tag
    pub root_tag_policy: RootTagPolicy,
    pub extract_mode: ExtractMode,
    /// Minimum number of node columns in the sheet plan
    pub node_columns: usize,
    /// First data row; row 1 holds the header
    pub first_data_row: usize,
    /// Separators for splitting pre-joined case paths, tried in order
    pub path_separators: Vec<String>,
    /// Path used for cases without one
    pub unclassified_label: String,
    /// Directory for export files written without an explicit path
    pub output_dir: Option<PathBuf>,
    /// Tag vocabulary
    pub tags: Vec<TagDefinition>,
    pub attributes: AttributeConfig,
    pub cases: CaseConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            root_tag_policy: RootTagPolicy::default(),
            extract_mode: ExtractMode::default(),
            node_columns: 5,
            first_data_row: 2,
            path_separators: vec![" > ".into(), " / ".into()],
            unclassified_label: "未分类".into(),
            output_dir: None,
            tags: default_tag_definitions(),
            attributes: AttributeConfig::default(),
            cases: CaseConfig::default(),
        }
    }
}

/// Get the XDG config directory for mindtab.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "mindtab").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("mindtab.toml"))
}

/// Get the path to the local config file in a directory.
pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(LOCAL_CONFIG_FILE)
}

/// Expand `~`, `$VAR` and `${VAR}`; unknown variables leave the input as is.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

/// Union of tag definitions by id. Overlay definitions replace base ones
/// with the same id; new ids are appended.
pub fn merge_tags(base: &[TagDefinition], overlay: &[TagDefinition]) -> Vec<TagDefinition> {
    let mut result = base.to_vec();
    for def in overlay {
        match result.iter_mut().find(|d| d.id == def.id) {
            Some(existing) => *existing = def.clone(),
            None => result.push(def.clone()),
        }
    }
    result
}

impl Settings {
    fn expand_paths(&mut self) {
        if let Some(dir) = &self.output_dir {
            self.output_dir = Some(PathBuf::from(expand_env_vars(
                dir.to_string_lossy().as_ref(),
            )));
        }
    }

    /// Scalars and lists: overlay wins if set. Tags: union by id.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        let mut merged = self.apply_scalars(overlay);
        if let Some(tags) = &overlay.tags {
            merged.tags = merge_tags(&self.tags, tags);
        }
        merged
    }

    /// Like `merge_with`, but a tag list REPLACES the compiled defaults.
    fn apply_global(&self, global: &RawSettings) -> Self {
        let mut merged = self.apply_scalars(global);
        if let Some(tags) = &global.tags {
            merged.tags = tags.clone();
        }
        merged
    }

    fn apply_scalars(&self, raw: &RawSettings) -> Self {
        Self {
            root_tag_policy: raw.root_tag_policy.unwrap_or(self.root_tag_policy),
            extract_mode: raw.extract_mode.unwrap_or(self.extract_mode),
            node_columns: raw.node_columns.unwrap_or(self.node_columns),
            first_data_row: raw.first_data_row.unwrap_or(self.first_data_row),
            path_separators: raw
                .path_separators
                .clone()
                .unwrap_or_else(|| self.path_separators.clone()),
            unclassified_label: raw
                .unclassified_label
                .clone()
                .unwrap_or_else(|| self.unclassified_label.clone()),
            output_dir: raw.output_dir.clone().or_else(|| self.output_dir.clone()),
            tags: self.tags.clone(),
            attributes: self.attributes.merge(&raw.attributes),
            cases: self.cases.merge(&raw.cases),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// `local` is an explicit config file; without one `./.mindtab.toml` is
    /// used if present.
    pub fn load(local: Option<&Path>) -> Result<Self, ApplicationError> {
        let global = global_config_path().filter(|p| p.exists());
        let local = match local {
            Some(path) => Some(path.to_path_buf()),
            None => {
                let cwd = std::env::current_dir().map_err(|e| ApplicationError::Config {
                    message: format!("current directory: {e}"),
                })?;
                Some(local_config_path(&cwd)).filter(|p| p.exists())
            }
        };
        Self::load_from(global.as_deref(), local.as_deref())
    }

    /// Load from explicit file locations.
    ///
    /// # Array Merge Semantics
    /// - Defaults → Global: tag list REPLACES the compiled vocabulary
    /// - Global → Local: tag list UNIONS by id
    /// - Any → Env vars: REPLACE
    pub fn load_from(global: Option<&Path>, local: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(path) = global {
            let raw = load_raw_settings(path)?;
            current = current.apply_global(&raw);
        }

        if let Some(path) = local {
            if !path.exists() {
                return Err(ApplicationError::Config {
                    message: format!("config file not found: {}", path.display()),
                });
            }
            let raw = load_raw_settings(path)?;
            current = current.merge_with(&raw);
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();
        current.validate()?;

        Ok(current)
    }

    /// Apply MINDTAB_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("MINDTAB")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("path_separators"),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("root_tag_policy") {
            settings.root_tag_policy = parse_enum("root_tag_policy", &val)?;
        }
        if let Ok(val) = config.get_string("extract_mode") {
            settings.extract_mode = parse_enum("extract_mode", &val)?;
        }
        if let Ok(val) = config.get::<usize>("node_columns") {
            settings.node_columns = val;
        }
        if let Ok(val) = config.get::<usize>("first_data_row") {
            settings.first_data_row = val;
        }
        if let Ok(val) = config.get::<Vec<String>>("path_separators") {
            settings.path_separators = val;
        }
        if let Ok(val) = config.get_string("unclassified_label") {
            settings.unclassified_label = val;
        }
        if let Ok(val) = config.get_string("output_dir") {
            settings.output_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = config.get_string("attributes.default_owner") {
            settings.attributes.default_owner = val;
        }
        if let Ok(val) = config.get_string("attributes.default_platform") {
            settings.attributes.default_platform = val;
        }
        if let Ok(val) = config.get::<usize>("cases.max_steps") {
            settings.cases.max_steps = val;
        }

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if self.first_data_row == 0 {
            return Err(ApplicationError::Config {
                message: "first_data_row must be at least 1".into(),
            });
        }
        if self.path_separators.iter().any(|s| s.is_empty()) {
            return Err(ApplicationError::Config {
                message: "path_separators must not contain empty strings".into(),
            });
        }
        if self.cases.min_level == 0 || self.cases.min_level > self.cases.max_level {
            return Err(ApplicationError::Config {
                message: format!(
                    "cases: level range {}..={} is empty",
                    self.cases.min_level, self.cases.max_level
                ),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# mindtab configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/mindtab/mindtab.toml  (defines your baseline)
#   Local:  ./.mindtab.toml or --config     (project-specific additions)
#   Env:    MINDTAB_* environment variables (explicit overrides)
#
# Tag Merge Semantics:
#   Global [[tags]] REPLACE the built-in vocabulary.
#   Local [[tags]] are merged by id (same id replaces, new ids are added).

# "drop-sheet" drops a sheet whose root carries a selected tag, "retain" keeps it
# root_tag_policy = "drop-sheet"

# "every-node" exports one row per titled node, "leaves" only childless nodes
# extract_mode = "every-node"

# node_columns = 5
# first_data_row = 2
# path_separators = [" > ", " / "]
# unclassified_label = "未分类"
# output_dir = "~/exports"

# [[tags]]
# id = "priority-1"
# label = "优先级1"
# aliases = ["p1", "priority1"]

[attributes]
# default_platform = "Web/APP"
# default_owner = "待分配"
# core_paths = ["高光时刻", "学习报告"]
# main_flow_keywords = ["展示", "查看", "显示"]

# [[attributes.owners]]
# value = "张三"
# keywords = ["高光时刻"]

# [[attributes.platform]]
# value = "API"
# keywords = ["api", "接口"]

# Smoke-test case lists (`mindtab cases`)
[cases]
# min_level = 2
# max_level = 6
# min_title_chars = 3
# max_steps = 10
# exclude_keywords = ["配置", "环境", "数据准备", "初始化", "设置", "安装", "部署"]
"#
        .to_string()
    }
}

fn parse_enum<T: for<'de> Deserialize<'de>>(key: &str, value: &str) -> Result<T, ApplicationError> {
    T::deserialize(serde::de::value::StrDeserializer::<serde::de::value::Error>::new(value))
        .map_err(|e| ApplicationError::Config {
            message: format!("{key}: {e}"),
        })
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_no_config_when_loading_then_uses_defaults() {
        let settings = Settings::load_from(None, None).expect("load defaults");
        assert_eq!(settings.node_columns, 5);
        assert_eq!(settings.first_data_row, 2);
        assert_eq!(settings.unclassified_label, "未分类");
        assert_eq!(settings.tags.len(), default_tag_definitions().len());
    }

    #[test]
    fn given_tilde_in_output_dir_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            output_dir: Some(PathBuf::from("~/exports")),
            ..Default::default()
        };

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        let dir = settings.output_dir.expect("output dir");
        assert!(dir.to_string_lossy().starts_with(&home));
    }

    #[test]
    fn given_overlay_tag_with_existing_id_when_merging_then_replaces_definition() {
        let base = vec![TagDefinition::new("a", "A", &[]), TagDefinition::new("b", "B", &[])];
        let overlay = vec![TagDefinition::new("b", "Bee", &["bb"]), TagDefinition::new("c", "C", &[])];

        let merged = merge_tags(&base, &overlay);

        let ids: Vec<&str> = merged.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(merged[1].label, "Bee");
    }

    #[test]
    fn given_enum_value_when_parsing_then_uses_kebab_case() {
        let policy: RootTagPolicy = parse_enum("root_tag_policy", "retain").expect("valid");
        assert_eq!(policy, RootTagPolicy::Retain);
        assert!(parse_enum::<ExtractMode>("extract_mode", "bogus").is_err());
    }

    #[test]
    fn given_default_settings_when_serializing_then_toml_round_trips() {
        let settings = Settings::default();
        let toml = settings.to_toml().expect("serialize");
        let parsed: Settings = toml::from_str(&toml).expect("parse");
        assert_eq!(parsed, settings);
    }

    #[test]
    fn given_template_when_parsing_then_is_valid_toml() {
        let raw: RawSettings = toml::from_str(&Settings::template()).expect("valid template");
        assert!(raw.tags.is_none());
    }
}
