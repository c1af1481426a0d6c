//! Smoke-test case lists derived from tagged nodes
//!
//! The candidates are the nodes carrying a selected tag that survive
//! [`TagFilter`]. A candidate becomes a case when its level lies in the
//! configured range and its title is long enough and names no setup work.
//! The first node with a given path wins. Child topics of the source
//! document become the case's steps.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};

use crate::application::attributes::highest_priority;
use crate::application::services::export::{read_document, source_name};
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::config::{CaseConfig, Settings};
use crate::domain::{Forest, Node, RootTagPolicy, TagFilter, TagId};
use crate::infrastructure::traits::{DocumentLoader, FileSystem};

const PATH_SEPARATOR: &str = " > ";
const EXECUTION_TIME: &str = "< 2分钟";
const DEFAULT_EXPECTED: &str = "操作成功完成";

const CORE_KEYWORDS: [&str; 8] = ["登录", "注册", "支付", "下单", "搜索", "首页", "重要", "核心"];
const MAIN_FLOW_KEYWORDS: [&str; 6] = ["登录", "支付", "下单", "注册", "重要", "核心"];
const VERIFY_WORDS: [&str; 3] = ["验证", "测试", "检查"];
const FLOW_WORDS: [&str; 3] = ["登录", "注册", "支付"];

/// Expected result by keyword in a step's action; first match wins.
const EXPECTATIONS: [(&[&str], &str); 10] = [
    (&["登录"], "成功登录系统"),
    (&["注册"], "注册成功"),
    (&["支付"], "支付成功"),
    (&["搜索", "查询"], "返回正确的搜索结果"),
    (&["添加", "创建"], "成功创建/添加"),
    (&["删除"], "成功删除"),
    (&["修改", "编辑"], "修改成功"),
    (&["验证", "检查"], "验证通过"),
    (&["准备"], "环境准备完成"),
    (&["执行"], "执行成功"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseStep {
    pub step: usize,
    pub action: String,
    pub expected: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmokeCriteria {
    pub is_core_function: bool,
    pub affects_main_flow: bool,
    pub execution_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmokeCase {
    /// `SMOKE_001`, `SMOKE_002`, ... in document order
    pub case_id: String,
    pub title: String,
    /// Second path component, or the root title for top-level cases
    pub module: String,
    pub test_path: String,
    pub priority: String,
    pub markers: Vec<TagId>,
    pub steps: Vec<CaseStep>,
    pub smoke_criteria: SmokeCriteria,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteMetadata {
    pub source_file: String,
    pub export_time: String,
    pub selected_markers: Vec<TagId>,
    pub total_cases: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSuite {
    pub metadata: SuiteMetadata,
    pub test_cases: Vec<SmokeCase>,
}

/// Top-level document, `{"smoke_test_suite": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseList {
    pub smoke_test_suite: CaseSuite,
}

impl CaseList {
    pub fn cases(&self) -> &[SmokeCase] {
        &self.smoke_test_suite.test_cases
    }

    pub fn is_empty(&self) -> bool {
        self.smoke_test_suite.test_cases.is_empty()
    }
}

/// Service building smoke-test case lists.
pub struct CaseListService {
    fs: Arc<dyn FileSystem>,
    loader: Arc<dyn DocumentLoader>,
    settings: Arc<Settings>,
}

impl CaseListService {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        loader: Arc<dyn DocumentLoader>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            fs,
            loader,
            settings,
        }
    }

    /// Load a document and derive its case list.
    #[instrument(level = "debug", skip(self))]
    pub fn build(
        &self,
        path: &Path,
        tags: &[TagId],
        policy: RootTagPolicy,
    ) -> ApplicationResult<CaseList> {
        let filter = TagFilter::new(tags.iter().cloned(), policy)?;
        let content = read_document(self.fs.as_ref(), path)?;
        let name = source_name(path);
        let forest = self.loader.load(&name, &content)?;
        Ok(self.build_from_forest(&name, &forest, &filter))
    }

    pub fn build_from_forest(
        &self,
        source_name: &str,
        forest: &Forest,
        filter: &TagFilter,
    ) -> CaseList {
        let rules = &self.settings.cases;
        let mut seen: HashSet<String> = HashSet::new();
        let mut cases: Vec<SmokeCase> = Vec::new();
        let mut candidates = 0;

        for sheet in &forest.sheets {
            if filter.policy() == RootTagPolicy::DropSheet && sheet.root.has_any_tag(filter.selected())
            {
                debug!("cases: root of sheet {:?} carries a selected tag, skipping sheet", sheet.title);
                continue;
            }

            for (node, path) in titled_paths(&sheet.root) {
                if !node.has_any_tag(filter.selected()) {
                    continue;
                }
                candidates += 1;
                if !is_smoke_candidate(rules, &node.title, path.len()) {
                    trace!("cases: {:?} at level {} not suitable", node.title, path.len());
                    continue;
                }
                let joined = path.join(PATH_SEPARATOR);
                if !seen.insert(joined.clone()) {
                    debug!("cases: duplicate path {:?}, keeping the first", joined);
                    continue;
                }
                let case_id = format!("SMOKE_{:03}", cases.len() + 1);
                cases.push(smoke_case(rules, case_id, node, &path, joined));
            }
        }

        info!("cases: {} of {} tagged nodes became cases", cases.len(), candidates);
        CaseList {
            smoke_test_suite: CaseSuite {
                metadata: SuiteMetadata {
                    source_file: source_name.to_string(),
                    export_time: Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
                    selected_markers: filter.selected().iter().cloned().collect(),
                    total_cases: cases.len(),
                },
                test_cases: cases,
            },
        }
    }

    pub fn render(list: &CaseList) -> ApplicationResult<String> {
        serde_json::to_string_pretty(list).map_err(|e| ApplicationError::OperationFailed {
            context: "serialize case list".into(),
            source: Box::new(e),
        })
    }

    /// Write a case list as JSON, creating parent directories.
    pub fn write(&self, list: &CaseList, path: &Path) -> ApplicationResult<()> {
        let json = Self::render(list)?;
        self.fs
            .ensure_parent(path)
            .with_path_context("create parent directory", path)?;
        self.fs
            .write(path, &json)
            .with_path_context("write case list", path)?;
        info!("wrote {} cases to {}", list.cases().len(), path.display());
        Ok(())
    }
}

/// Pre-order walk yielding each titled node with its path from the root.
/// An untitled node hides its whole subtree.
fn titled_paths(root: &Node) -> Vec<(&Node, Vec<String>)> {
    let mut found = Vec::new();
    let mut stack: Vec<(&Node, Vec<String>)> = vec![(root, Vec::new())];

    while let Some((node, mut path)) = stack.pop() {
        let title = node.title.trim();
        if title.is_empty() {
            continue;
        }
        path.push(title.to_string());
        for child in node.children.iter().rev() {
            stack.push((child, path.clone()));
        }
        found.push((node, path));
    }
    found
}

fn is_smoke_candidate(rules: &CaseConfig, title: &str, level: usize) -> bool {
    if level < rules.min_level || level > rules.max_level {
        return false;
    }
    let title = title.trim();
    if title.chars().count() < rules.min_title_chars {
        return false;
    }
    let lower = title.to_lowercase();
    !rules
        .exclude_keywords
        .iter()
        .any(|k| !k.is_empty() && lower.contains(&k.to_lowercase()))
}

fn smoke_case(
    rules: &CaseConfig,
    case_id: String,
    node: &Node,
    path: &[String],
    joined: String,
) -> SmokeCase {
    let title = node.title.trim();
    let module = path.get(1).or_else(|| path.first()).cloned().unwrap_or_default();
    let haystack = format!("{title} {joined}");

    SmokeCase {
        case_id,
        title: case_title(title),
        module,
        priority: highest_priority(&node.tags).to_string(),
        markers: node.tags.iter().cloned().collect(),
        steps: steps(rules, node),
        smoke_criteria: SmokeCriteria {
            is_core_function: CORE_KEYWORDS.iter().any(|k| haystack.contains(k)),
            affects_main_flow: MAIN_FLOW_KEYWORDS.iter().any(|k| title.contains(k)),
            execution_time: EXECUTION_TIME.to_string(),
        },
        test_path: joined,
    }
}

/// Titles that do not already say what is verified get a suffix.
fn case_title(title: &str) -> String {
    if VERIFY_WORDS.iter().any(|w| title.contains(w)) {
        title.to_string()
    } else if FLOW_WORDS.iter().any(|w| title.contains(w)) {
        format!("{title}功能验证")
    } else {
        format!("{title}验证")
    }
}

fn expected_result(action: &str) -> &'static str {
    EXPECTATIONS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| action.contains(k)))
        .map(|(_, expected)| *expected)
        .unwrap_or(DEFAULT_EXPECTED)
}

fn step(step: usize, action: impl Into<String>, expected: &str) -> CaseStep {
    CaseStep {
        step,
        action: action.into(),
        expected: expected.to_string(),
    }
}

fn steps(rules: &CaseConfig, node: &Node) -> Vec<CaseStep> {
    let from_children: Vec<CaseStep> = node
        .children
        .iter()
        .map(|c| c.title.trim())
        .filter(|t| !t.is_empty())
        .take(rules.max_steps)
        .enumerate()
        .map(|(i, action)| step(i + 1, action, expected_result(action)))
        .collect();

    if from_children.is_empty() {
        basic_steps(node.title.trim())
    } else {
        from_children
    }
}

/// Generic steps for a case without child topics.
fn basic_steps(title: &str) -> Vec<CaseStep> {
    if title.contains("登录") {
        vec![
            step(1, "打开登录页面", "页面正常显示"),
            step(2, "输入有效用户名密码", "成功登录系统"),
        ]
    } else if title.contains("注册") {
        vec![
            step(1, "打开注册页面", "页面正常显示"),
            step(2, "填写注册信息", "注册成功"),
        ]
    } else if title.contains("支付") {
        vec![
            step(1, "选择商品", "商品添加到购物车"),
            step(2, "进入支付页面", "支付页面正常显示"),
            step(3, "完成支付", "支付成功"),
        ]
    } else {
        vec![step(1, format!("执行{title}"), DEFAULT_EXPECTED)]
    }
}
