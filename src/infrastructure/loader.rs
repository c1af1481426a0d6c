//! JSON document loader for extracted mind-map content.
//!
//! Two dialects are understood:
//! - the editor's own `content.json`: sheets with `rootTopic`, children under
//!   `children.attached`, markers as `[{"markerId": ..}]`
//! - parser-style dicts: sheets with `topic`, children under `topics`, markers
//!   under `markers`, `marker`, the misspelled `makers`, or one of the
//!   exporter variants `icons`, `labels`, `flags`, `priorities`
//!
//! A flat case list with pre-joined paths is read by [`JsonDocumentLoader::load_cases`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{reconstruct_path_degraded, Forest, Node, Record, Sheet, TagId, TagVocabulary};
use crate::infrastructure::traits::DocumentLoader;

const MARKER_KEYS: [&str; 7] = [
    "markers",
    "marker",
    "makers",
    "icons",
    "labels",
    "flags",
    "priorities",
];
const MARKER_OBJECT_KEYS: [&str; 6] = ["markerId", "id", "type", "name", "symbol", "key"];

#[derive(Debug, Clone)]
pub struct JsonDocumentLoader {
    vocabulary: Arc<TagVocabulary>,
    path_separators: Vec<String>,
    unclassified_label: String,
}

impl Default for JsonDocumentLoader {
    fn default() -> Self {
        Self::new(
            Arc::default(),
            vec![" > ".into(), " / ".into()],
            "未分类".into(),
        )
    }
}

impl JsonDocumentLoader {
    pub fn new(
        vocabulary: Arc<TagVocabulary>,
        path_separators: Vec<String>,
        unclassified_label: String,
    ) -> Self {
        Self {
            vocabulary,
            path_separators,
            unclassified_label,
        }
    }

    pub fn vocabulary(&self) -> &Arc<TagVocabulary> {
        &self.vocabulary
    }

    fn parse(source_name: &str, content: &str) -> ApplicationResult<Value> {
        serde_json::from_str(content)
            .map_err(|e| ApplicationError::document(source_name, format!("invalid JSON: {e}")))
    }

    /// Normalize every marker reference of a topic. Unknown references are dropped.
    fn tags_of(&self, topic: &Map<String, Value>) -> BTreeSet<TagId> {
        let mut tags = BTreeSet::new();
        for key in MARKER_KEYS {
            let Some(value) = topic.get(key) else { continue };
            let refs: Vec<&Value> = match value {
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            for reference in refs {
                let Some(raw) = marker_text(reference) else {
                    debug!("skipping marker reference without text: {}", reference);
                    continue;
                };
                match self.vocabulary.resolve(&raw) {
                    Some(tag) => {
                        tags.insert(tag);
                    }
                    None => warn!("dropping unrecognized marker {:?}", raw),
                }
            }
        }
        tags
    }

    /// Build a node tree from a topic object, using an explicit stack.
    fn topic_to_node(&self, root: &Map<String, Value>, children_of: ChildrenOf) -> Node {
        struct Frame<'a> {
            topic: &'a Map<String, Value>,
            children: Vec<&'a Map<String, Value>>,
            next_child: usize,
            built: Vec<Node>,
        }

        fn frame(topic: &Map<String, Value>, children_of: ChildrenOf) -> Frame<'_> {
            Frame {
                topic,
                children: children_of.children(topic),
                next_child: 0,
                built: Vec::new(),
            }
        }

        let mut stack = vec![frame(root, children_of)];
        let mut result = None;

        while let Some(top) = stack.last_mut() {
            if let Some(&child) = top.children.get(top.next_child) {
                top.next_child += 1;
                stack.push(frame(child, children_of));
                continue;
            }

            let Some(done) = stack.pop() else { break };
            let node = Node {
                title: topic_title(done.topic),
                tags: self.tags_of(done.topic),
                children: done.built,
            };
            match stack.last_mut() {
                Some(parent) => parent.built.push(node),
                None => result = Some(node),
            }
        }

        result.unwrap_or_else(|| Node::new(topic_title(root)))
    }

    fn sheet_from(&self, index: usize, sheet: &Value) -> Option<Sheet> {
        let Some(obj) = sheet.as_object() else {
            warn!("sheet {} is not an object, skipping", index);
            return None;
        };
        let title = obj
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("Sheet {}", index + 1));

        let (topic, dialect) = if let Some(t) = obj.get("rootTopic") {
            (t, ChildrenOf::Attached)
        } else if let Some(t) = obj.get("topic") {
            (t, ChildrenOf::Topics)
        } else {
            warn!("sheet {:?} has no root topic, skipping", title);
            return None;
        };

        let Some(topic) = topic.as_object() else {
            warn!("root topic of sheet {:?} is not an object, skipping", title);
            return None;
        };
        Some(Sheet::new(title, self.topic_to_node(topic, dialect)))
    }

    fn record_from_case(&self, case: &Map<String, Value>) -> ApplicationResult<Record> {
        let joined = ["test_path", "测试路径", "title"]
            .iter()
            .filter_map(|k| case.get(*k).and_then(Value::as_str))
            .find(|s| !s.trim().is_empty())
            .unwrap_or_default();
        let path = reconstruct_path_degraded(joined, &self.path_separators, &self.unclassified_label);
        Ok(Record::new(path, self.tags_of(case))?)
    }
}

/// Where a dialect keeps a topic's children.
#[derive(Debug, Clone, Copy)]
enum ChildrenOf {
    Attached,
    Topics,
}

impl ChildrenOf {
    fn children<'a>(&self, topic: &'a Map<String, Value>) -> Vec<&'a Map<String, Value>> {
        let list = match self {
            ChildrenOf::Attached => topic
                .get("children")
                .and_then(|c| c.get("attached"))
                .and_then(Value::as_array),
            ChildrenOf::Topics => topic.get("topics").and_then(Value::as_array),
        };
        list.map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let obj = item.as_object();
                    if obj.is_none() {
                        debug!("skipping non-object child topic");
                    }
                    obj
                })
                .collect()
        })
        .unwrap_or_default()
    }
}

fn topic_title(topic: &Map<String, Value>) -> String {
    match topic.get("title") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// The raw text of a marker reference, whatever shape it comes in.
fn marker_text(reference: &Value) -> Option<String> {
    match reference {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => MARKER_OBJECT_KEYS
            .iter()
            .find_map(|k| obj.get(*k).and_then(marker_text)),
        _ => None,
    }
}

impl DocumentLoader for JsonDocumentLoader {
    #[instrument(level = "debug", skip(self, content), fields(bytes = content.len()))]
    fn load(&self, source_name: &str, content: &str) -> ApplicationResult<Forest> {
        let value = Self::parse(source_name, content)?;
        let sheets: Vec<&Value> = match &value {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![&value],
            _ => {
                return Err(ApplicationError::document(
                    source_name,
                    "expected a sheet object or an array of sheets",
                ))
            }
        };

        let parsed: Vec<Sheet> = sheets
            .iter()
            .enumerate()
            .filter_map(|(i, sheet)| self.sheet_from(i, sheet))
            .collect();

        if parsed.is_empty() {
            return Err(ApplicationError::document(
                source_name,
                "no sheet with a root topic",
            ));
        }
        debug!("loaded {} sheets from {}", parsed.len(), source_name);
        Ok(Forest::new(parsed))
    }

    #[instrument(level = "debug", skip(self, content), fields(bytes = content.len()))]
    fn load_cases(&self, source_name: &str, content: &str) -> ApplicationResult<Vec<Record>> {
        let value = Self::parse(source_name, content)?;
        let cases = value
            .get("smoke_test_suite")
            .and_then(|s| s.get("test_cases"))
            .or_else(|| value.get("test_cases"))
            .unwrap_or(&value)
            .as_array()
            .ok_or_else(|| ApplicationError::document(source_name, "expected a list of test cases"))?;

        warn!(
            "{}: rebuilding {} paths by splitting joined strings; titles containing a separator will be split",
            source_name,
            cases.len()
        );

        cases
            .iter()
            .enumerate()
            .map(|(i, case)| {
                let obj = case.as_object().ok_or_else(|| {
                    ApplicationError::document(source_name, format!("test case {i} is not an object"))
                })?;
                self.record_from_case(obj)
            })
            .collect()
    }
}
