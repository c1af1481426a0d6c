//! Business attribute derivation for exported records.
//!
//! Attributes are filled after extraction and before grouping. They never
//! touch a record's path.

use tracing::trace;

use crate::config::{AttributeConfig, KeywordRule};
use crate::domain::{AttributeValue, Record, TagId};

pub const PRIORITY: &str = "priority";
pub const PLATFORM: &str = "platform";
pub const SMOKE_RESULT: &str = "smoke_result";
pub const OWNER: &str = "owner";
pub const SHOWCASE_ISSUE: &str = "showcase_issue";
pub const CORE_FUNCTION: &str = "core_function";
pub const MAIN_FLOW: &str = "main_flow";
pub const EXECUTION_TIME: &str = "execution_time";

/// Fills `Record::attributes`.
pub trait AttributeResolver: Send + Sync {
    fn resolve(&self, record: &mut Record);

    fn resolve_all(&self, records: &mut [Record]) {
        for record in records.iter_mut() {
            self.resolve(record);
        }
    }
}

/// Deterministic resolver driven by tag and keyword tables.
#[derive(Debug, Clone, Default)]
pub struct RuleAttributeResolver {
    rules: AttributeConfig,
}

const PRIORITY_ORDER: [&str; 6] = ["P0", "P1", "P2", "P3", "P4", "P5"];

fn tag_priority(tag: &str) -> &'static str {
    match tag {
        "important" => "P0",
        "priority-1" | "flag-red" | "star-red" => "P1",
        "priority-2" | "flag-yellow" | "star-yellow" => "P2",
        "priority-3" => "P3",
        "priority-4" => "P4",
        _ => "P5",
    }
}

/// Highest priority among the tags; no tags at all means P3.
pub fn highest_priority<'a>(tags: impl IntoIterator<Item = &'a TagId>) -> &'static str {
    let found: Vec<&str> = tags.into_iter().map(|t| tag_priority(t.as_str())).collect();
    if found.is_empty() {
        return "P3";
    }
    PRIORITY_ORDER
        .into_iter()
        .find(|p| found.contains(p))
        .unwrap_or("P5")
}

fn first_match<'a>(rules: &'a [KeywordRule], haystack: &str) -> Option<&'a str> {
    rules
        .iter()
        .find(|rule| {
            rule.keywords
                .iter()
                .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
        })
        .map(|rule| rule.value.as_str())
}

impl RuleAttributeResolver {
    pub fn new(rules: AttributeConfig) -> Self {
        Self { rules }
    }

    pub fn priority(&self, record: &Record) -> &'static str {
        highest_priority(&record.tags)
    }

    fn platform(&self, joined_lower: &str) -> String {
        first_match(&self.rules.platform, joined_lower)
            .unwrap_or(self.rules.default_platform.as_str())
            .to_string()
    }

    fn owner(&self, joined_lower: &str) -> String {
        first_match(&self.rules.owners, joined_lower)
            .unwrap_or(self.rules.default_owner.as_str())
            .to_string()
    }

    fn smoke_result(record: &Record) -> &'static str {
        if record.has_tag("flag-red") || record.has_tag("priority-1") {
            "需关注"
        } else if record.has_tag("symbol-wrong") {
            "失败"
        } else {
            "通过"
        }
    }

    fn showcase_issue(record: &Record) -> &'static str {
        if record.has_tag("symbol-wrong") {
            "存在功能问题"
        } else if record.has_tag("flag-red") {
            "需重点关注"
        } else if record.has_tag("priority-1") {
            "高优先级验证"
        } else {
            "无"
        }
    }

    fn core_function(&self, record: &Record, joined: &str) -> bool {
        ["priority-1", "flag-red", "important"]
            .iter()
            .any(|t| record.has_tag(t))
            || self.rules.core_paths.iter().any(|k| joined.contains(k.as_str()))
    }

    fn main_flow(&self, record: &Record, joined: &str) -> bool {
        record.has_tag("priority-1")
            || self
                .rules
                .main_flow_keywords
                .iter()
                .any(|k| joined.contains(k.as_str()))
    }

    fn execution_time(record: &Record) -> &'static str {
        if record.has_tag("priority-1") {
            "< 1分钟"
        } else if record.has_tag("priority-2") {
            "< 2分钟"
        } else {
            "< 3分钟"
        }
    }
}

impl AttributeResolver for RuleAttributeResolver {
    fn resolve(&self, record: &mut Record) {
        let joined = record.joined_path(" > ");
        let lower = joined.to_lowercase();

        let values: [(&str, AttributeValue); 8] = [
            (PRIORITY, self.priority(record).into()),
            (PLATFORM, self.platform(&lower).into()),
            (SMOKE_RESULT, Self::smoke_result(record).into()),
            (OWNER, self.owner(&lower).into()),
            (SHOWCASE_ISSUE, Self::showcase_issue(record).into()),
            (CORE_FUNCTION, self.core_function(record, &joined).into()),
            (MAIN_FLOW, self.main_flow(record, &joined).into()),
            (EXECUTION_TIME, Self::execution_time(record).into()),
        ];
        trace!("attributes for {:?}: {} values", record.title(), values.len());

        for (key, value) in values {
            record.attributes.insert(key.to_string(), value);
        }
    }
}
