//! Tag identifiers and the vocabulary that recognizes them.
//!
//! The filter and grouper treat [`TagId`] as an opaque string. Everything that
//! knows about the shape of raw marker references in source documents lives
//! here and in the loader, so the core never branches on representation.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{instrument, trace};

/// Opaque tag identifier, e.g. `priority-1` or `flag-red`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(String);

impl TagId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TagId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One recognized tag with its human-readable label and accepted aliases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagDefinition {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl TagDefinition {
    pub fn new(id: &str, label: &str, aliases: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Default marker set of the mind-map editor, with the spellings seen in the wild.
pub fn default_tag_definitions() -> Vec<TagDefinition> {
    vec![
        TagDefinition::new(
            "important",
            "重要 (红色叹号)",
            &["exclamation", "warning", "alert", "critical", "!", "重要", "警告", "关键"],
        ),
        TagDefinition::new(
            "priority-1",
            "优先级1 (红色1)",
            &["priority_1", "priority1", "p1", "1", "优先级1"],
        ),
        TagDefinition::new(
            "priority-2",
            "优先级2 (橙色2)",
            &["priority_2", "priority2", "p2", "2", "优先级2"],
        ),
        TagDefinition::new(
            "priority-3",
            "优先级3 (黄色3)",
            &["priority_3", "priority3", "p3", "3", "优先级3"],
        ),
        TagDefinition::new(
            "priority-4",
            "优先级4 (绿色4)",
            &["priority_4", "priority4", "p4", "4", "优先级4"],
        ),
        TagDefinition::new(
            "priority-5",
            "优先级5 (灰色5)",
            &["priority_5", "priority5", "p5", "5", "优先级5"],
        ),
        TagDefinition::new(
            "flag-red",
            "红旗",
            &["flag_red", "red_flag", "red-flag", "flagred", "红旗"],
        ),
        TagDefinition::new(
            "flag-yellow",
            "黄旗",
            &["flag_yellow", "yellow_flag", "yellow-flag", "flagyellow", "黄旗"],
        ),
        TagDefinition::new(
            "star-red",
            "红星",
            &["star_red", "red_star", "red-star", "starred", "红星"],
        ),
        TagDefinition::new(
            "star-yellow",
            "黄星",
            &["star_yellow", "yellow_star", "yellow-star", "staryellow", "黄星"],
        ),
        TagDefinition::new("symbol-wrong", "错误 (红叉)", &["symbol_wrong", "wrong"]),
    ]
}

/// Immutable set of recognized tags, built once and shared behind an `Arc`.
///
/// Resolution order for a raw marker string:
/// 1. exact id or alias (case-insensitive, trimmed)
/// 2. `priority N` / `优先级N` pattern
/// 3. color and shape keywords (red/yellow + flag/star)
/// 4. importance keywords
///
/// Steps 2-4 only produce ids that are part of the vocabulary.
#[derive(Debug, Clone)]
pub struct TagVocabulary {
    definitions: Vec<TagDefinition>,
    lookup: HashMap<String, TagId>,
    priority_pattern: Regex,
}

impl Default for TagVocabulary {
    fn default() -> Self {
        Self::new(default_tag_definitions())
    }
}

impl TagVocabulary {
    pub fn new(definitions: Vec<TagDefinition>) -> Self {
        let mut lookup = HashMap::new();
        for def in &definitions {
            let id = TagId::new(def.id.clone());
            lookup.insert(def.id.trim().to_lowercase(), id.clone());
            for alias in &def.aliases {
                lookup
                    .entry(alias.trim().to_lowercase())
                    .or_insert_with(|| id.clone());
            }
        }

        Self {
            definitions,
            lookup,
            priority_pattern: Regex::new(r"(?:priority|优先级)[-_\s]*([1-5])")
                .expect("static priority pattern is valid"),
        }
    }

    pub fn definitions(&self) -> &[TagDefinition] {
        &self.definitions
    }

    pub fn contains(&self, id: &TagId) -> bool {
        self.definitions.iter().any(|d| d.id == id.as_str())
    }

    pub fn label(&self, id: &TagId) -> Option<&str> {
        self.definitions
            .iter()
            .find(|d| d.id == id.as_str())
            .map(|d| d.label.as_str())
    }

    /// Resolve a raw marker string to a recognized tag.
    #[instrument(level = "trace", skip(self))]
    pub fn resolve(&self, raw: &str) -> Option<TagId> {
        let key = raw.trim().to_lowercase();
        if key.is_empty() {
            return None;
        }

        if let Some(id) = self.lookup.get(&key) {
            return Some(id.clone());
        }

        if let Some(caps) = self.priority_pattern.captures(&key) {
            let candidate = TagId::new(format!("priority-{}", &caps[1]));
            trace!("resolved {:?} via priority pattern", raw);
            return self.known(candidate);
        }

        self.resolve_fuzzy(&key)
    }

    fn resolve_fuzzy(&self, key: &str) -> Option<TagId> {
        let has_any = |words: &[&str]| words.iter().any(|w| key.contains(w));
        let flag = has_any(&["flag", "旗", "drapeau"]);
        let star = has_any(&["star", "星", "étoile"]);

        if has_any(&["red", "红", "rouge"]) {
            return if flag {
                self.known(TagId::from("flag-red"))
            } else if star {
                self.known(TagId::from("star-red"))
            } else {
                self.known(TagId::from("important"))
            };
        }

        if has_any(&["yellow", "黄", "jaune"]) {
            if flag {
                return self.known(TagId::from("flag-yellow"));
            }
            if star {
                return self.known(TagId::from("star-yellow"));
            }
        }

        if has_any(&["important", "重要", "critical", "关键", "urgent", "紧急"]) {
            return self.known(TagId::from("important"));
        }

        None
    }

    fn known(&self, id: TagId) -> Option<TagId> {
        self.contains(&id).then_some(id)
    }
}
