//! Flattened, path-labeled export units.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::tag::TagId;

/// Free-form business value attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Text(String),
    Flag(bool),
    Number(i64),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::Flag(b) => write!(f, "{}", if *b { "是" } else { "否" }),
            AttributeValue::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::Text(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Flag(b)
    }
}

/// A node projected to its full ancestor path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub path: Vec<String>,
    pub tags: BTreeSet<TagId>,
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Record {
    pub fn new(path: Vec<String>, tags: BTreeSet<TagId>) -> DomainResult<Self> {
        if path.is_empty() {
            return Err(DomainError::EmptyPath);
        }
        Ok(Self {
            path,
            tags,
            attributes: BTreeMap::new(),
        })
    }

    /// Last path component, i.e. the title of the originating node.
    pub fn title(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.as_str() == tag)
    }

    pub fn joined_path(&self, separator: &str) -> String {
        self.path.join(separator)
    }
}
