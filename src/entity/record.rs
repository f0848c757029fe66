//! Feed parsing and the string-keyed content mapping

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ops::Index;

/// JSON rendering of an Atom feed
#[derive(Debug, Deserialize)]
struct FeedDoc {
    #[serde(default)]
    entry: Vec<EntryDoc>,
}

#[derive(Debug, Deserialize)]
struct EntryDoc {
    name: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    updated: Option<String>,
    #[serde(default)]
    links: Map<String, Value>,
    #[serde(default)]
    acl: Map<String, Value>,
    #[serde(default)]
    content: Map<String, Value>,
}

/// Parse every entry of a feed response
///
/// `fallback_path` supplies the entity path for entries that carry neither an
/// `alternate` link nor a parseable `id`.
pub fn parse_feed(text: &str, fallback_path: impl Fn(&str) -> String) -> Result<Vec<Record>> {
    let feed: FeedDoc = serde_json::from_str(text)?;
    Ok(feed
        .entry
        .into_iter()
        .map(|entry| {
            let fallback = fallback_path(&entry.name);
            Record::from_entry(entry, fallback)
        })
        .collect())
}

/// Convert a JSON value to the string form the content mapping exposes
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a stringified flag the way the service writes them
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "True" | "TRUE" | "t" | "yes" => Some(true),
        "0" | "false" | "False" | "FALSE" | "f" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Key/value content of an entity, values stringified
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Content(BTreeMap<String, String>);

impl Content {
    pub fn from_json(map: &Map<String, Value>) -> Self {
        Self(
            map.iter()
                .filter(|(k, _)| k.as_str() != "eai:attributes")
                .map(|(k, v)| (k.clone(), stringify(v)))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|s| s.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Flag value of `key`; `None` when absent or not a flag
    pub fn flag(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(parse_flag)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Index<&str> for Content {
    type Output = str;

    /// Panics when the key is absent, like `HashMap` indexing
    fn index(&self, key: &str) -> &str {
        match self.0.get(key) {
            Some(value) => value,
            None => panic!("content has no field '{}'", key),
        }
    }
}

/// Field declarations an endpoint publishes for an entity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSpec {
    pub required: Vec<String>,
    pub optional: Vec<String>,
    pub wildcard: Vec<String>,
}

/// Entity metadata: access control and declared fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// ACL entries (owner, app, sharing, can_write, ...)
    pub access: Content,
    pub fields: FieldSpec,
}

impl Metadata {
    fn from_entry(acl: &Map<String, Value>, content: &Map<String, Value>) -> Self {
        let names = |attrs: &Value, key: &str| -> Vec<String> {
            attrs
                .get(key)
                .and_then(|v| v.as_array())
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|i| i.as_str().map(|s| s.to_string()))
                        .collect()
                })
                .unwrap_or_default()
        };

        let fields = content
            .get("eai:attributes")
            .map(|attrs| FieldSpec {
                required: names(attrs, "requiredFields"),
                optional: names(attrs, "optionalFields"),
                wildcard: names(attrs, "wildcardFields"),
            })
            .unwrap_or_default();

        Self {
            access: Content::from_json(acl),
            fields,
        }
    }
}

/// One parsed feed entry
#[derive(Debug, Clone)]
pub struct Record {
    pub name: String,
    /// Absolute REST path of the entity
    pub path: String,
    pub updated: Option<DateTime<FixedOffset>>,
    pub content: Content,
    pub metadata: Metadata,
}

impl Record {
    fn from_entry(entry: EntryDoc, fallback_path: String) -> Self {
        let path = entry
            .links
            .get("alternate")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .or_else(|| {
                url::Url::parse(&entry.id)
                    .ok()
                    .map(|u| u.path().to_string())
                    .filter(|p| p.len() > 1)
            })
            .unwrap_or(fallback_path);

        let updated = entry
            .updated
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok());

        Self {
            name: entry.name,
            path,
            updated,
            metadata: Metadata::from_entry(&entry.acl, &entry.content),
            content: Content::from_json(&entry.content),
        }
    }

    /// Value of a content field, or an error naming this entity
    pub fn require(&self, field: &str) -> Result<&str> {
        self.content.get(field).ok_or_else(|| Error::MissingField {
            entity: self.name.clone(),
            field: field.to_string(),
        })
    }
}
