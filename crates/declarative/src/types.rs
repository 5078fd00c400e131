//! Core types for declarative resource reconciliation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Literal the backend returns in place of a stored secret
pub const MASKED_SECRET: &str = "********";

/// A tag reference in desired state: either a label or a pre-resolved id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagRef {
    /// Server-assigned id, passed through unvalidated
    Id(i64),
    /// Human-readable label, matched case-insensitively
    Name(String),
}

impl From<&str> for TagRef {
    fn from(label: &str) -> Self {
        Self::Name(label.to_string())
    }
}

impl From<i64> for TagRef {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

/// A tag as known to the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub label: String,
}

/// Key used to match desired and server resources
///
/// Name is compared exactly, the type is always lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
    pub name: String,
    pub kind: String,
}

impl CompositeKey {
    pub fn new(name: &str, implementation: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: implementation.to_lowercase(),
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.kind)
        }
    }
}

/// One user-declared resource
///
/// Every optional part is "leave the server alone" when absent: a missing
/// scalar is never the same thing as `false`, `0` or `""`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredResource {
    /// Identity within a resource kind
    #[serde(alias = "path", alias = "remote_path", alias = "remotePath")]
    pub name: String,

    /// Implementation selecting the schema template
    #[serde(default, alias = "type", alias = "host")]
    pub implementation: String,

    /// Implementation-specific field overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Value>>,

    /// Tag labels or ids
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<TagRef>>,

    /// Explicitly specified top-level properties
    #[serde(flatten)]
    pub scalars: BTreeMap<String, Value>,
}

impl DesiredResource {
    pub fn new(name: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            implementation: implementation.into(),
            ..Self::default()
        }
    }

    pub fn with_scalar(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.scalars.insert(name.to_string(), value.into());
        self
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields
            .get_or_insert_with(Map::new)
            .insert(name.to_string(), value.into());
        self
    }

    pub fn with_tags<T: Into<TagRef>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn key(&self) -> CompositeKey {
        CompositeKey::new(&self.name, &self.implementation)
    }

    /// Whether a non-empty field map was given
    pub fn has_fields(&self) -> bool {
        self.fields.as_ref().is_some_and(|f| !f.is_empty())
    }

    /// Resolved tag ids; labels still present here are skipped
    pub fn tag_ids(&self) -> Vec<i64> {
        self.tags
            .iter()
            .flatten()
            .filter_map(|t| match t {
                TagRef::Id(id) => Some(*id),
                TagRef::Name(_) => None,
            })
            .collect()
    }
}

/// One `{name, value}` entry of a server resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Live state of one resource on the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResource {
    pub id: i64,
    pub name: String,
    pub implementation: String,
    pub fields: Vec<Field>,
    pub tags: Vec<i64>,
    pub scalars: BTreeMap<String, Value>,
    /// Wire representation exactly as the backend returned it
    pub raw: Value,
}

impl ServerResource {
    pub fn new(id: i64, name: impl Into<String>, implementation: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            implementation: implementation.into(),
            fields: Vec::new(),
            tags: Vec::new(),
            scalars: BTreeMap::new(),
            raw: Value::Null,
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.push(Field::new(name, value));
        self
    }

    pub fn with_scalar(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.scalars.insert(name.to_string(), value.into());
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = i64>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    pub fn key(&self) -> CompositeKey {
        CompositeKey::new(&self.name, &self.implementation)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// Blueprint of one field in a schema template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateField {
    pub name: String,
    pub default: Value,
    /// No default was offered, so the backend may insist on a value
    pub possibly_required: bool,
}

impl TemplateField {
    pub fn new(name: impl Into<String>, default: Value) -> Self {
        let possibly_required = default.is_null();
        Self {
            name: name.into(),
            default,
            possibly_required,
        }
    }
}

/// Per-implementation blueprint used to build complete payloads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaTemplate {
    pub implementation: String,
    pub fields: Vec<TemplateField>,
    pub raw: Value,
}

impl SchemaTemplate {
    pub fn field(&self, name: &str) -> Option<&TemplateField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Accepted shape of a top-level scalar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Integer { min: Option<i64>, max: Option<i64> },
    Text,
    /// Any JSON value; the adapter interprets it
    Any,
}

/// A top-level property a resource kind accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarSpec {
    /// Wire (camelCase) name
    pub name: &'static str,
    pub kind: ScalarKind,
}

impl ScalarSpec {
    pub const fn bool(name: &'static str) -> Self {
        Self {
            name,
            kind: ScalarKind::Bool,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: ScalarKind::Integer {
                min: None,
                max: None,
            },
        }
    }

    pub const fn ranged(name: &'static str, min: i64, max: i64) -> Self {
        Self {
            name,
            kind: ScalarKind::Integer {
                min: Some(min),
                max: Some(max),
            },
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ScalarKind::Text,
        }
    }

    pub const fn any(name: &'static str) -> Self {
        Self {
            name,
            kind: ScalarKind::Any,
        }
    }

    /// Check a desired value against this spec
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match self.kind {
            ScalarKind::Bool if !value.is_boolean() => {
                Err(format!("'{}' must be a boolean, got {value}", self.name))
            }
            ScalarKind::Text if !value.is_string() => {
                Err(format!("'{}' must be a string, got {value}", self.name))
            }
            ScalarKind::Integer { min, max } => {
                let Some(n) = value.as_i64() else {
                    return Err(format!("'{}' must be an integer, got {value}", self.name));
                };
                if min.is_some_and(|m| n < m) || max.is_some_and(|m| n > m) {
                    return Err(format!(
                        "'{}' is out of range ({}..={}): {n}",
                        self.name,
                        min.map_or_else(String::new, |m| m.to_string()),
                        max.map_or_else(String::new, |m| m.to_string()),
                    ));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Result of applying one planned operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// Apply failed
    Failed { error: String },
    /// Apply was skipped
    Skipped { reason: String },
}

impl ApplyResult {
    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created | Self::Modified | Self::Removed)
    }
}

/// Aggregate counts of one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Desired resources excluded by validation
    pub invalid: usize,
}

impl SyncSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.added + self.updated + self.removed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.invalid == 0
    }

    /// Merge another summary into this one
    pub fn merge(&mut self, other: &Self) {
        self.added += other.added;
        self.updated += other.updated;
        self.removed += other.removed;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.invalid += other.invalid;
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ApplyResult) {
        match result {
            ApplyResult::Created => self.added += 1,
            ApplyResult::Modified => self.updated += 1,
            ApplyResult::Removed => self.removed += 1,
            ApplyResult::Failed { .. } => self.failed += 1,
            ApplyResult::Skipped { .. } => self.skipped += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_composite_key_lowercases_type_only() {
        let a = DesiredResource::new("QB", "qBittorrent").key();
        let b = CompositeKey::new("QB", "QBITTORRENT");
        assert_eq!(a, b);
        assert_ne!(a, CompositeKey::new("qb", "qbittorrent"));
    }

    #[test]
    fn test_desired_absent_scalars_survive_round_trip() {
        let desired = DesiredResource::new("qb", "qBittorrent").with_scalar("enable", false);
        let text = serde_json::to_string(&desired).unwrap();
        let back: DesiredResource = serde_json::from_str(&text).unwrap();

        assert_eq!(back.scalars.get("enable"), Some(&json!(false)));
        assert!(!back.scalars.contains_key("priority"));
        assert!(back.fields.is_none());
        assert!(back.tags.is_none());
    }

    #[test]
    fn test_desired_aliases_and_flattened_scalars() {
        let desired: DesiredResource = serde_json::from_value(json!({
            "name": "qb",
            "type": "qBittorrent",
            "priority": 3,
            "tags": ["4K", 7],
            "fields": {"host": "localhost"}
        }))
        .unwrap();

        assert_eq!(desired.implementation, "qBittorrent");
        assert_eq!(desired.scalars.get("priority"), Some(&json!(3)));
        assert_eq!(
            desired.tags,
            Some(vec![TagRef::Name("4K".into()), TagRef::Id(7)])
        );
        assert!(desired.has_fields());
    }

    #[test]
    fn test_camel_case_identity_spellings() {
        let desired: DesiredResource = serde_json::from_value(json!({
            "remotePath": "/downloads/",
            "host": "qbittorrent",
            "localPath": "/data/"
        }))
        .unwrap();

        assert_eq!(desired.name, "/downloads/");
        assert_eq!(desired.implementation, "qbittorrent");
        assert_eq!(desired.scalars.len(), 1);
        assert_eq!(desired.scalars.get("localPath"), Some(&json!("/data/")));
    }

    #[test]
    fn test_scalar_spec_checks() {
        let priority = ScalarSpec::ranged("priority", 1, 50);
        assert!(priority.check(&json!(1)).is_ok());
        assert!(priority.check(&json!(51)).is_err());
        assert!(priority.check(&json!("high")).is_err());

        let enable = ScalarSpec::bool("enable");
        assert!(enable.check(&json!(true)).is_ok());
        assert!(enable.check(&json!(1)).is_err());

        assert!(ScalarSpec::any("formatScores").check(&json!({})).is_ok());
    }

    #[test]
    fn test_template_field_required_flag() {
        assert!(TemplateField::new("host", Value::Null).possibly_required);
        assert!(!TemplateField::new("port", json!(8080)).possibly_required);
    }

    #[test]
    fn test_summary_add_and_merge() {
        let mut summary = SyncSummary::default();
        summary.add_result(&ApplyResult::Created);
        summary.add_result(&ApplyResult::Failed {
            error: "boom".into(),
        });

        let mut total = SyncSummary {
            updated: 2,
            ..Default::default()
        };
        total.merge(&summary);

        assert_eq!(total.added, 1);
        assert_eq!(total.failed, 1);
        assert_eq!(total.total_changes(), 3);
        assert!(!total.is_success());
    }
}
