//! Run-scoped context and provider traits
//!
//! [`ServerCache`] lives for exactly one backend-instance run. It is passed
//! explicitly to every call that needs it and mutated only while the engine
//! holds it mutably (schema fetch, lookups, tag pre-resolution); the apply
//! batches see it read-only.

use crate::types::{ApplyResult, SchemaTemplate, Tag};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Provider for the backend's tag list
///
/// Implement this trait to let the engine read and create tags.
pub trait TagStore: Send + Sync {
    /// List all tags known to the backend
    fn list_tags(&self) -> Result<Vec<Tag>>;

    /// Create a tag and return it with its server-assigned id
    fn create_tag(&self, label: &str) -> Result<Tag>;
}

/// Single-run store of previously fetched lookups
#[derive(Debug, Default)]
pub struct ServerCache {
    tags: Option<Vec<Tag>>,
    schemas: HashMap<String, Vec<SchemaTemplate>>,
    /// category -> lowercased name -> id
    lookups: HashMap<String, HashMap<String, i64>>,
    placeholders: i64,
}

impl ServerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Known tags (empty until loaded)
    pub fn tags(&self) -> &[Tag] {
        self.tags.as_deref().unwrap_or_default()
    }

    pub fn tags_loaded(&self) -> bool {
        self.tags.is_some()
    }

    /// Load the tag list once per run
    pub fn ensure_tags(&mut self, store: &dyn TagStore) -> Result<()> {
        if self.tags.is_none() {
            let tags = store.list_tags()?;
            log::debug!("Cached {} tags", tags.len());
            self.tags = Some(tags);
        }
        Ok(())
    }

    /// Append a tag created during this run
    pub fn push_tag(&mut self, tag: Tag) {
        self.tags.get_or_insert_with(Vec::new).push(tag);
    }

    /// Next negative id for something a dry run pretends to create
    pub fn placeholder_id(&mut self) -> i64 {
        self.placeholders -= 1;
        self.placeholders
    }

    /// Record a tag that a real run would create
    ///
    /// Placeholder ids are negative so they never collide with server ids.
    pub fn placeholder_tag(&mut self, label: &str) -> Tag {
        let tag = Tag {
            id: self.placeholder_id(),
            label: label.to_string(),
        };
        self.push_tag(tag.clone());
        tag
    }

    /// Cached schema templates for a resource kind
    pub fn schema(&self, kind: &str) -> Option<&[SchemaTemplate]> {
        self.schemas.get(kind).map(Vec::as_slice)
    }

    pub fn store_schema(&mut self, kind: &str, templates: Vec<SchemaTemplate>) {
        self.schemas.insert(kind.to_string(), templates);
    }

    /// Template for an implementation, matched case-insensitively
    pub fn template(&self, kind: &str, implementation: &str) -> Option<&SchemaTemplate> {
        self.schema(kind)?
            .iter()
            .find(|t| t.implementation.eq_ignore_ascii_case(implementation))
    }

    /// Whether a lookup category has been loaded
    pub fn has_lookup(&self, category: &str) -> bool {
        self.lookups.contains_key(category)
    }

    /// Replace a lookup category with `(name, id)` entries
    pub fn set_lookup(&mut self, category: &str, entries: impl IntoIterator<Item = (String, i64)>) {
        let map = entries
            .into_iter()
            .map(|(name, id)| (name.to_lowercase(), id))
            .collect();
        self.lookups.insert(category.to_string(), map);
    }

    /// Add or overwrite one entry of a lookup category
    pub fn insert_lookup(&mut self, category: &str, name: &str, id: i64) {
        self.lookups
            .entry(category.to_string())
            .or_default()
            .insert(name.to_lowercase(), id);
    }

    /// Id of a named entry, ignoring case
    pub fn lookup(&self, category: &str, name: &str) -> Option<i64> {
        self.lookups
            .get(category)?
            .get(&name.to_lowercase())
            .copied()
    }
}

/// Policy for server resources that have no desired counterpart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePolicy {
    #[serde(default)]
    pub enabled: bool,
    /// Names exempt from deletion
    #[serde(default)]
    pub ignore: Vec<String>,
}

impl DeletePolicy {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ignore: Vec::new(),
        }
    }

    /// Whether an unmanaged resource with this name may be deleted
    pub fn allows(&self, name: &str) -> bool {
        self.enabled && !self.ignore.iter().any(|i| i == name)
    }
}

/// Options for one reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Don't make changes, just report what would happen
    pub dry_run: bool,
    pub delete_unmanaged: DeletePolicy,
    /// Treat masked secrets as real values during comparison
    pub update_secrets: bool,
}

/// Kind of operation in an apply batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

/// Progress callback for apply batches
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback: Send {
    /// Called when starting a batch
    fn on_batch_start(&mut self, kind: &str, operation: Operation, count: usize);

    /// Called when an item has been applied
    fn on_item_complete(&mut self, kind: &str, name: &str, result: &ApplyResult);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _kind: &str, _operation: Operation, _count: usize) {}
    fn on_item_complete(&mut self, _kind: &str, _name: &str, _result: &ApplyResult) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CountingStore {
        calls: Mutex<usize>,
    }

    impl TagStore for CountingStore {
        fn list_tags(&self) -> Result<Vec<Tag>> {
            *self.calls.lock().unwrap() += 1;
            Ok(vec![Tag {
                id: 1,
                label: "hd".into(),
            }])
        }

        fn create_tag(&self, label: &str) -> Result<Tag> {
            anyhow::bail!("unexpected create of {label}")
        }
    }

    #[test]
    fn test_tags_loaded_once() {
        let store = CountingStore {
            calls: Mutex::new(0),
        };
        let mut cache = ServerCache::new();
        assert!(!cache.tags_loaded());

        cache.ensure_tags(&store).unwrap();
        cache.ensure_tags(&store).unwrap();

        assert_eq!(*store.calls.lock().unwrap(), 1);
        assert_eq!(cache.tags().len(), 1);
    }

    #[test]
    fn test_placeholder_tags_are_negative() {
        let mut cache = ServerCache::new();
        let a = cache.placeholder_tag("a");
        let b = cache.placeholder_tag("b");
        assert_eq!(a.id, -1);
        assert_eq!(b.id, -2);
        assert_eq!(cache.tags().len(), 2);
    }

    #[test]
    fn test_template_lookup_ignores_case() {
        let mut cache = ServerCache::new();
        cache.store_schema(
            "download client",
            vec![SchemaTemplate {
                implementation: "QBittorrent".into(),
                fields: vec![],
                raw: serde_json::Value::Null,
            }],
        );
        assert!(cache.template("download client", "qbittorrent").is_some());
        assert!(cache.template("download client", "Transmission").is_none());
        assert!(cache.template("root folder", "QBittorrent").is_none());
    }

    #[test]
    fn test_lookups() {
        let mut cache = ServerCache::new();
        assert!(!cache.has_lookup("quality profile"));
        cache.set_lookup("quality profile", vec![("HD-1080p".to_string(), 4)]);
        cache.insert_lookup("quality profile", "Any", 1);

        assert_eq!(cache.lookup("quality profile", "hd-1080p"), Some(4));
        assert_eq!(cache.lookup("quality profile", "ANY"), Some(1));
        assert_eq!(cache.lookup("custom format", "Any"), None);
    }

    #[test]
    fn test_delete_policy() {
        let policy = DeletePolicy {
            enabled: true,
            ignore: vec!["Legacy".into()],
        };
        assert!(policy.allows("Other"));
        assert!(!policy.allows("Legacy"));
        assert!(!DeletePolicy::default().allows("Other"));
    }
}
