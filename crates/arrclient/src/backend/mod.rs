//! Backend trait and implementations.
//!
//! [`Backend`] is the minimal CRUD surface the reconciler needs. The real
//! implementation is [`http::HttpBackend`]; resources travel as raw JSON so
//! one client serves every dialect.
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use arrclient::backend::{Backend, MockBackend};
//! use arrclient::{Dialect, ResourceKind};
//! use serde_json::json;
//!
//! let mock = MockBackend::new(Dialect::Sonarr);
//! mock.create(ResourceKind::RootFolder, &json!({"path": "/tv"})).unwrap();
//!
//! let folders = mock.list(ResourceKind::RootFolder).unwrap();
//! assert_eq!(folders.len(), 1);
//! ```

pub mod http;

use crate::error::{Error, Result};
use crate::types::{Dialect, ResourceKind, SchemaShape, SystemStatus, Tag};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Literal the servers return in place of stored secrets.
pub const MASK: &str = "********";

/// Backend trait for configuration resources.
pub trait Backend: Send + Sync {
    /// Dialect this backend speaks.
    fn dialect(&self) -> Dialect;

    /// List all resources of a kind.
    fn list(&self, kind: ResourceKind) -> Result<Vec<Value>>;

    /// Fetch the schema of a kind.
    ///
    /// [`SchemaShape::Single`] kinds return a one-element list;
    /// [`SchemaShape::None`] kinds return an empty list without a request.
    fn schema(&self, kind: ResourceKind) -> Result<Vec<Value>>;

    /// Create a resource and return the stored copy.
    fn create(&self, kind: ResourceKind, payload: &Value) -> Result<Value>;

    /// Replace a resource and return the stored copy.
    fn update(&self, kind: ResourceKind, id: i64, payload: &Value) -> Result<Value>;

    /// Delete a resource.
    fn delete(&self, kind: ResourceKind, id: i64) -> Result<()>;

    /// List all tags.
    fn tags(&self) -> Result<Vec<Tag>>;

    /// Create a tag.
    fn create_tag(&self, label: &str) -> Result<Tag>;

    /// Fetch application status (used as a connectivity check).
    fn system_status(&self) -> Result<SystemStatus>;
}

/// Ensure a dialect exposes a kind.
pub(crate) fn require(dialect: Dialect, kind: ResourceKind) -> Result<()> {
    if dialect.supports(kind) {
        Ok(())
    } else {
        Err(Error::Unsupported {
            dialect: dialect.to_string(),
            kind: kind.to_string(),
        })
    }
}

fn is_secret(name: &str) -> bool {
    let name = name.to_lowercase();
    ["password", "passkey", "apikey", "api_key", "secret", "token"]
        .iter()
        .any(|s| name.contains(s))
}

#[derive(Debug, Default)]
struct MockState {
    resources: HashMap<ResourceKind, Vec<Value>>,
    schemas: HashMap<ResourceKind, Vec<Value>>,
    tags: Vec<Tag>,
    next_id: i64,
    calls: Vec<String>,
    failures: HashMap<String, (u16, Value)>,
}

/// Mock backend for testing without network access.
///
/// Resources live in memory with server-like behavior: ids are assigned on
/// create, secret fields come back masked, and a masked secret sent on
/// update keeps the stored value. Every call is recorded.
#[derive(Debug, Clone)]
pub struct MockBackend {
    dialect: Dialect,
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            state: Arc::new(Mutex::new(MockState {
                next_id: 1,
                ..MockState::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // a panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Seed a resource, assigning an id when it has none.
    pub fn add(&self, kind: ResourceKind, mut resource: Value) -> i64 {
        let mut state = self.state();
        let id = match resource.get("id").and_then(Value::as_i64) {
            Some(id) => id,
            None => {
                let id = state.next_id;
                resource["id"] = id.into();
                id
            }
        };
        state.next_id = state.next_id.max(id + 1);
        state.resources.entry(kind).or_default().push(resource);
        id
    }

    /// Set the schema answer for a kind.
    pub fn set_schema(&self, kind: ResourceKind, schema: Vec<Value>) {
        self.state().schemas.insert(kind, schema);
    }

    /// Seed a tag.
    pub fn add_tag(&self, id: i64, label: &str) {
        let mut state = self.state();
        state.tags.push(Tag {
            id,
            label: label.to_string(),
        });
        state.next_id = state.next_id.max(id + 1);
    }

    /// Make a call fail with an API error.
    ///
    /// Calls are named like `POST downloadclient` or
    /// `DELETE qualityprofile/3`.
    pub fn fail(&self, call: &str, status: u16, body: Value) {
        self.state()
            .failures
            .insert(call.to_string(), (status, body));
    }

    /// Calls made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    /// Number of calls that would have changed server state.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| !c.starts_with("GET"))
            .count()
    }

    /// Stored resources of a kind, secrets unmasked.
    #[must_use]
    pub fn stored(&self, kind: ResourceKind) -> Vec<Value> {
        self.state().resources.get(&kind).cloned().unwrap_or_default()
    }

    fn record(&self, call: String) -> Result<()> {
        let mut state = self.state();
        let failure = state.failures.get(&call).cloned();
        state.calls.push(call);
        match failure {
            Some((status, body)) => Err(Error::api(status, body)),
            None => Ok(()),
        }
    }

    fn masked(resource: &Value) -> Value {
        let mut resource = resource.clone();
        if let Some(fields) = resource.get_mut("fields").and_then(Value::as_array_mut) {
            for field in fields {
                let secret = field
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(is_secret);
                let set = field
                    .get("value")
                    .and_then(Value::as_str)
                    .is_some_and(|v| !v.is_empty());
                if secret && set {
                    field["value"] = MASK.into();
                }
            }
        }
        resource
    }

    /// Keep stored secrets the payload only echoes back masked.
    fn merge_secrets(stored: &Value, payload: &mut Value) {
        let Some(fields) = payload.get_mut("fields").and_then(Value::as_array_mut) else {
            return;
        };
        for field in fields {
            if field.get("value").and_then(Value::as_str) != Some(MASK) {
                continue;
            }
            let name = field.get("name").and_then(Value::as_str).unwrap_or_default();
            let original = stored
                .get("fields")
                .and_then(Value::as_array)
                .and_then(|f| f.iter().find(|s| s.get("name").and_then(Value::as_str) == Some(name)))
                .and_then(|s| s.get("value"))
                .cloned();
            if let Some(original) = original {
                field["value"] = original;
            }
        }
    }
}

impl Backend for MockBackend {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn list(&self, kind: ResourceKind) -> Result<Vec<Value>> {
        require(self.dialect, kind)?;
        self.record(format!("GET {}", kind.endpoint()))?;
        Ok(self.stored(kind).iter().map(Self::masked).collect())
    }

    fn schema(&self, kind: ResourceKind) -> Result<Vec<Value>> {
        require(self.dialect, kind)?;
        if kind.schema_shape() == SchemaShape::None {
            return Ok(Vec::new());
        }
        self.record(format!("GET {}/schema", kind.endpoint()))?;
        Ok(self.state().schemas.get(&kind).cloned().unwrap_or_default())
    }

    fn create(&self, kind: ResourceKind, payload: &Value) -> Result<Value> {
        require(self.dialect, kind)?;
        self.record(format!("POST {}", kind.endpoint()))?;
        let mut resource = payload.clone();
        if let Some(map) = resource.as_object_mut() {
            map.remove("id");
        }
        let id = self.add(kind, resource);
        let stored = self.stored(kind);
        let created = stored
            .iter()
            .find(|r| r.get("id").and_then(Value::as_i64) == Some(id))
            .ok_or_else(|| Error::Other(format!("mock lost {kind} {id}")))?;
        Ok(Self::masked(created))
    }

    fn update(&self, kind: ResourceKind, id: i64, payload: &Value) -> Result<Value> {
        require(self.dialect, kind)?;
        self.record(format!("PUT {}/{id}", kind.endpoint()))?;
        let mut state = self.state();
        let slot = state
            .resources
            .get_mut(&kind)
            .and_then(|all| all.iter_mut().find(|r| r.get("id").and_then(Value::as_i64) == Some(id)))
            .ok_or_else(|| Error::api(404, Value::Null))?;
        let mut resource = payload.clone();
        Self::merge_secrets(slot, &mut resource);
        resource["id"] = id.into();
        *slot = resource;
        Ok(Self::masked(slot))
    }

    fn delete(&self, kind: ResourceKind, id: i64) -> Result<()> {
        require(self.dialect, kind)?;
        self.record(format!("DELETE {}/{id}", kind.endpoint()))?;
        let mut state = self.state();
        let all = state.resources.entry(kind).or_default();
        let before = all.len();
        all.retain(|r| r.get("id").and_then(Value::as_i64) != Some(id));
        if all.len() == before {
            return Err(Error::api(404, Value::Null));
        }
        Ok(())
    }

    fn tags(&self) -> Result<Vec<Tag>> {
        self.record("GET tag".to_string())?;
        Ok(self.state().tags.clone())
    }

    fn create_tag(&self, label: &str) -> Result<Tag> {
        self.record("POST tag".to_string())?;
        let mut state = self.state();
        let tag = Tag {
            id: state.next_id,
            label: label.to_string(),
        };
        state.next_id += 1;
        state.tags.push(tag.clone());
        Ok(tag)
    }

    fn system_status(&self) -> Result<SystemStatus> {
        self.record("GET system/status".to_string())?;
        Ok(SystemStatus {
            app_name: self.dialect.name().to_string(),
            instance_name: "mock".to_string(),
            version: "0.0.0".to_string(),
        })
    }
}
