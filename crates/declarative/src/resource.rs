//! Resource adapter trait
//!
//! One adapter exists per resource kind and backend dialect. It knows how to
//! read the backend's current state and schema, how to turn a desired
//! resource into a wire payload, and how to call create/update/delete.
//! Everything else (validation, diffing, apply ordering) is generic and
//! lives in the engine.

use crate::context::ServerCache;
use crate::equality::{json_eq, resources_equal};
use crate::types::{DesiredResource, SchemaTemplate, ScalarSpec, ServerResource};
use anyhow::Result;
use serde_json::Value;

/// Per-kind adapter between the engine and a backend
pub trait ResourceAdapter: Send + Sync {
    /// Resource kind label, also the cache key for its schema
    ///
    /// Examples: "download client", "quality profile"
    fn kind(&self) -> &'static str;

    /// Top-level scalars this kind accepts, by wire name
    fn scalars(&self) -> &[ScalarSpec] {
        &[]
    }

    /// Whether this kind carries tags
    fn uses_tags(&self) -> bool {
        false
    }

    /// Read the current server state
    fn fetch_server_state(&self) -> Result<Vec<ServerResource>>;

    /// Read the schema templates
    ///
    /// Called at most once per run; the engine memoizes the result in the
    /// [`ServerCache`] under [`Self::kind`]. Kinds without a schema return
    /// an empty list.
    fn fetch_schema(&self) -> Result<Vec<SchemaTemplate>>;

    /// Load any lookups `normalize_desired` needs
    fn prepare(&self, _cache: &mut ServerCache) -> Result<()> {
        Ok(())
    }

    /// Bring a desired resource into the canonical form used for comparison
    /// and payload building
    ///
    /// Scalar keys are already camelCase when this is called. Errors reject
    /// the resource as invalid.
    fn normalize_desired(
        &self,
        desired: DesiredResource,
        _cache: &ServerCache,
    ) -> Result<DesiredResource> {
        Ok(desired)
    }

    /// Build a wire payload
    ///
    /// With `existing` and `partial`, only what `desired` names is
    /// overwritten on a copy of the existing resource. Otherwise the payload
    /// starts from the schema template. Tag labels must already be resolved.
    fn build_payload(
        &self,
        desired: &DesiredResource,
        cache: &ServerCache,
        existing: Option<&ServerResource>,
        partial: bool,
    ) -> Result<Value>;

    /// Compare one desired scalar with the server's value
    fn scalar_equal(&self, _name: &str, desired: &Value, server: &Value) -> bool {
        json_eq(desired, server)
    }

    /// Whether the server already matches what `desired` asks for
    fn equal(
        &self,
        desired: &DesiredResource,
        server: &ServerResource,
        _cache: &ServerCache,
        secrets_authoritative: bool,
    ) -> bool {
        resources_equal(desired, server, secrets_authoritative, |name, d, s| {
            self.scalar_equal(name, d, s)
        })
    }

    /// Create a resource
    fn create(&self, payload: &Value) -> Result<ServerResource>;

    /// Update a resource by id
    fn update(&self, id: i64, payload: &Value) -> Result<ServerResource>;

    /// Delete a resource by id
    fn delete(&self, id: i64) -> Result<()>;
}

/// A boxed adapter for type-erased storage
pub type BoxedAdapter<'a> = Box<dyn ResourceAdapter + 'a>;
