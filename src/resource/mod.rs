//! Resource adapters for the *arr configuration API
//!
//! Every kind is served by one generic [`ArrAdapter`]. What differs between
//! kinds lives in a small [`KindSpec`]:
//! - wire shape (provider `fields` array or flat properties)
//! - identity properties and tag property
//! - settable scalars and how they map to the wire
//! - lookups to load and references to resolve before diffing

pub mod custom_format;
pub mod download_client;
pub mod metadata_profile;
pub mod quality_profile;
pub mod remote_path_mapping;
pub mod root_folder;
pub mod shape;

use anyhow::{Context, Result};
use arrclient::{Backend, Dialect, ResourceKind, SchemaShape};
use declarative::{
    BoxedAdapter, DesiredResource, ResourceAdapter, ScalarSpec, SchemaTemplate, ServerCache,
    ServerResource, Tag, TagRef, TagStore, is_secret_field, json_eq,
};
use serde_json::{Map, Value};

/// Wire layout of a kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `implementation` plus a `fields: [{name, value}]` array
    Provider,
    /// Top-level properties only
    Flat,
}

/// Per-kind behaviour plugged into [`ArrAdapter`]
pub trait KindSpec: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn shape(&self) -> Shape {
        Shape::Flat
    }

    fn scalars(&self, _dialect: Dialect) -> &'static [ScalarSpec] {
        &[]
    }

    /// Wire property holding tag ids, if the kind is taggable
    fn tags_key(&self, _dialect: Dialect) -> Option<&'static str> {
        None
    }

    /// Wire properties that make up the identity
    fn identity_keys(&self) -> &'static [&'static str] {
        &["name"]
    }

    /// `(name, implementation)` of a wire resource
    fn identity(&self, wire: &Value) -> (String, String) {
        (shape::text(wire, "name"), shape::text(wire, "implementation"))
    }

    fn write_identity(&self, _dialect: Dialect, desired: &DesiredResource, payload: &mut Map<String, Value>) {
        payload.insert("name".into(), desired.name.clone().into());
        if self.shape() == Shape::Provider {
            payload
                .entry("implementation")
                .or_insert_with(|| desired.implementation.clone().into());
        }
    }

    /// What the config calls the implementation, when the kind has one
    fn implementation_label(&self) -> Option<&'static str> {
        match self.shape() {
            Shape::Provider => Some("type"),
            Shape::Flat => None,
        }
    }

    /// Schema templates for this kind
    fn templates(&self, backend: &dyn Backend) -> Result<Vec<SchemaTemplate>> {
        let kind = self.kind();
        match kind.schema_shape() {
            SchemaShape::None => Ok(Vec::new()),
            SchemaShape::Providers => Ok(shape::provider_templates(backend.schema(kind)?)),
            SchemaShape::Single => {
                let mut reserved = vec!["id"];
                reserved.extend_from_slice(self.identity_keys());
                Ok(backend
                    .schema(kind)?
                    .into_iter()
                    .next()
                    .map(|raw| vec![shape::flat_template(raw, &reserved)])
                    .unwrap_or_default())
            }
        }
    }

    /// Load whatever `normalize` and `write_scalar` look up later
    fn prepare(&self, _backend: &dyn Backend, _cache: &mut ServerCache) -> Result<()> {
        Ok(())
    }

    /// Resolve references and dialect-neutral names
    fn normalize(&self, _dialect: Dialect, desired: DesiredResource, _cache: &ServerCache) -> Result<DesiredResource> {
        Ok(desired)
    }

    fn read_scalar(&self, _dialect: Dialect, name: &str, wire: &Value) -> Value {
        wire.get(name).cloned().unwrap_or(Value::Null)
    }

    fn write_scalar(
        &self,
        _dialect: Dialect,
        name: &str,
        value: &Value,
        payload: &mut Map<String, Value>,
        _cache: &ServerCache,
    ) -> Result<()> {
        payload.insert(name.to_string(), value.clone());
        Ok(())
    }

    fn scalar_equal(&self, _name: &str, desired: &Value, server: &Value) -> bool {
        json_eq(desired, server)
    }
}

/// [`ResourceAdapter`] over a [`Backend`] for one kind
pub struct ArrAdapter<'a, K> {
    backend: &'a dyn Backend,
    dialect: Dialect,
    spec: K,
}

impl<'a, K: KindSpec> ArrAdapter<'a, K> {
    pub fn new(backend: &'a dyn Backend, spec: K) -> Self {
        Self {
            backend,
            dialect: backend.dialect(),
            spec,
        }
    }

    /// Properties that are never exposed as flat fields
    fn reserved(&self) -> Vec<&'static str> {
        let mut reserved = vec!["id"];
        reserved.extend_from_slice(self.spec.identity_keys());
        reserved.extend(self.spec.tags_key(self.dialect));
        reserved
    }

    fn to_server(&self, wire: Value) -> Result<ServerResource> {
        let kind = self.spec.kind();
        let id = wire
            .get("id")
            .and_then(Value::as_i64)
            .with_context(|| format!("{kind} without an id in server response"))?;
        let (name, implementation) = self.spec.identity(&wire);
        let fields = match self.spec.shape() {
            Shape::Provider => shape::provider_fields(&wire),
            Shape::Flat => shape::flat_fields(&wire, &self.reserved()),
        };
        let tags = self
            .spec
            .tags_key(self.dialect)
            .map(|key| shape::tag_ids(&wire, key))
            .unwrap_or_default();
        let scalars = self
            .spec
            .scalars(self.dialect)
            .iter()
            .map(|s| (s.name.to_string(), self.spec.read_scalar(self.dialect, s.name, &wire)))
            .collect();

        Ok(ServerResource {
            id,
            name,
            implementation,
            fields,
            tags,
            scalars,
            raw: wire,
        })
    }

    /// Starting point of a create or full update
    ///
    /// Provider kinds start over from the implementation's template, keeping
    /// the existing top-level properties and any masked secret the desired
    /// resource does not name. Flat kinds keep the existing properties and
    /// take whatever else the template defines.
    fn base_payload(
        &self,
        desired: &DesiredResource,
        cache: &ServerCache,
        existing: Option<&ServerResource>,
        named: &Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let kind = self.spec.kind();
        match self.spec.shape() {
            Shape::Provider => {
                let template = cache
                    .template(kind.label(), &desired.implementation)
                    .with_context(|| format!("no {kind} schema for type '{}'", desired.implementation))?;
                let mut payload = shape::into_object(template.raw.clone());
                payload.remove("id");
                payload.remove("presets");

                if let Some(server) = existing {
                    if let Value::Object(current) = &server.raw {
                        for (key, value) in current {
                            if key != "fields" {
                                payload.insert(key.clone(), value.clone());
                            }
                        }
                    }
                    for field in &server.fields {
                        if is_secret_field(&field.name) && !named.contains_key(&field.name) {
                            shape::set_provider_field(&mut payload, &field.name, field.value.clone());
                        }
                    }
                }
                Ok(payload)
            }
            Shape::Flat => {
                let mut payload = existing
                    .map(|s| shape::into_object(s.raw.clone()))
                    .unwrap_or_default();
                if let Some(template) = cache.template(kind.label(), "") {
                    for (key, value) in shape::into_object(template.raw.clone()) {
                        if key != "id" {
                            payload.entry(key).or_insert(value);
                        }
                    }
                }
                Ok(payload)
            }
        }
    }

    fn call<T>(&self, result: arrclient::Result<T>) -> Result<T> {
        result.map_err(|e| {
            if let Some(body) = e.payload() {
                log::debug!("{} response body: {body}", self.spec.kind());
            }
            anyhow::Error::new(e)
        })
    }
}

impl<K: KindSpec> ResourceAdapter for ArrAdapter<'_, K> {
    fn kind(&self) -> &'static str {
        self.spec.kind().label()
    }

    fn scalars(&self) -> &[ScalarSpec] {
        self.spec.scalars(self.dialect)
    }

    fn uses_tags(&self) -> bool {
        self.spec.tags_key(self.dialect).is_some()
    }

    fn fetch_server_state(&self) -> Result<Vec<ServerResource>> {
        let wire = self.call(self.backend.list(self.spec.kind()))?;
        wire.into_iter().map(|w| self.to_server(w)).collect()
    }

    fn fetch_schema(&self) -> Result<Vec<SchemaTemplate>> {
        self.spec.templates(self.backend)
    }

    fn prepare(&self, cache: &mut ServerCache) -> Result<()> {
        self.spec.prepare(self.backend, cache)
    }

    fn normalize_desired(&self, desired: DesiredResource, cache: &ServerCache) -> Result<DesiredResource> {
        match self.spec.implementation_label() {
            Some(label) if desired.implementation.trim().is_empty() => {
                anyhow::bail!("{label} is required");
            }
            None if !desired.implementation.is_empty() => {
                anyhow::bail!(
                    "{} has no type, remove '{}'",
                    self.spec.kind(),
                    desired.implementation
                );
            }
            _ => {}
        }
        self.spec.normalize(self.dialect, desired, cache)
    }

    fn build_payload(
        &self,
        desired: &DesiredResource,
        cache: &ServerCache,
        existing: Option<&ServerResource>,
        partial: bool,
    ) -> Result<Value> {
        let kind = self.spec.kind();
        let named = desired
            .fields
            .as_ref()
            .map(shape::wire_fields)
            .unwrap_or_default();

        let mut payload = match existing {
            Some(server) if partial => shape::into_object(server.raw.clone()),
            _ => self.base_payload(desired, cache, existing, &named)?,
        };

        match self.spec.shape() {
            Shape::Provider => {
                for (name, value) in &named {
                    if !shape::set_provider_field(&mut payload, name, value.clone()) {
                        log::warn!("{kind} '{}': ignoring unknown field '{name}'", desired.name);
                    }
                }
            }
            Shape::Flat => {
                for (name, value) in named {
                    payload.insert(name, value);
                }
            }
        }

        for (name, value) in &desired.scalars {
            self.spec
                .write_scalar(self.dialect, name, value, &mut payload, cache)?;
        }

        if let (Some(key), Some(tags)) = (self.spec.tags_key(self.dialect), &desired.tags) {
            if let Some(TagRef::Name(label)) = tags.iter().find(|t| matches!(t, TagRef::Name(_))) {
                anyhow::bail!("tag '{label}' was never resolved to an id");
            }
            payload.insert(key.to_string(), desired.tag_ids().into());
        }

        self.spec.write_identity(self.dialect, desired, &mut payload);
        if let Some(server) = existing {
            payload.insert("id".into(), server.id.into());
        }
        Ok(Value::Object(payload))
    }

    fn scalar_equal(&self, name: &str, desired: &Value, server: &Value) -> bool {
        self.spec.scalar_equal(name, desired, server)
    }

    fn create(&self, payload: &Value) -> Result<ServerResource> {
        let created = self.call(self.backend.create(self.spec.kind(), payload))?;
        self.to_server(created)
    }

    fn update(&self, id: i64, payload: &Value) -> Result<ServerResource> {
        let updated = self.call(self.backend.update(self.spec.kind(), id, payload))?;
        self.to_server(updated)
    }

    fn delete(&self, id: i64) -> Result<()> {
        self.call(self.backend.delete(self.spec.kind(), id))
    }
}

/// Adapter for `kind` on `backend`
pub fn adapter_for(kind: ResourceKind, backend: &dyn Backend) -> BoxedAdapter<'_> {
    match kind {
        ResourceKind::DownloadClient => {
            Box::new(ArrAdapter::new(backend, download_client::DownloadClients))
        }
        ResourceKind::CustomFormat => Box::new(ArrAdapter::new(backend, custom_format::CustomFormats)),
        ResourceKind::QualityProfile => {
            Box::new(ArrAdapter::new(backend, quality_profile::QualityProfiles))
        }
        ResourceKind::MetadataProfile => {
            Box::new(ArrAdapter::new(backend, metadata_profile::MetadataProfiles))
        }
        ResourceKind::RootFolder => Box::new(ArrAdapter::new(backend, root_folder::RootFolders)),
        ResourceKind::RemotePathMapping => {
            Box::new(ArrAdapter::new(backend, remote_path_mapping::RemotePathMappings))
        }
    }
}

/// Merge `kind`'s name → id pairs into the cache lookup named after it
///
/// Existing entries, including dry-run placeholders, are kept unless the
/// server reports the same name.
pub fn load_lookup(backend: &dyn Backend, cache: &mut ServerCache, kind: ResourceKind) -> Result<()> {
    for resource in backend.list(kind)? {
        let name = shape::text(&resource, "name");
        if let Some(id) = resource.get("id").and_then(Value::as_i64) {
            cache.insert_lookup(kind.label(), &name, id);
        }
    }
    Ok(())
}

/// Resolve a scalar naming another resource to that resource's id
///
/// Integers pass through; names go through the cache lookup for `target`.
pub fn resolve_reference(
    cache: &ServerCache,
    target: ResourceKind,
    scalar: &str,
    value: &Value,
) -> Result<Value> {
    match value {
        Value::Number(_) if value.as_i64().is_some() => Ok(value.clone()),
        Value::String(name) => cache
            .lookup(target.label(), name)
            .map(Value::from)
            .with_context(|| format!("'{scalar}' refers to unknown {target} '{name}'")),
        other => anyhow::bail!("'{scalar}' must be a {target} name or id, got {other}"),
    }
}

/// [`TagStore`] over a backend's tag endpoint
pub struct BackendTags<'a>(pub &'a dyn Backend);

impl TagStore for BackendTags<'_> {
    fn list_tags(&self) -> Result<Vec<Tag>> {
        Ok(self
            .0
            .tags()?
            .into_iter()
            .map(|t| Tag {
                id: t.id,
                label: t.label,
            })
            .collect())
    }

    fn create_tag(&self, label: &str) -> Result<Tag> {
        let tag = self.0.create_tag(label)?;
        Ok(Tag {
            id: tag.id,
            label: tag.label,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrclient::MockBackend;
    use declarative::{DeletePolicy, Engine, SyncOptions};
    use serde_json::json;

    #[test]
    fn test_backend_tags() {
        let backend = MockBackend::new(Dialect::Sonarr);
        backend.add_tag(4, "4k");
        let store = BackendTags(&backend);

        let tags = store.list_tags().unwrap();
        assert_eq!(tags, vec![Tag { id: 4, label: "4k".into() }]);

        let created = store.create_tag("anime").unwrap();
        assert_eq!(created.label, "anime");
        assert_ne!(created.id, 4);
    }

    #[test]
    fn test_resolve_reference() {
        let mut cache = ServerCache::new();
        cache.insert_lookup("quality profile", "HD", 4);
        let kind = ResourceKind::QualityProfile;

        assert_eq!(resolve_reference(&cache, kind, "p", &json!("hd")).unwrap(), json!(4));
        assert_eq!(resolve_reference(&cache, kind, "p", &json!(9)).unwrap(), json!(9));
        let err = resolve_reference(&cache, kind, "p", &json!("UHD")).unwrap_err();
        assert!(err.to_string().contains("unknown quality profile 'UHD'"));
        assert!(resolve_reference(&cache, kind, "p", &json!(true)).is_err());
    }

    #[test]
    fn test_load_lookup_keeps_placeholders() {
        let backend = MockBackend::new(Dialect::Radarr);
        let id = backend.add(ResourceKind::CustomFormat, json!({"name": "x265"}));
        let mut cache = ServerCache::new();
        cache.insert_lookup("custom format", "Planned", -1);

        load_lookup(&backend, &mut cache, ResourceKind::CustomFormat).unwrap();
        assert_eq!(cache.lookup("custom format", "X265"), Some(id));
        assert_eq!(cache.lookup("custom format", "planned"), Some(-1));
    }

    #[test]
    fn test_server_resource_from_wire() {
        let backend = MockBackend::new(Dialect::Lidarr);
        backend.add(
            ResourceKind::RootFolder,
            json!({"path": "/music", "name": "Music", "defaultQualityProfileId": 2, "defaultTags": [5]}),
        );
        let adapter = adapter_for(ResourceKind::RootFolder, &backend);
        let server = adapter.fetch_server_state().unwrap();

        assert_eq!(server.len(), 1);
        assert_eq!(server[0].name, "/music");
        assert_eq!(server[0].implementation, "");
        assert_eq!(server[0].tags, vec![5]);
        assert_eq!(server[0].scalars["displayName"], json!("Music"));
        assert_eq!(server[0].scalars["defaultQualityProfile"], json!(2));
        assert!(!server[0].has_field("path"));
    }

    #[test]
    fn test_adapter_failure_surfaces_backend_message() {
        let backend = MockBackend::new(Dialect::Sonarr);
        backend.fail(
            "DELETE downloadclient/1",
            400,
            json!({"message": "Download client is in use"}),
        );
        let adapter = adapter_for(ResourceKind::DownloadClient, &backend);
        let err = adapter.delete(1).unwrap_err();
        assert!(format!("{err:#}").contains("in use"));
    }

    #[test]
    fn test_engine_over_mock_is_idempotent() {
        let backend = MockBackend::new(Dialect::Sonarr);
        let tags = BackendTags(&backend);
        let engine = Engine::new(
            &tags,
            SyncOptions {
                delete_unmanaged: DeletePolicy::enabled(),
                ..Default::default()
            },
        );
        let adapter = adapter_for(ResourceKind::RemotePathMapping, &backend);
        let desired = vec![
            DesiredResource::new("/downloads/", "qbittorrent")
                .with_scalar("localPath", "/data/downloads/"),
        ];

        let mut cache = ServerCache::new();
        let first = engine
            .sync_resources(adapter.as_ref(), desired.clone(), &mut cache)
            .unwrap();
        assert_eq!(first.added, 1);

        let mutations = backend.mutations();
        let mut cache = ServerCache::new();
        let second = engine
            .sync_resources(adapter.as_ref(), desired, &mut cache)
            .unwrap();
        assert_eq!(second.unchanged, 1);
        assert_eq!(second.total_changes(), 0);
        assert_eq!(backend.mutations(), mutations);
    }
}
