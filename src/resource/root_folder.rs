//! Root folders
//!
//! Identified by `path`. Sonarr, Radarr and Whisparr root folders carry
//! nothing else that can be changed. Lidarr and Readarr add a display name,
//! default profiles, a default monitor option and default tags; profiles
//! may be given by name.

use super::{KindSpec, load_lookup, resolve_reference, shape};
use anyhow::Result;
use arrclient::{Backend, Dialect, ResourceKind};
use declarative::{DesiredResource, ScalarSpec, ServerCache};
use serde_json::{Map, Value};

const EXTRAS: &[ScalarSpec] = &[
    ScalarSpec::text("displayName"),
    ScalarSpec::any("defaultQualityProfile"),
    ScalarSpec::any("defaultMetadataProfile"),
    ScalarSpec::text("defaultMonitorOption"),
];

/// Config scalar → wire property
const WIRE_NAMES: &[(&str, &str)] = &[
    ("displayName", "name"),
    ("defaultQualityProfile", "defaultQualityProfileId"),
    ("defaultMetadataProfile", "defaultMetadataProfileId"),
];

fn wire_name(scalar: &str) -> &str {
    WIRE_NAMES
        .iter()
        .find(|(s, _)| *s == scalar)
        .map_or(scalar, |(_, w)| w)
}

pub struct RootFolders;

impl KindSpec for RootFolders {
    fn kind(&self) -> ResourceKind {
        ResourceKind::RootFolder
    }

    fn scalars(&self, dialect: Dialect) -> &'static [ScalarSpec] {
        if dialect.has_root_folder_extras() {
            EXTRAS
        } else {
            &[]
        }
    }

    fn tags_key(&self, dialect: Dialect) -> Option<&'static str> {
        dialect.has_root_folder_extras().then_some("defaultTags")
    }

    fn identity_keys(&self) -> &'static [&'static str] {
        &["path"]
    }

    fn identity(&self, wire: &Value) -> (String, String) {
        (shape::text(wire, "path"), String::new())
    }

    fn write_identity(&self, dialect: Dialect, desired: &DesiredResource, payload: &mut Map<String, Value>) {
        payload.insert("path".into(), desired.name.clone().into());
        if dialect.has_root_folder_extras() {
            let named = payload
                .get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| !n.is_empty());
            if !named {
                let leaf = desired
                    .name
                    .trim_end_matches(['/', '\\'])
                    .rsplit(['/', '\\'])
                    .next()
                    .unwrap_or_default();
                payload.insert("name".into(), leaf.into());
            }
        }
    }

    fn prepare(&self, backend: &dyn Backend, cache: &mut ServerCache) -> Result<()> {
        if backend.dialect().has_root_folder_extras() {
            load_lookup(backend, cache, ResourceKind::QualityProfile)?;
            load_lookup(backend, cache, ResourceKind::MetadataProfile)?;
        }
        Ok(())
    }

    fn normalize(&self, dialect: Dialect, mut desired: DesiredResource, cache: &ServerCache) -> Result<DesiredResource> {
        if !dialect.has_root_folder_extras() {
            if desired.has_fields() {
                anyhow::bail!("{dialect} root folders have no settings besides the path");
            }
            return Ok(desired);
        }

        for (scalar, target) in [
            ("defaultQualityProfile", ResourceKind::QualityProfile),
            ("defaultMetadataProfile", ResourceKind::MetadataProfile),
        ] {
            if let Some(value) = desired.scalars.get(scalar) {
                let id = resolve_reference(cache, target, scalar, value)?;
                desired.scalars.insert(scalar.to_string(), id);
            }
        }
        Ok(desired)
    }

    fn read_scalar(&self, _dialect: Dialect, name: &str, wire: &Value) -> Value {
        wire.get(wire_name(name)).cloned().unwrap_or(Value::Null)
    }

    fn write_scalar(
        &self,
        _dialect: Dialect,
        name: &str,
        value: &Value,
        payload: &mut Map<String, Value>,
        _cache: &ServerCache,
    ) -> Result<()> {
        payload.insert(wire_name(name).to_string(), value.clone());
        Ok(())
    }
}
