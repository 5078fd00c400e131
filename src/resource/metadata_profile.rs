//! Metadata profiles (Lidarr, Readarr)
//!
//! Plain flat resources: everything but the name is a field, e.g.
//! `primaryAlbumTypes` on Lidarr or `minPopularity` on Readarr.

use super::KindSpec;
use arrclient::ResourceKind;

pub struct MetadataProfiles;

impl KindSpec for MetadataProfiles {
    fn kind(&self) -> ResourceKind {
        ResourceKind::MetadataProfile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{BackendTags, adapter_for};
    use arrclient::{Dialect, MockBackend};
    use declarative::{DesiredResource, Engine, ServerCache, SyncOptions};
    use serde_json::json;

    #[test]
    fn test_fields_are_top_level_properties() {
        let backend = MockBackend::new(Dialect::Readarr);
        backend.set_schema(
            ResourceKind::MetadataProfile,
            vec![json!({"name": "", "minPopularity": 0, "skipMissingDate": false, "allowedLanguages": ""})],
        );
        backend.add(
            ResourceKind::MetadataProfile,
            json!({"name": "Standard", "minPopularity": 350, "skipMissingDate": true, "allowedLanguages": "eng"}),
        );

        let tags = BackendTags(&backend);
        let engine = Engine::new(&tags, SyncOptions::default());
        let adapter = adapter_for(ResourceKind::MetadataProfile, &backend);
        let desired = vec![
            DesiredResource::new("Standard", "").with_field("min_popularity", 10),
            DesiredResource::new("Strict", "").with_field("skip_missing_date", true),
        ];
        let mut cache = ServerCache::new();
        let summary = engine
            .sync_resources(adapter.as_ref(), desired, &mut cache)
            .unwrap();
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.added, 1);

        let stored = backend.stored(ResourceKind::MetadataProfile);
        // full update keeps properties the config leaves out
        assert_eq!(stored[0]["minPopularity"], json!(10));
        assert_eq!(stored[0]["allowedLanguages"], json!("eng"));
        assert_eq!(stored[1]["name"], json!("Strict"));
        assert_eq!(stored[1]["skipMissingDate"], json!(true));
        assert_eq!(stored[1]["minPopularity"], json!(0));
        assert!(stored[1].get("skip_missing_date").is_none());
    }

    #[test]
    fn test_type_not_allowed() {
        let backend = MockBackend::new(Dialect::Lidarr);
        let tags = BackendTags(&backend);
        let engine = Engine::new(&tags, SyncOptions::default());
        let adapter = adapter_for(ResourceKind::MetadataProfile, &backend);
        let mut cache = ServerCache::new();
        let summary = engine
            .sync_resources(
                adapter.as_ref(),
                vec![DesiredResource::new("Standard", "Typed")],
                &mut cache,
            )
            .unwrap();
        assert_eq!(summary.invalid, 1);
    }
}
