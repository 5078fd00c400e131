//! Download clients
//!
//! Provider-shaped: the `implementation` picks a schema template whose
//! `fields` hold host, credentials and the category settings. The category
//! and priority fields are named after the media type (`tvCategory`,
//! `musicCategory`, ...); configs may use the neutral `category`,
//! `recent_priority` and `older_priority` instead.

use super::{KindSpec, Shape};
use anyhow::Result;
use arrclient::{Dialect, ResourceKind};
use declarative::{DesiredResource, ScalarSpec, ServerCache, camel_case};
use serde_json::Map;

const SCALARS: &[ScalarSpec] = &[
    ScalarSpec::bool("enable"),
    ScalarSpec::ranged("priority", 1, 50),
    ScalarSpec::bool("removeCompletedDownloads"),
    ScalarSpec::bool("removeFailedDownloads"),
];

pub struct DownloadClients;

impl KindSpec for DownloadClients {
    fn kind(&self) -> ResourceKind {
        ResourceKind::DownloadClient
    }

    fn shape(&self) -> Shape {
        Shape::Provider
    }

    fn scalars(&self, _dialect: Dialect) -> &'static [ScalarSpec] {
        SCALARS
    }

    fn tags_key(&self, _dialect: Dialect) -> Option<&'static str> {
        Some("tags")
    }

    fn normalize(&self, dialect: Dialect, mut desired: DesiredResource, cache: &ServerCache) -> Result<DesiredResource> {
        let Some(fields) = desired.fields.take() else {
            return Ok(desired);
        };
        let template = cache.template(self.kind().label(), &desired.implementation);
        let neutral = [
            ("category", dialect.category_field()),
            ("recentPriority", dialect.recent_priority_field()),
            ("olderPriority", dialect.older_priority_field()),
        ];

        let mut out = Map::new();
        let mut renames = Vec::new();
        for (key, value) in fields {
            let camel = camel_case(&key);
            let target = neutral
                .iter()
                .find(|(name, _)| *name == camel)
                .map(|(_, target)| *target)
                .filter(|_| !template.is_some_and(|t| t.field(&camel).is_some()));
            match target {
                Some(target) => renames.push((key, target, value)),
                None => {
                    out.insert(key, value);
                }
            }
        }

        for (key, target, value) in renames {
            if out.keys().any(|k| camel_case(k) == target) {
                log::warn!(
                    "download client '{}': '{key}' ignored, '{target}' is set explicitly",
                    desired.name
                );
            } else {
                log::debug!("download client '{}': {key} -> {target}", desired.name);
                out.insert(target.to_string(), value);
            }
        }
        desired.fields = Some(out);
        Ok(desired)
    }
}
