//! Quality profiles
//!
//! Flat resources. Two scalars refer to other things by name:
//! - `cutoff` names a quality or quality group of the profile's `items`
//!   and is sent as its id
//! - `formatScores` maps custom-format names to scores and is sent inside
//!   `formatItems`; formats it does not name keep their score

use super::{KindSpec, load_lookup, shape};
use anyhow::{Context, Result};
use arrclient::{Backend, Dialect, ResourceKind};
use declarative::{DesiredResource, ScalarSpec, ServerCache, json_eq};
use serde_json::{Map, Value, json};

const SCALARS: &[ScalarSpec] = &[
    ScalarSpec::bool("upgradeAllowed"),
    ScalarSpec::any("cutoff"),
    ScalarSpec::integer("minFormatScore"),
    ScalarSpec::integer("cutoffFormatScore"),
    ScalarSpec::integer("minUpgradeFormatScore"),
    ScalarSpec::any("formatScores"),
];

/// Lookup of quality names to ids, shared by every profile
const QUALITIES: &str = "quality";

/// Lookup of quality and group names within one existing profile
fn profile_lookup(profile: &str) -> String {
    format!("quality profile items/{}", profile.to_lowercase())
}

pub struct QualityProfiles;

impl KindSpec for QualityProfiles {
    fn kind(&self) -> ResourceKind {
        ResourceKind::QualityProfile
    }

    fn scalars(&self, _dialect: Dialect) -> &'static [ScalarSpec] {
        SCALARS
    }

    fn prepare(&self, backend: &dyn Backend, cache: &mut ServerCache) -> Result<()> {
        load_lookup(backend, cache, ResourceKind::CustomFormat)?;

        let template_items = cache
            .template(self.kind().label(), "")
            .and_then(|t| t.raw.get("items"))
            .map(item_ids)
            .unwrap_or_default();
        cache.set_lookup(QUALITIES, template_items);

        for profile in backend.list(self.kind())? {
            let name = shape::text(&profile, "name");
            let ids = profile.get("items").map(item_ids).unwrap_or_default();
            cache.set_lookup(&profile_lookup(&name), ids);
        }
        Ok(())
    }

    fn normalize(&self, _dialect: Dialect, mut desired: DesiredResource, cache: &ServerCache) -> Result<DesiredResource> {
        if let Some(cutoff) = desired.scalars.get("cutoff") {
            let resolved = match cutoff {
                Value::Number(_) if cutoff.as_i64().is_some() => cutoff.clone(),
                Value::String(name) => {
                    let own_items = desired
                        .fields
                        .as_ref()
                        .and_then(|f| f.get("items"))
                        .map(item_ids);
                    let id = match own_items {
                        Some(ids) => ids
                            .into_iter()
                            .find(|(n, _)| n.eq_ignore_ascii_case(name))
                            .map(|(_, id)| id),
                        None => cache
                            .lookup(&profile_lookup(&desired.name), name)
                            .or_else(|| cache.lookup(QUALITIES, name)),
                    };
                    Value::from(
                        id.with_context(|| format!("'cutoff' refers to unknown quality '{name}'"))?,
                    )
                }
                other => anyhow::bail!("'cutoff' must be a quality name or id, got {other}"),
            };
            desired.scalars.insert("cutoff".into(), resolved);
        }

        if let Some(scores) = desired.scalars.get("formatScores") {
            let table = scores
                .as_object()
                .context("'formatScores' must be a table of custom format names to scores")?;
            for (name, score) in table {
                if score.as_i64().is_none() {
                    anyhow::bail!("score for '{name}' must be an integer, got {score}");
                }
                if cache.lookup("custom format", name).is_none() {
                    anyhow::bail!("'formatScores' refers to unknown custom format '{name}'");
                }
            }
        }
        Ok(desired)
    }

    fn read_scalar(&self, _dialect: Dialect, name: &str, wire: &Value) -> Value {
        match name {
            "formatScores" => {
                let scores: Map<String, Value> = wire
                    .get("formatItems")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .map(|item| (shape::text(item, "name"), item["score"].clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                Value::Object(scores)
            }
            _ => wire.get(name).cloned().unwrap_or(Value::Null),
        }
    }

    fn write_scalar(
        &self,
        _dialect: Dialect,
        name: &str,
        value: &Value,
        payload: &mut Map<String, Value>,
        cache: &ServerCache,
    ) -> Result<()> {
        if name != "formatScores" {
            payload.insert(name.to_string(), value.clone());
            return Ok(());
        }

        let mut items = match payload.remove("formatItems") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        for (format, score) in value.as_object().into_iter().flatten() {
            let id = cache
                .lookup("custom format", format)
                .with_context(|| format!("unknown custom format '{format}'"))?;
            match items
                .iter_mut()
                .find(|i| i.get("format").and_then(Value::as_i64) == Some(id))
            {
                Some(item) => item["score"] = score.clone(),
                None => items.push(json!({"format": id, "name": format, "score": score})),
            }
        }
        payload.insert("formatItems".into(), Value::Array(items));
        Ok(())
    }

    fn scalar_equal(&self, name: &str, desired: &Value, server: &Value) -> bool {
        match name {
            "formatScores" => {
                let Some(wanted) = desired.as_object() else {
                    return false;
                };
                wanted.iter().all(|(format, score)| {
                    let current = server
                        .as_object()
                        .and_then(|s| {
                            s.iter()
                                .find(|(n, _)| n.eq_ignore_ascii_case(format))
                                .map(|(_, v)| v)
                        })
                        .cloned()
                        .unwrap_or(json!(0));
                    json_eq(score, &current)
                })
            }
            _ => json_eq(desired, server),
        }
    }
}

/// Name → id pairs of every quality and group in an `items` tree
fn item_ids(items: &Value) -> Vec<(String, i64)> {
    let mut out = Vec::new();
    collect_items(items, &mut out);
    out
}

fn collect_items(items: &Value, out: &mut Vec<(String, i64)>) {
    for item in items.as_array().into_iter().flatten() {
        if let Some(quality) = item.get("quality") {
            if let Some(id) = quality.get("id").and_then(Value::as_i64) {
                out.push((shape::text(quality, "name"), id));
            }
        } else if let Some(id) = item.get("id").and_then(Value::as_i64) {
            out.push((shape::text(item, "name"), id));
        }
        if let Some(children) = item.get("items") {
            collect_items(children, out);
        }
    }
}
