//! Validation and tag pre-resolution
//!
//! Every desired resource is checked before anything is diffed. All
//! violations across the batch are collected; invalid resources are dropped
//! from the run while the valid ones carry on.

use crate::context::{ServerCache, TagStore};
use crate::diff::Diff;
use crate::error::{SyncError, ValidationError};
use crate::normalize::{camel_case, normalize_scalars};
use crate::resource::ResourceAdapter;
use crate::tags;
use crate::types::{CompositeKey, DesiredResource, ServerResource, Tag, TagRef};
use std::collections::HashSet;

/// Everything computed for one resource kind before apply
#[derive(Debug, Default)]
pub struct Plan {
    pub kind: &'static str,
    pub diff: Diff,
    /// Desired resources excluded by validation
    pub rejected: Vec<ValidationError>,
    /// Non-fatal findings, e.g. possibly-required fields left unset
    pub warnings: Vec<String>,
    /// Tags created (or, in dry-run, that would be created)
    pub created_tags: Vec<Tag>,
}

impl Plan {
    pub fn empty(kind: &'static str) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}

/// Result of validating a batch
#[derive(Debug, Default)]
pub struct Validated {
    pub valid: Vec<DesiredResource>,
    pub rejected: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

/// Validate a batch of desired resources
///
/// Scalar keys are camelCased and the adapter's normalization applied
/// before any check runs. The first occurrence of a composite key wins;
/// later duplicates are rejected.
pub fn validate(
    adapter: &dyn ResourceAdapter,
    desired: Vec<DesiredResource>,
    server: &[ServerResource],
    cache: &ServerCache,
) -> Validated {
    let kind = adapter.kind();
    let existing: HashSet<CompositeKey> = server.iter().map(ServerResource::key).collect();
    let mut seen = HashSet::new();
    let mut out = Validated::default();

    for mut item in desired {
        let original_key = item.key();
        item.scalars = normalize_scalars(std::mem::take(&mut item.scalars));

        let item = match adapter.normalize_desired(item, cache) {
            Ok(item) => item,
            Err(e) => {
                out.rejected.push(ValidationError::new(original_key, format!("{e:#}")));
                continue;
            }
        };
        let key = item.key();

        if let Err(reason) = check(adapter, &item, cache) {
            out.rejected.push(ValidationError::new(key, reason));
            continue;
        }

        if !seen.insert(key.clone()) {
            out.rejected.push(ValidationError::new(
                key,
                format!("duplicate {kind}; only the first definition is used"),
            ));
            continue;
        }

        if !existing.contains(&key) {
            out.warnings.extend(unset_required_fields(&item, kind, cache));
        }
        out.valid.push(item);
    }

    for err in &out.rejected {
        log::warn!("Invalid {kind} {err}");
    }
    for warning in &out.warnings {
        log::warn!("{warning}");
    }

    out
}

fn check(
    adapter: &dyn ResourceAdapter,
    item: &DesiredResource,
    cache: &ServerCache,
) -> Result<(), String> {
    let kind = adapter.kind();

    if item.name.trim().is_empty() {
        return Err("name must not be empty".to_string());
    }

    let specs = adapter.scalars();
    for (name, value) in &item.scalars {
        let Some(spec) = specs.iter().find(|s| s.name == name) else {
            return Err(format!("unknown property '{name}' for {kind}"));
        };
        spec.check(value)?;
    }

    if item.tags.is_some() && !adapter.uses_tags() {
        return Err(format!("{kind} does not support tags"));
    }

    if cache.schema(kind).is_some_and(|t| !t.is_empty())
        && cache.template(kind, &item.implementation).is_none()
    {
        return Err(format!("unknown {kind} type '{}'", item.implementation));
    }

    Ok(())
}

fn unset_required_fields(item: &DesiredResource, kind: &str, cache: &ServerCache) -> Vec<String> {
    let Some(template) = cache.template(kind, &item.implementation) else {
        return Vec::new();
    };
    let named: HashSet<String> = item
        .fields
        .iter()
        .flat_map(|f| f.keys())
        .map(|k| camel_case(k))
        .collect();

    template
        .fields
        .iter()
        .filter(|f| f.possibly_required && !named.contains(&f.name))
        .map(|f| format!("{}: field '{}' has no default and may be required", item.key(), f.name))
        .collect()
}

/// Resolve every tag label referenced by the batch
///
/// Missing tags are created once each, across all resources, and appended
/// to the cache. In dry-run they get placeholder ids instead. Afterwards
/// every desired tag list holds ids only.
///
/// # Errors
///
/// Any failure to list or create tags aborts the run.
pub fn resolve_tags(
    desired: &mut [DesiredResource],
    cache: &mut ServerCache,
    store: &dyn TagStore,
    dry_run: bool,
) -> Result<Vec<Tag>, SyncError> {
    let has_labels = desired
        .iter()
        .flat_map(|d| d.tags.iter().flatten())
        .any(|t| matches!(t, TagRef::Name(_)));
    if !has_labels {
        return Ok(Vec::new());
    }

    cache
        .ensure_tags(store)
        .map_err(|e| SyncError::TagLookup { source: e.into() })?;

    let mut missing: Vec<String> = Vec::new();
    for item in desired.iter() {
        let Some(refs) = &item.tags else { continue };
        let (_, unresolved) = tags::resolve(refs, cache.tags());
        for label in unresolved {
            if !missing.iter().any(|m| m.to_lowercase() == label.to_lowercase()) {
                missing.push(label);
            }
        }
    }

    let mut created = Vec::with_capacity(missing.len());
    for label in missing {
        let tag = if dry_run {
            log::info!("Would create tag '{label}'");
            cache.placeholder_tag(&label)
        } else {
            let tag = store
                .create_tag(&label)
                .map_err(|e| SyncError::TagCreation {
                    label: label.clone(),
                    source: e.into(),
                })?;
            log::info!("Created tag '{}' (id {})", tag.label, tag.id);
            cache.push_tag(tag.clone());
            tag
        };
        created.push(tag);
    }

    for item in desired.iter_mut() {
        if let Some(refs) = &item.tags {
            let (ids, _) = tags::resolve(refs, cache.tags());
            item.tags = Some(ids.into_iter().map(TagRef::Id).collect());
        }
    }

    Ok(created)
}
