//! Reconciliation engine - plans and applies one resource kind

use crate::context::{NoProgress, Operation, ProgressCallback, ServerCache, SyncOptions, TagStore};
use crate::diff::{Update, compute_diff};
use crate::error::{SyncError, is_in_use_message};
use crate::planner::{Plan, resolve_tags, validate};
use crate::resource::ResourceAdapter;
use crate::types::{ApplyResult, CompositeKey, DesiredResource, ServerResource, SyncSummary};
use rayon::prelude::*;
use std::collections::HashSet;

/// Drives adapters through validate, tag resolution, diff and apply
pub struct Engine<'a> {
    tags: &'a dyn TagStore,
    options: SyncOptions,
}

impl<'a> Engine<'a> {
    pub fn new(tags: &'a dyn TagStore, options: SyncOptions) -> Self {
        Self { tags, options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Compute the plan for one resource kind
    ///
    /// Performs only reads, except for tag creation outside dry-run.
    ///
    /// # Errors
    ///
    /// Fails when server state, schema or lookups cannot be read, or when a
    /// referenced tag cannot be created.
    pub fn plan(
        &self,
        adapter: &dyn ResourceAdapter,
        desired: Vec<DesiredResource>,
        cache: &mut ServerCache,
    ) -> Result<Plan, SyncError> {
        let kind = adapter.kind();
        if desired.is_empty() && !self.options.delete_unmanaged.enabled {
            log::debug!("No {kind} configured, skipping");
            return Ok(Plan::empty(kind));
        }

        ensure_schema(adapter, cache)?;
        adapter
            .prepare(cache)
            .map_err(|e| SyncError::Prepare {
                kind,
                source: e.into(),
            })?;
        let server = adapter
            .fetch_server_state()
            .map_err(|e| SyncError::FetchState {
                kind,
                source: e.into(),
            })?;
        log::debug!("Fetched {} {kind} resource(s)", server.len());

        let mut validated = validate(adapter, desired, &server, cache);
        let created_tags = resolve_tags(&mut validated.valid, cache, self.tags, self.options.dry_run)?;

        let secrets = self.options.update_secrets;
        let cache_ref: &ServerCache = cache;
        let declared: HashSet<CompositeKey> =
            validated.rejected.iter().map(|e| e.key.clone()).collect();
        let mut diff = compute_diff(validated.valid, server, |d, s| {
            adapter.equal(d, s, cache_ref, secrets)
        });
        diff.spare_declared(&declared);

        Ok(Plan {
            kind,
            diff,
            rejected: validated.rejected,
            warnings: validated.warnings,
            created_tags,
        })
    }

    /// Apply a plan
    ///
    /// Creates and updates run as two concurrent batches; deletions follow
    /// one at a time. Failures are counted, never raised.
    pub fn apply<P: ProgressCallback + ?Sized>(
        &self,
        adapter: &dyn ResourceAdapter,
        plan: &Plan,
        cache: &ServerCache,
        progress: &mut P,
    ) -> SyncSummary {
        let kind = plan.kind;
        let policy = &self.options.delete_unmanaged;

        if self.options.dry_run {
            let mut summary = plan.diff.summary(policy);
            summary.invalid = plan.rejected.len();
            return summary;
        }

        let mut summary = SyncSummary {
            unchanged: plan.diff.unchanged.len(),
            invalid: plan.rejected.len(),
            ..Default::default()
        };

        let creates = &plan.diff.create;
        let updates = &plan.diff.update;
        progress.on_batch_start(kind, Operation::Create, creates.len());
        progress.on_batch_start(kind, Operation::Update, updates.len());

        // results are reported after both batches; the callback is not Sync
        let (created, updated) = rayon::join(
            || {
                creates
                    .par_iter()
                    .map(|d| (d.name.as_str(), apply_create(adapter, d, cache)))
                    .collect::<Vec<_>>()
            },
            || {
                updates
                    .par_iter()
                    .map(|u| (u.desired.name.as_str(), apply_update(adapter, u, cache)))
                    .collect::<Vec<_>>()
            },
        );

        for (name, result) in created.iter().chain(&updated) {
            progress.on_item_complete(kind, name, result);
            summary.add_result(result);
        }

        let deletions: Vec<&ServerResource> = plan.diff.deletions(policy).collect();
        if !deletions.is_empty() {
            progress.on_batch_start(kind, Operation::Delete, deletions.len());
            for resource in deletions {
                let result = apply_delete(adapter, resource);
                progress.on_item_complete(kind, &resource.name, &result);
                summary.add_result(&result);
            }
        }

        log::info!(
            "{kind}: {} added, {} updated, {} removed, {} unchanged, {} failed",
            summary.added,
            summary.updated,
            summary.removed,
            summary.unchanged,
            summary.failed
        );
        summary
    }

    /// Plan and apply in one go
    ///
    /// # Errors
    ///
    /// See [`Engine::plan`]; apply failures only show up in the summary.
    pub fn sync_resources(
        &self,
        adapter: &dyn ResourceAdapter,
        desired: Vec<DesiredResource>,
        cache: &mut ServerCache,
    ) -> Result<SyncSummary, SyncError> {
        let plan = self.plan(adapter, desired, cache)?;
        Ok(self.apply(adapter, &plan, cache, &mut NoProgress))
    }
}

/// Fetch the schema unless this run already has it
///
/// # Errors
///
/// Fails when the schema endpoint cannot be read.
pub fn ensure_schema(adapter: &dyn ResourceAdapter, cache: &mut ServerCache) -> Result<(), SyncError> {
    let kind = adapter.kind();
    if cache.schema(kind).is_none() {
        let templates = adapter
            .fetch_schema()
            .map_err(|e| SyncError::FetchSchema {
                kind,
                source: e.into(),
            })?;
        log::debug!("Cached {} {kind} template(s)", templates.len());
        cache.store_schema(kind, templates);
    }
    Ok(())
}

fn apply_create(adapter: &dyn ResourceAdapter, desired: &DesiredResource, cache: &ServerCache) -> ApplyResult {
    let kind = adapter.kind();
    let result = adapter
        .build_payload(desired, cache, None, false)
        .and_then(|payload| adapter.create(&payload));
    match result {
        Ok(created) => {
            log::info!("Created {kind} '{}' (id {})", desired.name, created.id);
            ApplyResult::Created
        }
        Err(e) => {
            log::error!("Failed to create {kind} '{}': {e:#}", desired.name);
            ApplyResult::Failed {
                error: format!("{e:#}"),
            }
        }
    }
}

fn apply_update(adapter: &dyn ResourceAdapter, update: &Update, cache: &ServerCache) -> ApplyResult {
    let kind = adapter.kind();
    let name = &update.desired.name;
    let result = adapter
        .build_payload(&update.desired, cache, Some(&update.server), update.partial)
        .and_then(|payload| adapter.update(update.server.id, &payload));
    match result {
        Ok(_) => {
            let mode = if update.partial { "partial" } else { "full" };
            log::info!("Updated {kind} '{name}' ({mode})");
            ApplyResult::Modified
        }
        Err(e) => {
            log::error!("Failed to update {kind} '{name}': {e:#}");
            ApplyResult::Failed {
                error: format!("{e:#}"),
            }
        }
    }
}

fn apply_delete(adapter: &dyn ResourceAdapter, resource: &ServerResource) -> ApplyResult {
    let kind = adapter.kind();
    match adapter.delete(resource.id) {
        Ok(()) => {
            log::info!("Deleted {kind} '{}'", resource.name);
            ApplyResult::Removed
        }
        Err(e) => {
            let message = format!("{e:#}");
            if is_in_use_message(&message) {
                log::info!("Kept {kind} '{}': still in use ({message})", resource.name);
                ApplyResult::Skipped {
                    reason: format!("in use: {message}"),
                }
            } else {
                log::error!("Failed to delete {kind} '{}': {message}", resource.name);
                ApplyResult::Failed { error: message }
            }
        }
    }
}
