//! Instance runs: every configured kind, in dependency order

use anyhow::{Context as AnyhowContext, Result};
use arrclient::{Backend, ResourceKind};
use colored::Colorize;
use dialoguer::Confirm;
use declarative::{
    ApplyResult, Engine, Operation, Plan, ProgressCallback, ServerCache, SyncOptions, SyncSummary,
};

use super::differ::display_plan;
use crate::config::InstanceConfig;
use crate::resource::{BackendTags, adapter_for};

/// Options for one run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Plan and display only
    pub dry_run: bool,
    /// Skip the deletion prompt
    pub yes: bool,
    /// Show payload diffs for updates
    pub verbose: bool,
    /// Suppress per-item progress lines
    pub quiet: bool,
}

/// Per-kind outcome of an instance run
#[derive(Debug, Default)]
pub struct InstanceReport {
    pub kinds: Vec<(ResourceKind, SyncSummary)>,
}

impl InstanceReport {
    pub fn total(&self) -> SyncSummary {
        let mut total = SyncSummary::default();
        for (_, summary) in &self.kinds {
            total.merge(summary);
        }
        total
    }
}

/// Decides whether unmanaged resources may be deleted
pub trait DeleteGate {
    fn allow(&mut self, kind: ResourceKind, names: &[&str]) -> Result<bool>;
}

/// Asks on the terminal unless `--yes` was given
pub struct PromptGate {
    pub yes: bool,
}

impl DeleteGate for PromptGate {
    fn allow(&mut self, kind: ResourceKind, names: &[&str]) -> Result<bool> {
        if self.yes {
            return Ok(true);
        }
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete {} unmanaged {kind}(s): {}?",
                names.len(),
                names.join(", ")
            ))
            .default(false)
            .interact()?;

        Ok(confirmed)
    }
}

/// Prints one line per applied item
struct UiProgress {
    quiet: bool,
}

impl ProgressCallback for UiProgress {
    fn on_batch_start(&mut self, kind: &str, operation: Operation, count: usize) {
        if count > 0 {
            log::debug!("{kind}: {operation:?} batch of {count}");
        }
    }

    fn on_item_complete(&mut self, kind: &str, name: &str, result: &ApplyResult) {
        if self.quiet {
            return;
        }
        match result {
            ApplyResult::Created => println!("    {} Created {kind} {name}", "✓".green()),
            ApplyResult::Modified => println!("    {} Updated {kind} {name}", "✓".green()),
            ApplyResult::Removed => println!("    {} Deleted {kind} {name}", "✓".green()),
            ApplyResult::Skipped { reason } => {
                println!("    {} Kept {kind} {name}: {}", "⚠".yellow(), reason.dimmed());
            }
            ApplyResult::Failed { error } => {
                println!("    {} {kind} {name}: {}", "✗".red(), error.red());
            }
        }
    }
}

/// Reconcile every configured kind of one instance
///
/// Kinds run in [`ResourceKind::all`] order over one shared cache, so names
/// created by an earlier kind resolve in a later one. A failure to read the
/// server aborts the instance; per-item failures only show in the report.
pub fn run_instance(
    instance: &InstanceConfig,
    backend: &dyn Backend,
    opts: &RunOptions,
    gate: &mut dyn DeleteGate,
) -> Result<InstanceReport> {
    let tags = BackendTags(backend);
    let mut cache = ServerCache::new();
    let mut report = InstanceReport::default();

    for (kind, section) in instance.sections() {
        let adapter = adapter_for(kind, backend);
        let options = SyncOptions {
            dry_run: opts.dry_run,
            delete_unmanaged: section.delete_unmanaged.clone(),
            update_secrets: section.update_secrets,
        };
        let engine = Engine::new(&tags, options);

        let mut plan = engine
            .plan(adapter.as_ref(), section.items.clone(), &mut cache)
            .with_context(|| format!("Failed to plan {kind}s"))?;

        display_plan(
            &plan,
            &engine.options().delete_unmanaged,
            adapter.as_ref(),
            &cache,
            opts.verbose,
        );

        if opts.dry_run {
            reserve_planned_names(&plan, kind, &mut cache);
        } else {
            confirm_deletions(&mut plan, &engine, kind, gate)?;
        }

        let mut progress = UiProgress { quiet: opts.quiet };
        let summary = engine.apply(adapter.as_ref(), &plan, &cache, &mut progress);
        report.kinds.push((kind, summary));
    }

    Ok(report)
}

/// Give planned creates placeholder ids so later kinds can refer to them
fn reserve_planned_names(plan: &Plan, kind: ResourceKind, cache: &mut ServerCache) {
    for desired in &plan.diff.create {
        let id = cache.placeholder_id();
        cache.insert_lookup(kind.label(), &desired.name, id);
    }
}

/// Drop the delete batch unless the gate allows it
fn confirm_deletions(
    plan: &mut Plan,
    engine: &Engine<'_>,
    kind: ResourceKind,
    gate: &mut dyn DeleteGate,
) -> Result<()> {
    let policy = &engine.options().delete_unmanaged;
    let names: Vec<&str> = plan
        .diff
        .deletions(policy)
        .map(|s| s.name.as_str())
        .collect();
    if names.is_empty() {
        return Ok(());
    }
    if !gate.allow(kind, &names)? {
        println!("  {} Keeping unmanaged {kind}s", "ℹ".blue());
        plan.diff.delete.clear();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KindSection;
    use arrclient::{Dialect, MockBackend};
    use declarative::{DeletePolicy, DesiredResource, SyncError};
    use serde_json::json;

    struct FixedGate {
        answer: bool,
        asked: Vec<String>,
    }

    impl DeleteGate for FixedGate {
        fn allow(&mut self, kind: ResourceKind, names: &[&str]) -> Result<bool> {
            self.asked.push(format!("{kind}: {}", names.join(",")));
            Ok(self.answer)
        }
    }

    fn gate(answer: bool) -> FixedGate {
        FixedGate {
            answer,
            asked: Vec::new(),
        }
    }

    fn section(items: Vec<DesiredResource>, delete: bool) -> Option<KindSection> {
        Some(KindSection {
            items,
            update_secrets: false,
            delete_unmanaged: if delete {
                DeletePolicy::enabled()
            } else {
                DeletePolicy::default()
            },
        })
    }

    fn instance(dialect: &str) -> InstanceConfig {
        InstanceConfig {
            dialect: dialect.into(),
            base_url: "http://localhost".into(),
            api_key: "key".into(),
            ..Default::default()
        }
    }

    fn quiet(dry_run: bool) -> RunOptions {
        RunOptions {
            dry_run,
            quiet: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_quality_profile_sees_custom_format_created_earlier() {
        let backend = MockBackend::new(Dialect::Radarr);
        backend.set_schema(
            ResourceKind::QualityProfile,
            vec![json!({"name": "", "cutoff": 0, "items": [], "formatItems": []})],
        );
        let mut config = instance("radarr");
        config.custom_formats = section(vec![DesiredResource::new("x265", "")], false);
        config.quality_profiles = section(
            vec![DesiredResource::new("HD", "").with_scalar("formatScores", json!({"x265": -100}))],
            false,
        );

        let report = run_instance(&config, &backend, &quiet(false), &mut gate(true)).unwrap();
        let total = report.total();
        assert_eq!(total.added, 2);
        assert!(total.is_success());

        let cf = backend.stored(ResourceKind::CustomFormat)[0]["id"].clone();
        let profile = &backend.stored(ResourceKind::QualityProfile)[0];
        assert_eq!(profile["formatItems"][0]["format"], cf);
        assert_eq!(profile["formatItems"][0]["score"], json!(-100));
    }

    #[test]
    fn test_dry_run_resolves_planned_names_and_changes_nothing() {
        let backend = MockBackend::new(Dialect::Lidarr);
        let mut config = instance("lidarr");
        config.quality_profiles = section(vec![DesiredResource::new("Lossless", "")], false);
        config.metadata_profiles = section(vec![DesiredResource::new("Standard", "")], false);
        config.root_folders = section(
            vec![
                DesiredResource::new("/music", "")
                    .with_scalar("defaultQualityProfile", "Lossless")
                    .with_scalar("defaultMetadataProfile", "Standard")
                    .with_tags(["new-tag"]),
            ],
            false,
        );

        let report = run_instance(&config, &backend, &quiet(true), &mut gate(false)).unwrap();
        let total = report.total();
        assert_eq!(total.added, 3);
        assert_eq!(total.invalid, 0);
        assert_eq!(backend.mutations(), 0);
    }

    #[test]
    fn test_declined_deletions_keep_other_changes() {
        let backend = MockBackend::new(Dialect::Sonarr);
        backend.add(
            ResourceKind::RemotePathMapping,
            json!({"host": "old", "remotePath": "/x/", "localPath": "/y/"}),
        );
        let mut config = instance("sonarr");
        config.remote_path_mappings = section(
            vec![DesiredResource::new("/dl/", "qb").with_scalar("localPath", "/data/")],
            true,
        );

        let mut declined = gate(false);
        let report = run_instance(&config, &backend, &quiet(false), &mut declined).unwrap();
        let total = report.total();
        assert_eq!(total.added, 1);
        assert_eq!(total.removed, 0);
        assert_eq!(declined.asked, vec!["remote path mapping: /x/".to_string()]);
        assert_eq!(backend.stored(ResourceKind::RemotePathMapping).len(), 2);

        let report = run_instance(&config, &backend, &quiet(false), &mut gate(true)).unwrap();
        assert_eq!(report.total().removed, 1);
        assert_eq!(backend.stored(ResourceKind::RemotePathMapping).len(), 1);
    }

    #[test]
    fn test_tag_creation_failure_is_dependency_error() {
        let backend = MockBackend::new(Dialect::Sonarr);
        backend.fail("POST tag", 500, json!({"message": "database is locked"}));
        let mut config = instance("sonarr");
        config.root_folders = section(vec![DesiredResource::new("/tv", "")], false);
        config.download_clients = section(
            vec![DesiredResource::new("qb", "QBittorrent").with_tags(["new"])],
            false,
        );
        backend.set_schema(
            ResourceKind::DownloadClient,
            vec![json!({"implementation": "QBittorrent", "fields": []})],
        );

        let err = run_instance(&config, &backend, &quiet(false), &mut gate(true)).unwrap_err();
        let sync_error = err.downcast_ref::<SyncError>().unwrap();
        assert!(sync_error.is_dependency_error());
        assert!(backend.calls().iter().all(|c| c != "POST downloadclient"));
    }

    #[test]
    fn test_unreadable_state_aborts_instance() {
        let backend = MockBackend::new(Dialect::Radarr);
        backend.fail("GET remotepathmapping", 401, json!({"message": "Unauthorized"}));
        let mut config = instance("radarr");
        config.remote_path_mappings = section(vec![DesiredResource::new("/a/", "h")], false);

        let err = run_instance(&config, &backend, &quiet(false), &mut gate(true)).unwrap_err();
        assert!(format!("{err:#}").contains("Unauthorized"));
        assert!(!err.downcast_ref::<SyncError>().unwrap().is_dependency_error());
    }

    #[test]
    fn test_empty_sections_make_no_calls() {
        let backend = MockBackend::new(Dialect::Sonarr);
        let mut config = instance("sonarr");
        config.download_clients = section(Vec::new(), false);

        let report = run_instance(&config, &backend, &quiet(false), &mut gate(true)).unwrap();
        assert_eq!(report.kinds.len(), 1);
        assert_eq!(report.total(), SyncSummary::default());
        assert!(backend.calls().is_empty());
    }
}
