use anyhow::Result;
use arrclient::Backend;
use declarative::SyncSummary;

use super::{connect, is_fatal, load_config, report_error};
use crate::Context;
use crate::cli::SyncArgs;
use crate::config::InstanceConfig;
use crate::engine::{DeleteGate, PromptGate, RunOptions, run_instance};
use crate::ui;

/// Totals across every instance of one run
#[derive(Debug, Default)]
pub struct Outcome {
    pub total: SyncSummary,
    /// Instances whose server state could not be read
    pub aborted: Vec<String>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.aborted.is_empty() && self.total.is_success()
    }
}

pub fn run(ctx: &Context, args: &SyncArgs) -> Result<()> {
    let opts = RunOptions {
        dry_run: args.dry_run,
        yes: args.yes,
        verbose: ctx.verbose > 0,
        quiet: ctx.quiet,
    };
    reconcile(ctx, args.instance.as_deref(), &opts)
}

/// Run the selected instances and fail when anything did not go through
pub fn reconcile(ctx: &Context, only: Option<&str>, opts: &RunOptions) -> Result<()> {
    let config = load_config(ctx)?;
    let instances = config.select(only)?;
    let mut gate = PromptGate { yes: opts.yes };

    let outcome = run_instances(&instances, opts, &mut gate, connect)?;

    println!();
    let title = if opts.dry_run { "Would change" } else { "Total" };
    ui::summary(title, &outcome.total);

    if !outcome.is_success() {
        if !outcome.aborted.is_empty() {
            anyhow::bail!("Could not sync: {}", outcome.aborted.join(", "));
        }
        anyhow::bail!(
            "{} failed, {} invalid",
            outcome.total.failed,
            outcome.total.invalid
        );
    }
    if opts.dry_run {
        ui::info("Dry run, nothing was changed");
    } else {
        ui::success("Sync complete!");
    }
    Ok(())
}

/// Run instances one after another
///
/// An instance whose state cannot be read is reported and skipped. Failing
/// to resolve tags stops the whole run.
pub fn run_instances<F>(
    instances: &[(&str, &InstanceConfig)],
    opts: &RunOptions,
    gate: &mut dyn DeleteGate,
    connect: F,
) -> Result<Outcome>
where
    F: Fn(&InstanceConfig) -> Result<Box<dyn Backend>>,
{
    let mut outcome = Outcome::default();

    for &(name, instance) in instances {
        ui::header(&format!("{name} ({})", instance.dialect));

        let result =
            connect(instance).and_then(|backend| run_instance(instance, backend.as_ref(), opts, gate));
        match result {
            Ok(report) => {
                for (kind, summary) in &report.kinds {
                    ui::summary(&format!("{name} {kind}s"), summary);
                }
                outcome.total.merge(&report.total());
            }
            Err(e) if is_fatal(&e) => {
                report_error(name, &e);
                return Err(e.context(format!("Aborted while syncing '{name}'")));
            }
            Err(e) => {
                report_error(name, &e);
                outcome.aborted.push(name.to_string());
            }
        }
    }

    Ok(outcome)
}
