use anyhow::Result;

use crate::Context;
use crate::cli::DiffArgs;
use crate::engine::RunOptions;

/// `sync --dry-run` with payload diffs shown
pub fn run(ctx: &Context, args: &DiffArgs) -> Result<()> {
    let opts = RunOptions {
        dry_run: true,
        yes: false,
        verbose: true,
        quiet: ctx.quiet,
    };
    super::sync::reconcile(ctx, args.instance.as_deref(), &opts)
}
