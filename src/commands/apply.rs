//! `batuque apply` - plan, then enforce desired state.

use crate::cli::ApplyArgs;
use crate::commands::param_overrides;
use crate::resources;
use crate::ui;
use crate::Context;
use anyhow::{Context as _, Result, bail};
use engine::{CancelToken, ExecOpts, RunSummary};

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let graph = engine::load_file(&args.run.module, &param_overrides(&args.run.params))
        .with_context(|| format!("could not load {}", args.run.module.display()))?;

    let registry = resources::registry();
    let sink = ui::StreamSink::new(ctx.verbose > 0, ctx.quiet);
    let opts = ExecOpts {
        jobs: args.run.jobs as usize,
    };
    let cancel = CancelToken::new();

    ui::header("Plan");
    let planned = engine::plan(&graph, &registry, &sink, &opts, &cancel)?;
    let plan_summary = RunSummary::from_graph(&planned);
    ui::print_summary("Plan", &plan_summary);

    if !plan_summary.is_success() {
        bail!("{} resource(s) failed during plan", plan_summary.failed);
    }
    if args.dry_run {
        ui::info("dry run: skipping apply");
        return Ok(());
    }
    if plan_summary.changed == 0 {
        ui::success("nothing to change");
        return Ok(());
    }

    ui::header("Apply");
    let applied = engine::apply(&graph, &planned, &registry, &sink, &opts, &cancel)?;
    let summary = RunSummary::from_graph(&applied);
    ui::print_summary("Apply", &summary);

    if !summary.is_success() {
        bail!("{} resource(s) failed during apply", summary.failed);
    }
    Ok(())
}
