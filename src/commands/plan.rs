//! `batuque plan` - check every resource without touching the system.

use crate::cli::RunArgs;
use crate::commands::param_overrides;
use crate::resources;
use crate::ui;
use crate::Context;
use anyhow::{Context as _, Result, bail};
use engine::{CancelToken, ExecOpts, RunSummary};

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let graph = engine::load_file(&args.module, &param_overrides(&args.params))
        .with_context(|| format!("could not load {}", args.module.display()))?;

    let registry = resources::registry();
    let sink = ui::StreamSink::new(ctx.verbose > 0, ctx.quiet);
    let opts = ExecOpts {
        jobs: args.jobs as usize,
    };

    ui::header("Plan");
    let planned = engine::plan(&graph, &registry, &sink, &opts, &CancelToken::new())?;
    let summary = RunSummary::from_graph(&planned);
    ui::print_summary("Plan", &summary);

    if !summary.is_success() {
        bail!("{} resource(s) failed during plan", summary.failed);
    }
    Ok(())
}
