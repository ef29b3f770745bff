//! `batuque graph` - DOT output of the wired dependency graph.

use crate::cli::ModuleArgs;
use crate::commands::param_overrides;
use crate::Context;
use anyhow::{Context as _, Result};

pub fn run(_ctx: &Context, args: ModuleArgs) -> Result<()> {
    let graph = engine::load_file(&args.module, &param_overrides(&args.params))
        .with_context(|| format!("could not load {}", args.module.display()))?;
    print!("{}", graph.to_dot());
    Ok(())
}
