//! `batuque validate` - load, resolve, and validate without executing.

use crate::cli::ModuleArgs;
use crate::commands::param_overrides;
use crate::ui;
use crate::Context;
use anyhow::{Context as _, Result};

pub fn run(_ctx: &Context, args: ModuleArgs) -> Result<()> {
    let graph = engine::load_file(&args.module, &param_overrides(&args.params))
        .with_context(|| format!("could not load {}", args.module.display()))?;

    ui::success(&format!(
        "{} is valid: {} resources, {} edges",
        args.module.display(),
        graph.len().saturating_sub(1), // don't count the synthetic root
        graph.edges().len()
    ));
    Ok(())
}
