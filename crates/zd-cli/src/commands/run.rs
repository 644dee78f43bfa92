//! Run command implementation

use anyhow::{Context, Result};

use crate::cli::{GlobalArgs, RunArgs};
use crate::commands::template_vars;
use crate::context::RuntimeContext;

/// Render a template and run it with bind parameters.
pub(crate) fn execute(args: &RunArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::connect(global)?;
    let frame = ctx
        .sql()?
        .execute_query_file(&args.template, &template_vars(&args.vars), &args.params)
        .with_context(|| format!("Failed to run template '{}'", args.template))?;
    ctx.print(&frame)
}
