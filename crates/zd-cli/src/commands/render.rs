//! Render command implementation

use anyhow::{Context, Result};

use crate::cli::{GlobalArgs, RenderArgs};
use crate::commands::template_vars;
use crate::context::Settings;

/// Print the rendered SQL of a template. Needs no connection.
pub(crate) fn execute(args: &RenderArgs, global: &GlobalArgs) -> Result<()> {
    let settings = Settings::resolve(global)?;
    let templates = settings.templates();
    let sql = templates
        .render(&args.template, &template_vars(&args.vars))
        .with_context(|| format!("Failed to render template '{}'", args.template))?;
    println!("{sql}");
    Ok(())
}
