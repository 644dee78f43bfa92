//! Schema command implementation

use anyhow::{Context, Result};

use crate::cli::{GlobalArgs, SchemaArgs};
use crate::context::RuntimeContext;

/// Print column descriptors for one table or every table. An unknown
/// table prints an empty schema.
pub(crate) fn execute(args: &SchemaArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::connect(global)?;
    let frame = ctx
        .db
        .export_schema(args.table.as_deref())
        .context("Failed to read schema")?;
    if frame.is_empty() {
        if let Some(table) = &args.table {
            log::warn!("No columns found for '{table}'");
        }
    }
    ctx.print(&frame)
}
