//! Query command implementation

use anyhow::{Context, Result};

use crate::cli::{GlobalArgs, QueryArgs};
use crate::context::RuntimeContext;

pub(crate) fn execute(args: &QueryArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::connect(global)?;
    let frame = ctx.db.read(&args.sql, &args.params).context("Query failed")?;
    log::debug!("Query returned {} rows", frame.num_rows());
    ctx.print(&frame)
}
