//! Exec command implementation

use anyhow::{Context, Result};

use crate::cli::{ExecArgs, GlobalArgs};
use crate::context::RuntimeContext;

/// Run raw SQL. Statements without a result set print a status row.
pub(crate) fn execute(args: &ExecArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::connect(global)?;
    let frame = ctx.db.execute_query(&args.sql).context("Statement failed")?;
    ctx.print(&frame)
}
