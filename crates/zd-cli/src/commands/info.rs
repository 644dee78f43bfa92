//! Info command implementation

use anyhow::Result;

use crate::cli::GlobalArgs;
use crate::context::RuntimeContext;

/// Describe the resolved connection without connecting. Secrets are masked.
pub(crate) fn execute(global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::open(global)?;
    ctx.print(&ctx.db.database_info())
}
