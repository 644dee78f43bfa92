//! Transaction command implementation

use anyhow::{bail, Context, Result};
use zd_db::executor::split_statements;

use crate::cli::{GlobalArgs, TransactionArgs};
use crate::context::RuntimeContext;

/// Run every statement of a file in one transaction; on failure nothing
/// is applied.
pub(crate) fn execute(args: &TransactionArgs, global: &GlobalArgs) -> Result<()> {
    let script = std::fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let statements = split_statements(&script);
    if statements.is_empty() {
        bail!("No statements found in {}", args.file.display());
    }

    let ctx = RuntimeContext::connect(global)?;
    log::debug!("Running {} statements in one transaction", statements.len());
    let frame = ctx
        .sql()?
        .transaction_query(&statements)
        .context("Transaction rolled back")?;
    ctx.print(&frame)
}
