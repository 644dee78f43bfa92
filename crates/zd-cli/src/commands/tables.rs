//! Tables command implementation

use anyhow::{Context, Result};
use zd_core::{ColumnInfo, Frame, Value};

use crate::cli::GlobalArgs;
use crate::context::RuntimeContext;

pub(crate) fn execute(global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::connect(global)?;
    let tables = ctx.db.list_tables().context("Failed to list tables")?;
    let frame = Frame::from_rows(
        vec![ColumnInfo::new("table_name", "")],
        tables.into_iter().map(|t| vec![Value::from(t)]).collect(),
    )?;
    ctx.print(&frame)
}
