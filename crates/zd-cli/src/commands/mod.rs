//! CLI command implementations

pub(crate) mod exec;
pub(crate) mod info;
pub(crate) mod query;
pub(crate) mod render;
pub(crate) mod run;
pub(crate) mod schema;
pub(crate) mod tables;
pub(crate) mod transaction;

use zd_jinja::TemplateVars;

/// Collect `--var` pairs; a later pair overrides an earlier one.
pub(crate) fn template_vars(pairs: &[(String, serde_json::Value)]) -> TemplateVars {
    pairs.iter().cloned().collect()
}
