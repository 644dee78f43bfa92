//! zd-jinja - SQL template resolver for Zangetsu Data
//!
//! Templates are plain `.sql` files under a configured directory, rendered
//! with minijinja. Undefined variables are errors, never blanks, and nothing
//! is cached between renders.
//!
//! SQL helpers available in every template: the `sql_literal`, `sql_list`,
//! `sql_identifier` and `to_json` filters, and the `from_json()` function.

pub mod error;
pub mod functions;
pub mod resolver;

pub use error::{JinjaError, JinjaResult};
pub use resolver::{render_str, TemplateResolver, TemplateVars};
