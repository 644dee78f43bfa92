//! SQL helper filters and functions: `sql_literal`, `sql_list`,
//! `sql_identifier`, `to_json` and `from_json()`.

use minijinja::value::{Value, ValueKind};
use minijinja::{Environment, Error, ErrorKind};

/// Names of the functions registered by [`register`].
///
/// They show up as free names when a template is inspected, so they are
/// skipped when reporting which variable was undefined.
pub(crate) const FUNCTION_NAMES: [&str; 1] = ["from_json"];

/// Register every SQL helper on `env`.
pub(crate) fn register(env: &mut Environment<'_>) {
    env.add_filter("sql_literal", sql_literal);
    env.add_filter("sql_list", sql_list);
    env.add_filter("sql_identifier", sql_identifier);
    env.add_filter("to_json", to_json);
    env.add_function("from_json", from_json);
}

/// Render a scalar as a SQL literal.
///
/// Usage in templates:
/// ```jinja
/// WHERE status = {{ status | sql_literal }}
/// ```
///
/// Strings are single-quoted with embedded quotes doubled; numbers and
/// booleans are emitted bare; `none` becomes `NULL`.
pub(crate) fn sql_literal(value: Value) -> Result<String, Error> {
    match value.kind() {
        ValueKind::Undefined => Err(Error::new(
            ErrorKind::UndefinedError,
            "sql_literal received an undefined value",
        )),
        ValueKind::None => Ok("NULL".to_string()),
        ValueKind::Bool => Ok(if value.is_true() { "TRUE" } else { "FALSE" }.to_string()),
        ValueKind::Number => Ok(value.to_string()),
        ValueKind::String => Ok(quote_string(value.as_str().unwrap_or_default())),
        ValueKind::Seq | ValueKind::Iterable | ValueKind::Map => Err(Error::new(
            ErrorKind::InvalidOperation,
            "sql_literal expects a scalar; use sql_list for sequences",
        )),
        _ => Ok(quote_string(&value.to_string())),
    }
}

/// Render a sequence as a comma-separated list of SQL literals.
///
/// Usage in templates:
/// ```jinja
/// WHERE id IN ({{ ids | sql_list }})
/// ```
///
/// An empty sequence renders as `NULL` so `IN (NULL)` stays valid and
/// matches nothing.
pub(crate) fn sql_list(value: Value) -> Result<String, Error> {
    let items = value
        .try_iter()?
        .map(sql_literal)
        .collect::<Result<Vec<_>, _>>()?;
    if items.is_empty() {
        return Ok("NULL".to_string());
    }
    Ok(items.join(", "))
}

/// Double-quote an identifier, quoting each dot-separated part separately.
///
/// `analytics.daily events` renders as `"analytics"."daily events"`.
pub(crate) fn sql_identifier(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Serialize any value as a JSON string.
pub(crate) fn to_json(value: Value) -> Result<String, Error> {
    serde_json::to_string(&value).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("failed to serialize value to JSON: {e}"),
        )
    })
}

/// Parse a JSON string into a template value.
///
/// Usage in templates:
/// ```jinja
/// {% set cfg = from_json('{"limit": 10}') %}
/// ```
pub(crate) fn from_json(input: &str) -> Result<Value, Error> {
    let json: serde_json::Value = serde_json::from_str(input).map_err(|e| {
        Error::new(
            ErrorKind::InvalidOperation,
            format!("from_json: invalid JSON: {e}"),
        )
    })?;
    Ok(Value::from_serialize(&json))
}

fn quote_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

#[cfg(test)]
#[path = "functions_test.rs"]
mod tests;
