//! Backend-independent pieces of query execution: statement classification,
//! statement splitting, status frames and the SQL text for DDL and frame writes.

use crate::dialect::Dialect;
use crate::error::{DbError, DbResult};
use sqlparser::ast::Statement;
use sqlparser::parser::Parser;
use zd_core::{
    validate_identifier, ColumnDef, ColumnInfo, Frame, TableName, Value, ValueKind, WriteMode,
};

/// Columns of the frame returned by `execute_query` for statements without rows.
pub const STATUS_COLUMNS: [&str; 3] = ["status", "message", "rows_affected"];

/// Columns of the frame returned by `transaction_query`.
pub const TRANSACTION_COLUMNS: [&str; 2] = ["query", "rows_affected"];

/// Leading keywords of statements that produce a result set.
const ROW_KEYWORDS: [&str; 10] = [
    "SELECT", "WITH", "SHOW", "DESCRIBE", "DESC", "VALUES", "PRAGMA", "EXPLAIN", "TABLE",
    "SUMMARIZE",
];

/// Upper bound on bind parameters per generated INSERT.
pub const MAX_BIND_PARAMS: usize = 1000;

/// A SQL statement together with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl BoundStatement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// Whether `sql` produces a result set.
///
/// The statement is parsed with the backend's sqlparser dialect; when parsing
/// fails or the statement isn't a query, the leading keyword and a
/// `RETURNING` clause decide.
pub fn returns_rows(sql: &str, dialect: Dialect) -> bool {
    let parser_dialect = dialect.parser_dialect();
    if let Ok(statements) = Parser::parse_sql(&*parser_dialect, sql) {
        if let Some(Statement::Query(_)) = statements.last() {
            return true;
        }
    }

    let keyword = leading_keyword(sql).to_ascii_uppercase();
    ROW_KEYWORDS.contains(&keyword.as_str()) || has_returning_clause(sql)
}

/// First word of `sql`, skipping whitespace, comments and opening parens.
fn leading_keyword(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        let trimmed = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(comment) = trimmed.strip_prefix("--") {
            rest = comment.split_once('\n').map_or("", |(_, after)| after);
        } else if let Some(comment) = trimmed.strip_prefix("/*") {
            rest = comment.split_once("*/").map_or("", |(_, after)| after);
        } else {
            rest = trimmed;
            break;
        }
    }
    let end = rest
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(rest.len());
    &rest[..end]
}

fn has_returning_clause(sql: &str) -> bool {
    sql.split_whitespace()
        .any(|word| word.eq_ignore_ascii_case("RETURNING"))
}

/// Split a script into statements on `;`.
///
/// Semicolons inside quoted strings, quoted identifiers, comments and
/// Postgres dollar-quoted bodies are not separators. Empty statements are
/// dropped and each statement is trimmed.
pub fn split_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                let end = find_closing(&chars, i + 1, c);
                current.extend(&chars[i..end]);
                i = end;
                continue;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == '\n')
                    .map_or(chars.len(), |p| i + p);
                current.extend(&chars[i..end]);
                i = end;
                continue;
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let end = (i + 2..chars.len().saturating_sub(1))
                    .find(|&j| chars[j] == '*' && chars[j + 1] == '/')
                    .map_or(chars.len(), |j| j + 2);
                current.extend(&chars[i..end]);
                i = end;
                continue;
            }
            '$' => {
                if let Some(tag_end) = dollar_tag_end(&chars, i) {
                    let tag: String = chars[i..=tag_end].iter().collect();
                    let body_start = tag_end + 1;
                    let end = find_sequence(&chars, body_start, &tag)
                        .map_or(chars.len(), |j| j + tag.chars().count());
                    current.extend(&chars[i..end]);
                    i = end;
                    continue;
                }
            }
            ';' => {
                push_statement(&mut statements, &current);
                current.clear();
                i += 1;
                continue;
            }
            _ => {}
        }
        current.push(c);
        i += 1;
    }
    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

/// Index one past the closing `quote`, honouring doubled quotes as escapes.
fn find_closing(chars: &[char], mut i: usize, quote: char) -> usize {
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// For `$tag$` or `$$` starting at `start`, the index of the closing `$`.
fn dollar_tag_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    while j < chars.len() {
        match chars[j] {
            '$' => return Some(j),
            c if c.is_ascii_alphanumeric() || c == '_' => {
                // $1-style placeholders are not tags
                if j == start + 1 && c.is_ascii_digit() {
                    return None;
                }
                j += 1;
            }
            _ => return None,
        }
    }
    None
}

fn find_sequence(chars: &[char], from: usize, needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() || chars.len() < needle.len() {
        return None;
    }
    (from..=chars.len() - needle.len()).find(|&j| chars[j..j + needle.len()] == needle[..])
}

/// One-row frame reporting a statement that returned no rows.
pub fn status_frame(rows_affected: Option<u64>) -> Frame {
    Frame::from_arrays(
        STATUS_COLUMNS,
        [[
            Value::from("success"),
            Value::from("Query executed successfully"),
            rows_affected_value(rows_affected),
        ]],
    )
}

/// Per-statement report of a committed transaction.
pub fn transaction_frame(reports: Vec<(String, Option<u64>)>) -> Frame {
    Frame::from_arrays(
        TRANSACTION_COLUMNS,
        reports
            .into_iter()
            .map(|(query, rows_affected)| [Value::from(query), rows_affected_value(rows_affected)]),
    )
}

fn rows_affected_value(rows_affected: Option<u64>) -> Value {
    rows_affected
        .and_then(|n| i64::try_from(n).ok())
        .map(Value::Int)
        .unwrap_or(Value::Null)
}

/// `CREATE TABLE` for explicit column definitions.
///
/// Column names must be plain identifiers; the type text is used verbatim.
pub fn create_table_sql(table: &TableName, columns: &[ColumnDef]) -> DbResult<String> {
    if columns.is_empty() {
        return Err(DbError::schema(table, "at least one column is required"));
    }
    let mut defs = Vec::with_capacity(columns.len());
    for col in columns {
        validate_identifier(&col.name)?;
        if col.data_type.contains(';') {
            return Err(DbError::schema(
                table,
                format!("invalid type for column '{}': {}", col.name, col.data_type),
            ));
        }
        defs.push(format!("{} {}", col.name, col.data_type.trim()));
    }
    Ok(format!("CREATE TABLE {} ({})", table, defs.join(", ")))
}

pub fn drop_table_sql(table: &TableName) -> String {
    format!("DROP TABLE {table}")
}

/// Column definitions inferred from a frame.
///
/// A column whose non-null values all share one kind gets that kind's type.
/// Integers mixed with floats widen to the float type; any other mix, or a
/// column of nulls, falls back to the dialect's text type.
pub fn infer_columns(frame: &Frame, dialect: Dialect) -> Vec<ColumnDef> {
    frame
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let kind = frame
                .rows()
                .iter()
                .filter_map(|row| row.get(idx))
                .filter(|v| !v.is_null())
                .map(Value::kind)
                .try_fold(None, |acc, kind| widen(acc, kind).map(Some))
                .flatten()
                .unwrap_or(ValueKind::String);
            ColumnDef::new(col.name.clone(), dialect.column_type(kind))
        })
        .collect()
}

/// Common kind of two cell kinds, or `None` when only text can hold both.
fn widen(acc: Option<ValueKind>, kind: ValueKind) -> Option<ValueKind> {
    match (acc, kind) {
        (None, kind) => Some(kind),
        (Some(a), b) if a == b => Some(a),
        (Some(ValueKind::Int), ValueKind::Float) | (Some(ValueKind::Float), ValueKind::Int) => {
            Some(ValueKind::Float)
        }
        _ => None,
    }
}

/// Statements that write `frame` into `table`.
///
/// `exists` tells whether the table is already there; together with `mode`
/// it decides between failing, drop-and-recreate, create, or plain insert.
/// Inserts are multi-row and chunked so each binds at most
/// [`MAX_BIND_PARAMS`] values. NULL cells are written as literals.
pub fn plan_frame_write(
    table: &TableName,
    frame: &Frame,
    mode: WriteMode,
    exists: bool,
    dialect: Dialect,
) -> DbResult<Vec<BoundStatement>> {
    if frame.num_columns() == 0 {
        return Err(DbError::schema(table, "cannot write a frame without columns"));
    }

    let mut statements = Vec::new();
    let create = || {
        let defs: Vec<String> = infer_columns(frame, dialect)
            .iter()
            .map(|c| format!("{} {}", dialect.quote_column(&c.name), c.data_type))
            .collect();
        BoundStatement::new(format!("CREATE TABLE {} ({})", table, defs.join(", ")))
    };

    match (exists, mode) {
        (true, WriteMode::Fail) => return Err(DbError::TableExists(table.to_string())),
        (true, WriteMode::Replace) => {
            statements.push(BoundStatement::new(drop_table_sql(table)));
            statements.push(create());
        }
        (true, WriteMode::Append) => {}
        (false, _) => statements.push(create()),
    }

    statements.extend(insert_statements(table, frame.columns(), frame.rows(), dialect));
    Ok(statements)
}

fn insert_statements(
    table: &TableName,
    columns: &[ColumnInfo],
    rows: &[Vec<Value>],
    dialect: Dialect,
) -> Vec<BoundStatement> {
    let column_list = columns
        .iter()
        .map(|c| dialect.quote_column(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let rows_per_statement = (MAX_BIND_PARAMS / columns.len()).max(1);

    rows.chunks(rows_per_statement)
        .map(|chunk| {
            let mut params = Vec::new();
            let tuples: Vec<String> = chunk
                .iter()
                .map(|row| {
                    let cells: Vec<String> = row
                        .iter()
                        .map(|value| {
                            if value.is_null() {
                                "NULL".to_string()
                            } else {
                                params.push(value.clone());
                                dialect.placeholder(params.len())
                            }
                        })
                        .collect();
                    format!("({})", cells.join(", "))
                })
                .collect();
            BoundStatement {
                sql: format!(
                    "INSERT INTO {} ({}) VALUES {}",
                    table,
                    column_list,
                    tuples.join(", ")
                ),
                params,
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "executor_test.rs"]
mod tests;
