//! Per-backend SQL text rules: placeholders, identifier quoting, type names.

use sqlparser::dialect::{
    BigQueryDialect as SqlParserBigQuery, Dialect as ParserDialect,
    DuckDbDialect as SqlParserDuckDb, PostgreSqlDialect as SqlParserPostgres,
};
use zd_core::ValueKind;

/// SQL flavour spoken by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    DuckDb,
    BigQuery,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::DuckDb => "duckdb",
            Dialect::BigQuery => "bigquery",
        }
    }

    /// Bind placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::DuckDb | Dialect::BigQuery => "?".to_string(),
        }
    }

    /// Quote a single column name. Dots are part of the name.
    pub fn quote_column(&self, name: &str) -> String {
        let quote = match self {
            Dialect::Postgres | Dialect::DuckDb => '"',
            Dialect::BigQuery => '`',
        };
        let escaped = name.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }

    /// Catalog spelling of an unquoted identifier. Postgres folds unquoted
    /// names to lower case; DuckDB matches them case-insensitively in the
    /// catalog query instead, and BigQuery keeps them as written.
    pub fn fold_case(&self, ident: &str) -> String {
        match self {
            Dialect::Postgres => ident.to_lowercase(),
            Dialect::DuckDb | Dialect::BigQuery => ident.to_string(),
        }
    }

    /// Column type used when creating a table for values of `kind`.
    pub fn column_type(&self, kind: ValueKind) -> &'static str {
        match (self, kind) {
            (Dialect::Postgres, ValueKind::Bool) => "BOOLEAN",
            (Dialect::Postgres, ValueKind::Int) => "BIGINT",
            (Dialect::Postgres, ValueKind::Float) => "DOUBLE PRECISION",
            (Dialect::Postgres, ValueKind::Bytes) => "BYTEA",
            (Dialect::Postgres, _) => "TEXT",

            (Dialect::DuckDb, ValueKind::Bool) => "BOOLEAN",
            (Dialect::DuckDb, ValueKind::Int) => "BIGINT",
            (Dialect::DuckDb, ValueKind::Float) => "DOUBLE",
            (Dialect::DuckDb, ValueKind::Bytes) => "BLOB",
            (Dialect::DuckDb, _) => "VARCHAR",

            (Dialect::BigQuery, ValueKind::Bool) => "BOOL",
            (Dialect::BigQuery, ValueKind::Int) => "INT64",
            (Dialect::BigQuery, ValueKind::Float) => "FLOAT64",
            (Dialect::BigQuery, ValueKind::Bytes) => "BYTES",
            (Dialect::BigQuery, _) => "STRING",
        }
    }

    /// The sqlparser dialect used to classify statements.
    pub fn parser_dialect(&self) -> Box<dyn ParserDialect> {
        match self {
            Dialect::Postgres => Box::new(SqlParserPostgres {}),
            Dialect::DuckDb => Box::new(SqlParserDuckDb {}),
            Dialect::BigQuery => Box::new(SqlParserBigQuery {}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(1), "$1");
        assert_eq!(Dialect::Postgres.placeholder(12), "$12");
        assert_eq!(Dialect::DuckDb.placeholder(3), "?");
        assert_eq!(Dialect::BigQuery.placeholder(3), "?");
    }

    #[test]
    fn test_quote_column_keeps_dots() {
        assert_eq!(Dialect::DuckDb.quote_column("a.b"), "\"a.b\"");
        assert_eq!(Dialect::Postgres.quote_column("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(Dialect::BigQuery.quote_column("x.y"), "`x.y`");
    }

    #[test]
    fn test_fold_case() {
        assert_eq!(Dialect::Postgres.fold_case("Staging.Users"), "staging.users");
        assert_eq!(Dialect::DuckDb.fold_case("Users"), "Users");
        assert_eq!(Dialect::BigQuery.fold_case("Events"), "Events");
    }

    #[test]
    fn test_column_types() {
        assert_eq!(Dialect::Postgres.column_type(ValueKind::Float), "DOUBLE PRECISION");
        assert_eq!(Dialect::DuckDb.column_type(ValueKind::Null), "VARCHAR");
        assert_eq!(Dialect::BigQuery.column_type(ValueKind::Int), "INT64");
    }
}
