//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use zd_core::Value;

/// Zangetsu Data - render SQL templates and query Postgres, BigQuery,
/// DuckDB and Google Sheets through one interface
#[derive(Parser, Debug)]
#[command(name = "zd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a zangetsu.yml config file (default: look in the current directory)
    #[arg(short, long, global = true, env = "ZD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Named connection from the config file
    #[arg(short = 'C', long, global = true, env = "ZD_CONNECTION")]
    pub connection: Option<String>,

    /// Connection string, e.g. postgres://…, bigquery://project/dataset,
    /// duckdb://path or sheets://id (overrides the config file)
    #[arg(short, long, global = true, env = "DATABASE_URL", hide_env_values = true)]
    pub url: Option<String>,

    /// Service-account key file for BigQuery and Google Sheets
    #[arg(long, global = true, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Directory holding SQL templates (overrides the config file)
    #[arg(long, global = true)]
    pub sql_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// libpq-style connection fields, used when neither --url nor a config
    /// file names a connection
    #[command(flatten)]
    pub pg: PgEnvArgs,
}

/// PostgreSQL connection fields read from the standard libpq variables
#[derive(Args, Debug, Clone, Default)]
pub struct PgEnvArgs {
    #[arg(long = "pg-host", env = "PGHOST", global = true, hide = true)]
    pub host: Option<String>,

    #[arg(long = "pg-port", env = "PGPORT", global = true, hide = true)]
    pub port: Option<u16>,

    #[arg(long = "pg-database", env = "PGDATABASE", global = true, hide = true)]
    pub database: Option<String>,

    #[arg(long = "pg-user", env = "PGUSER", global = true, hide = true)]
    pub user: Option<String>,

    #[arg(
        long = "pg-password",
        env = "PGPASSWORD",
        global = true,
        hide = true,
        hide_env_values = true
    )]
    pub password: Option<String>,
}

/// Output formats for frames
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text table
    Table,
    /// JSON array of row objects
    Json,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a SQL template without running it
    Render(RenderArgs),

    /// Run a query with positional bind parameters
    Query(QueryArgs),

    /// Run a raw statement (DDL, DML or a query)
    Exec(ExecArgs),

    /// Render a SQL template and run it
    Run(RunArgs),

    /// List tables (or sheets)
    Tables,

    /// Show column schema of one table, or of all tables
    Schema(SchemaArgs),

    /// Run the statements of a SQL file in one transaction
    Transaction(TransactionArgs),

    /// Describe the configured connection
    Info,
}

/// Arguments for the render command
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Template name, with or without the .sql suffix
    pub template: String,

    /// Template variable as key=value; the value is parsed as JSON when possible
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, serde_json::Value)>,
}

/// Arguments for the query command
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// SQL text
    pub sql: String,

    /// Positional bind parameter; parsed as JSON when possible
    #[arg(long = "param", value_name = "VALUE", value_parser = parse_param)]
    pub params: Vec<Value>,
}

/// Arguments for the exec command
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// SQL text
    pub sql: String,
}

/// Arguments for the run command
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Template name, with or without the .sql suffix
    pub template: String,

    /// Template variable as key=value; the value is parsed as JSON when possible
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, serde_json::Value)>,

    /// Positional bind parameter; parsed as JSON when possible
    #[arg(long = "param", value_name = "VALUE", value_parser = parse_param)]
    pub params: Vec<Value>,
}

/// Arguments for the schema command
#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Table name (default: every table)
    pub table: Option<String>,
}

/// Arguments for the transaction command
#[derive(Args, Debug)]
pub struct TransactionArgs {
    /// File holding `;`-separated statements
    pub file: PathBuf,
}

/// Parse `key=value`, reading the value as JSON and falling back to a string.
pub(crate) fn parse_var(s: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing variable name in '{s}'"));
    }
    Ok((key.to_string(), parse_json_or_string(value)))
}

/// Parse a bind parameter, reading it as JSON and falling back to a string.
pub(crate) fn parse_param(s: &str) -> Result<Value, String> {
    Ok(Value::from_json(&parse_json_or_string(s)))
}

fn parse_json_or_string(s: &str) -> serde_json::Value {
    serde_json::from_str(s).unwrap_or_else(|_| serde_json::Value::String(s.to_string()))
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
