use super::*;
use clap::CommandFactory;

#[test]
fn verify_cli_args() {
    // Validates the entire command tree: short flag conflicts,
    // duplicate args, and other clap definition errors.
    Cli::command().debug_assert();
}

#[test]
fn test_parse_var_reads_json() {
    assert_eq!(
        parse_var("min_age=18").unwrap(),
        ("min_age".to_string(), serde_json::json!(18))
    );
    assert_eq!(
        parse_var("cols=[\"a\",\"b\"]").unwrap(),
        ("cols".to_string(), serde_json::json!(["a", "b"]))
    );
    assert_eq!(
        parse_var("flag=true").unwrap().1,
        serde_json::json!(true)
    );
}

#[test]
fn test_parse_var_falls_back_to_string() {
    assert_eq!(
        parse_var("name=alice").unwrap(),
        ("name".to_string(), serde_json::json!("alice"))
    );
    // Only the first '=' separates key and value.
    assert_eq!(
        parse_var("expr=a=b").unwrap().1,
        serde_json::json!("a=b")
    );
    assert_eq!(parse_var("empty=").unwrap().1, serde_json::json!(""));
}

#[test]
fn test_parse_var_rejects_malformed() {
    assert!(parse_var("no_equals").is_err());
    assert!(parse_var("=5").is_err());
}

#[test]
fn test_parse_param() {
    assert_eq!(parse_param("18").unwrap(), Value::Int(18));
    assert_eq!(parse_param("2.5").unwrap(), Value::Float(2.5));
    assert_eq!(parse_param("null").unwrap(), Value::Null);
    assert_eq!(parse_param("tokyo").unwrap(), Value::from("tokyo"));
    assert_eq!(parse_param("\"42\"").unwrap(), Value::from("42"));
}

#[test]
fn test_parse_run_command() {
    let cli = Cli::try_parse_from([
        "zd",
        "--url",
        "duckdb::memory:",
        "run",
        "users_by_age",
        "--var",
        "min_age=18",
        "--var",
        "max_age=30",
        "--param",
        "tokyo",
        "-f",
        "json",
    ])
    .unwrap();
    assert_eq!(cli.global.url.as_deref(), Some("duckdb::memory:"));
    assert_eq!(cli.global.format, OutputFormat::Json);
    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.template, "users_by_age");
            assert_eq!(args.vars.len(), 2);
            assert_eq!(args.params, vec![Value::from("tokyo")]);
        }
        other => panic!("expected run, got {other:?}"),
    }
}
