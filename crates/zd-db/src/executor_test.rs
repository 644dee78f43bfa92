use super::*;

#[test]
fn test_returns_rows_for_queries() {
    assert!(returns_rows("SELECT 1", Dialect::Postgres));
    assert!(returns_rows("  with x as (select 1) select * from x", Dialect::DuckDb));
    assert!(returns_rows("-- header\nSELECT * FROM t", Dialect::BigQuery));
    assert!(returns_rows("/* c */ (SELECT 1)", Dialect::Postgres));
    assert!(returns_rows("SHOW TABLES", Dialect::DuckDb));
    assert!(returns_rows("PRAGMA table_info('t')", Dialect::DuckDb));
}

#[test]
fn test_returns_rows_for_statements() {
    assert!(!returns_rows("CREATE TABLE t (id INT)", Dialect::Postgres));
    assert!(!returns_rows("INSERT INTO t VALUES (1)", Dialect::DuckDb));
    assert!(!returns_rows("UPDATE t SET a = 1", Dialect::BigQuery));
    assert!(!returns_rows("DROP TABLE t", Dialect::Postgres));
}

#[test]
fn test_returning_clause_returns_rows() {
    assert!(returns_rows(
        "INSERT INTO t (a) VALUES (1) RETURNING id",
        Dialect::Postgres
    ));
}

#[test]
fn test_split_statements() {
    let sql = "CREATE TABLE t (a TEXT);\nINSERT INTO t VALUES ('x;y');\n-- done;\nSELECT 1;;";
    assert_eq!(
        split_statements(sql),
        vec![
            "CREATE TABLE t (a TEXT)",
            "INSERT INTO t VALUES ('x;y')",
            "-- done;\nSELECT 1",
        ]
    );
}

#[test]
fn test_split_statements_quotes_and_comments() {
    let sql = "SELECT 'it''s; fine', \"a;b\" /* x; y */ FROM t; SELECT 2";
    assert_eq!(
        split_statements(sql),
        vec!["SELECT 'it''s; fine', \"a;b\" /* x; y */ FROM t", "SELECT 2"]
    );
}

#[test]
fn test_split_statements_dollar_quoted() {
    let sql = "CREATE FUNCTION f() RETURNS int AS $$ SELECT 1; $$ LANGUAGE sql; SELECT $1";
    assert_eq!(
        split_statements(sql),
        vec![
            "CREATE FUNCTION f() RETURNS int AS $$ SELECT 1; $$ LANGUAGE sql",
            "SELECT $1",
        ]
    );
}

#[test]
fn test_status_frame() {
    let frame = status_frame(Some(3));
    assert_eq!(frame.column_names(), STATUS_COLUMNS.to_vec());
    assert_eq!(frame.get(0, "status").unwrap().as_str(), Some("success"));
    assert_eq!(frame.get(0, "rows_affected"), Some(&Value::Int(3)));

    let frame = status_frame(None);
    assert_eq!(frame.get(0, "rows_affected"), Some(&Value::Null));
}

#[test]
fn test_transaction_frame() {
    let frame = transaction_frame(vec![
        ("INSERT INTO t VALUES (1)".to_string(), Some(1)),
        ("DELETE FROM t".to_string(), Some(4)),
    ]);
    assert_eq!(frame.column_names(), TRANSACTION_COLUMNS.to_vec());
    assert_eq!(frame.num_rows(), 2);
    assert_eq!(frame.get(1, "rows_affected"), Some(&Value::Int(4)));
}

#[test]
fn test_create_table_sql() {
    let table = TableName::try_new("users").unwrap();
    let sql = create_table_sql(
        &table,
        &[
            ColumnDef::new("id", "SERIAL PRIMARY KEY"),
            ColumnDef::new("email", "VARCHAR(255) UNIQUE"),
        ],
    )
    .unwrap();
    assert_eq!(
        sql,
        "CREATE TABLE users (id SERIAL PRIMARY KEY, email VARCHAR(255) UNIQUE)"
    );
}

#[test]
fn test_create_table_sql_rejects_bad_columns() {
    let table = TableName::try_new("users").unwrap();
    assert!(create_table_sql(&table, &[]).is_err());
    assert!(create_table_sql(&table, &[ColumnDef::new("id; DROP", "INT")]).is_err());
    assert!(create_table_sql(&table, &[ColumnDef::new("id", "INT); DROP TABLE x;")]).is_err());
}

fn sample_frame() -> Frame {
    Frame::from_rows(
        vec![ColumnInfo::new("id", ""), ColumnInfo::new("name", "")],
        vec![
            vec![Value::Int(1), Value::Null],
            vec![Value::Int(2), Value::from("b")],
        ],
    )
    .unwrap()
}

#[test]
fn test_infer_columns() {
    let cols = infer_columns(&sample_frame(), Dialect::DuckDb);
    assert_eq!(
        cols,
        vec![ColumnDef::new("id", "BIGINT"), ColumnDef::new("name", "VARCHAR")]
    );
}

#[test]
fn test_infer_columns_widens_mixed_kinds() {
    let frame = Frame::from_rows(
        vec![
            ColumnInfo::new("amount", ""),
            ColumnInfo::new("code", ""),
            ColumnInfo::new("empty", ""),
            ColumnInfo::new("flag", ""),
        ],
        vec![
            vec![Value::Int(1), Value::Int(7), Value::Null, Value::Null],
            vec![Value::Null, Value::from("A7"), Value::Null, Value::Bool(true)],
            vec![Value::Float(2.5), Value::Int(8), Value::Null, Value::Bool(false)],
        ],
    )
    .unwrap();
    let cols = infer_columns(&frame, Dialect::Postgres);
    assert_eq!(
        cols,
        vec![
            ColumnDef::new("amount", "DOUBLE PRECISION"),
            ColumnDef::new("code", "TEXT"),
            ColumnDef::new("empty", "TEXT"),
            ColumnDef::new("flag", "BOOLEAN"),
        ]
    );
}

#[test]
fn test_plan_frame_write_keeps_dotted_column_names() {
    let table = TableName::try_new("metrics").unwrap();
    let frame = Frame::from_rows(
        vec![ColumnInfo::new("stats.p50", ""), ColumnInfo::new("host", "")],
        vec![vec![Value::Float(0.5), Value::from("a")]],
    )
    .unwrap();
    let plan = plan_frame_write(&table, &frame, WriteMode::Fail, false, Dialect::DuckDb).unwrap();
    assert_eq!(
        plan[0].sql,
        "CREATE TABLE metrics (\"stats.p50\" DOUBLE, \"host\" VARCHAR)"
    );
    assert_eq!(
        plan[1].sql,
        "INSERT INTO metrics (\"stats.p50\", \"host\") VALUES (?, ?)"
    );
}

#[test]
fn test_plan_frame_write_creates_and_inserts() {
    let table = TableName::try_new("people").unwrap();
    let plan = plan_frame_write(
        &table,
        &sample_frame(),
        WriteMode::Fail,
        false,
        Dialect::Postgres,
    )
    .unwrap();
    assert_eq!(plan.len(), 2);
    assert_eq!(
        plan[0].sql,
        "CREATE TABLE people (\"id\" BIGINT, \"name\" TEXT)"
    );
    assert_eq!(
        plan[1].sql,
        "INSERT INTO people (\"id\", \"name\") VALUES ($1, NULL), ($2, $3)"
    );
    assert_eq!(
        plan[1].params,
        vec![Value::Int(1), Value::Int(2), Value::from("b")]
    );
}

#[test]
fn test_plan_frame_write_modes() {
    let table = TableName::try_new("people").unwrap();
    let frame = sample_frame();

    let err = plan_frame_write(&table, &frame, WriteMode::Fail, true, Dialect::DuckDb).unwrap_err();
    assert!(matches!(err, DbError::TableExists(_)));

    let plan = plan_frame_write(&table, &frame, WriteMode::Replace, true, Dialect::DuckDb).unwrap();
    assert_eq!(plan[0].sql, "DROP TABLE people");
    assert!(plan[1].sql.starts_with("CREATE TABLE people"));

    let plan = plan_frame_write(&table, &frame, WriteMode::Append, true, Dialect::DuckDb).unwrap();
    assert_eq!(plan.len(), 1);
    assert!(plan[0].sql.starts_with("INSERT INTO people"));
}

#[test]
fn test_plan_frame_write_chunks_inserts() {
    let table = TableName::try_new("wide").unwrap();
    let names: Vec<String> = (0..400).map(|i| format!("c{i}")).collect();
    let mut frame = Frame::with_names(names);
    for _ in 0..5 {
        frame.push_row(vec![Value::Int(1); 400]).unwrap();
    }

    let plan = plan_frame_write(&table, &frame, WriteMode::Fail, false, Dialect::DuckDb).unwrap();
    // CREATE + ceil(5 / (1000 / 400)) = CREATE + 3 inserts
    assert_eq!(plan.len(), 4);
    assert!(plan[1..].iter().all(|s| s.params.len() <= MAX_BIND_PARAMS));
    let total: usize = plan[1..].iter().map(|s| s.params.len()).sum();
    assert_eq!(total, 2000);
}

#[test]
fn test_plan_frame_write_without_columns() {
    let table = TableName::try_new("t").unwrap();
    let err = plan_frame_write(
        &table,
        &Frame::default(),
        WriteMode::Fail,
        false,
        Dialect::DuckDb,
    )
    .unwrap_err();
    assert!(matches!(err, DbError::SchemaError { .. }));
}
