use super::*;

fn people() -> Frame {
    Frame::from_rows(
        vec![ColumnInfo::new("id", "INT8"), ColumnInfo::new("name", "TEXT")],
        vec![
            vec![Value::Int(1), Value::from("Alice")],
            vec![Value::Int(2), Value::Null],
        ],
    )
    .unwrap()
}

#[test]
fn test_shape_and_lookup() {
    let frame = people();
    assert_eq!(frame.num_rows(), 2);
    assert_eq!(frame.num_columns(), 2);
    assert_eq!(frame.column_names(), vec!["id", "name"]);
    assert_eq!(frame.get(0, "name"), Some(&Value::from("Alice")));
    assert_eq!(frame.get(1, "name"), Some(&Value::Null));
    assert_eq!(frame.get(2, "name"), None);
    assert_eq!(frame.get(0, "missing"), None);
}

#[test]
fn test_column_values() {
    let frame = people();
    let ids = frame.column("id").unwrap();
    assert_eq!(ids, vec![&Value::Int(1), &Value::Int(2)]);
}

#[test]
fn test_push_row_rejects_wrong_width() {
    let mut frame = Frame::with_names(["a", "b"]);
    let err = frame.push_row(vec![Value::Int(1)]).unwrap_err();
    assert!(matches!(
        err,
        CoreError::FrameShape {
            expected: 2,
            actual: 1
        }
    ));
    assert!(frame.is_empty());
}

#[test]
fn test_deserialize_checks_row_width() {
    let ragged = r#"{"columns":[{"name":"a","data_type":""},{"name":"b","data_type":""}],"rows":[[1,2],[3]]}"#;
    let err = serde_json::from_str::<Frame>(ragged).unwrap_err();
    assert!(err.to_string().contains("C006"), "{err}");

    let frame = people();
    let json = serde_json::to_string(&frame).unwrap();
    assert_eq!(serde_json::from_str::<Frame>(&json).unwrap(), frame);
}

#[test]
fn test_from_arrays() {
    let frame = Frame::from_arrays(
        ["query", "rows"],
        [
            [Value::from("DELETE FROM t"), Value::Int(2)],
            [Value::from("UPDATE t SET a = 1"), Value::Null],
        ],
    );
    assert_eq!(frame.column_names(), vec!["query", "rows"]);
    assert_eq!(frame.num_rows(), 2);
    assert_eq!(frame.get(1, "rows"), Some(&Value::Null));

    let empty = Frame::from_arrays(["a"], std::iter::empty());
    assert_eq!(empty.num_columns(), 1);
    assert!(empty.is_empty());
}

#[test]
fn test_single() {
    let frame = Frame::single("database_info", "duckdb(:memory:)");
    assert_eq!(frame.column_names(), vec!["database_info"]);
    assert_eq!(frame.get(0, "database_info").unwrap().as_str(), Some("duckdb(:memory:)"));
}

#[test]
fn test_display_renders_table() {
    let rendered = people().to_string();
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "id | name");
    assert_eq!(lines[1], "---+------");
    assert_eq!(lines[2], "1  | Alice");
    assert_eq!(lines[3], "2  | NULL");
    assert_eq!(lines[4], "(2 rows)");
}

#[test]
fn test_json_records() {
    let json = people().to_json_records();
    assert_eq!(
        json,
        serde_json::json!([
            {"id": 1, "name": "Alice"},
            {"id": 2, "name": null}
        ])
    );
}

#[test]
fn test_value_flags() {
    assert_eq!(Value::from("YES").as_flag(), Some(true));
    assert_eq!(Value::from("no").as_flag(), Some(false));
    assert_eq!(Value::Int(0).as_flag(), Some(false));
    assert_eq!(Value::Bool(true).as_flag(), Some(true));
    assert_eq!(Value::Float(1.0).as_flag(), None);
}

#[test]
fn test_value_from_json() {
    assert_eq!(Value::from_json(&serde_json::json!(18)), Value::Int(18));
    assert_eq!(Value::from_json(&serde_json::json!(1.5)), Value::Float(1.5));
    assert_eq!(Value::from_json(&serde_json::json!("x")), Value::from("x"));
    assert_eq!(Value::from_json(&serde_json::json!(null)), Value::Null);
    assert_eq!(
        Value::from_json(&serde_json::json!([1, 2])),
        Value::from("[1,2]")
    );
}
