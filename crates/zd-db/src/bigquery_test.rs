use super::*;
use tempfile::TempDir;

const QUERY_RESPONSE: &str = include_str!("../tests/fixtures/bigquery_query_response.json");

fn config() -> BigQueryConfig {
    let mut config = BigQueryConfig::new("zd-test-project", "analytics");
    config.location = Some("US".to_string());
    config
}

fn backend(dir: &TempDir) -> BigQueryBackend {
    BigQueryBackend::new(config(), TemplateResolver::new(dir.path()))
}

fn field(name: &str, field_type: &str) -> FieldSchema {
    FieldSchema {
        name: name.to_string(),
        field_type: field_type.to_string(),
        mode: None,
        fields: Vec::new(),
    }
}

#[test]
fn test_query_request_without_params() {
    let body = query_request(&config(), "SELECT 1", &[]);
    assert_eq!(body["query"], "SELECT 1");
    assert_eq!(body["useLegacySql"], false);
    assert_eq!(body["defaultDataset"]["projectId"], "zd-test-project");
    assert_eq!(body["defaultDataset"]["datasetId"], "analytics");
    assert_eq!(body["location"], "US");
    assert_eq!(body["formatOptions"]["useInt64Timestamp"], true);
    assert!(body.get("parameterMode").is_none());
    assert!(body.get("queryParameters").is_none());
}

#[test]
fn test_query_request_with_positional_params() {
    let params = vec![Value::Int(18), Value::from("tokyo"), Value::Null];
    let body = query_request(&config(), "SELECT * FROM users WHERE age > ? AND city = ?", &params);
    assert_eq!(body["parameterMode"], "POSITIONAL");
    assert_eq!(
        body["queryParameters"],
        json!([
            {"parameterType": {"type": "INT64"}, "parameterValue": {"value": "18"}},
            {"parameterType": {"type": "STRING"}, "parameterValue": {"value": "tokyo"}},
            {"parameterType": {"type": "STRING"}, "parameterValue": {}}
        ])
    );
}

#[test]
fn test_query_parameter_types() {
    assert_eq!(
        query_parameter(&Value::Bool(true)),
        json!({"parameterType": {"type": "BOOL"}, "parameterValue": {"value": "true"}})
    );
    assert_eq!(
        query_parameter(&Value::Float(2.5)),
        json!({"parameterType": {"type": "FLOAT64"}, "parameterValue": {"value": "2.5"}})
    );
    assert_eq!(
        query_parameter(&Value::Bytes(vec![0, 1, b'z', b'd'])),
        json!({"parameterType": {"type": "BYTES"}, "parameterValue": {"value": "AAF6ZA=="}})
    );
}

#[test]
fn test_frame_from_query_response() {
    let response: QueryResponse = serde_json::from_str(QUERY_RESPONSE).unwrap();
    assert!(response.job_complete);
    assert_eq!(response.job_reference.as_ref().unwrap().job_id, "job_abc123");
    assert!(response.page_token.is_none());

    let schema = response.schema.clone().unwrap();
    let frame = frame_from_rows(&schema, &response.rows).unwrap();
    assert_eq!(
        frame.column_names(),
        vec!["id", "name", "score", "active", "signed_up", "avatar", "tags", "address"]
    );
    assert_eq!(frame.columns()[0].data_type, "INTEGER");
    assert_eq!(frame.columns()[6].data_type, "ARRAY<STRING>");
    assert_eq!(frame.num_rows(), 2);

    assert_eq!(frame.get(0, "id"), Some(&Value::Int(1)));
    assert_eq!(frame.get(0, "name"), Some(&Value::from("alice")));
    assert_eq!(frame.get(0, "score"), Some(&Value::Float(1.5)));
    assert_eq!(frame.get(0, "active"), Some(&Value::Bool(true)));
    assert_eq!(
        frame.get(0, "signed_up"),
        Some(&Value::from("2024-01-02T03:04:05Z"))
    );
    assert_eq!(frame.get(0, "avatar"), Some(&Value::Bytes(vec![0, 1, b'z', b'd'])));
    assert_eq!(frame.get(0, "tags"), Some(&Value::from(r#"["a","b"]"#)));
    assert_eq!(
        frame.get(0, "address"),
        Some(&Value::from(r#"{"city":"Tokyo","zip":1000001}"#))
    );

    assert_eq!(frame.get(1, "name"), Some(&Value::Null));
    assert_eq!(frame.get(1, "active"), Some(&Value::Bool(false)));
    assert_eq!(frame.get(1, "tags"), Some(&Value::from("[]")));
    assert_eq!(frame.get(1, "address"), Some(&Value::Null));
}

#[test]
fn test_incomplete_job_response() {
    let response: QueryResponse = serde_json::from_str(
        r#"{"jobReference": {"projectId": "p", "jobId": "job_1", "location": "EU"}, "jobComplete": false}"#,
    )
    .unwrap();
    assert!(!response.job_complete);
    assert!(response.schema.is_none());
    let job = job_reference(&response, "SELECT 1").unwrap();
    assert_eq!(job.location.as_deref(), Some("EU"));
}

#[test]
fn test_dml_response_has_no_schema() {
    let response: QueryResponse = serde_json::from_str(
        r#"{"jobReference": {"projectId": "p", "jobId": "job_2"}, "jobComplete": true, "numDmlAffectedRows": "3"}"#,
    )
    .unwrap();
    assert_eq!(response.num_dml_affected_rows.as_deref(), Some("3"));
    let frame = frame_from_rows(&TableSchema::default(), &response.rows).unwrap();
    assert_eq!(frame.num_columns(), 0);
    assert!(frame.is_empty());
}

#[test]
fn test_decode_scalars() {
    assert_eq!(decode_cell(&json!("42"), &field("n", "INT64")), Value::Int(42));
    assert_eq!(decode_cell(&json!("0.25"), &field("n", "NUMERIC")), Value::Float(0.25));
    assert_eq!(decode_cell(&json!("2024-03-01"), &field("d", "DATE")), Value::from("2024-03-01"));
    assert_eq!(decode_cell(&json!(null), &field("d", "INT64")), Value::Null);
    // Float-seconds timestamps from responses without int64 formatting
    assert_eq!(
        decode_cell(&json!("1.704164645E9"), &field("t", "TIMESTAMP")),
        Value::from("2024-01-02T03:04:05Z")
    );
    assert_eq!(
        decode_cell(&json!("not-a-number"), &field("n", "INT64")),
        Value::from("not-a-number")
    );
}

#[test]
fn test_transaction_script() {
    let script = transaction_script(&[
        "INSERT INTO t VALUES (1);".to_string(),
        "  UPDATE t SET x = 2 WHERE true ".to_string(),
    ]);
    assert_eq!(
        script,
        "BEGIN\n  BEGIN TRANSACTION;\n  INSERT INTO t VALUES (1);\n  UPDATE t SET x = 2 WHERE true;\n  COMMIT TRANSACTION;\nEXCEPTION WHEN ERROR THEN\n  ROLLBACK TRANSACTION;\n  RAISE USING MESSAGE = @@error.message;\nEND;"
    );
}

#[test]
fn test_bad_request_becomes_query_error() {
    let err = query_error(
        "SELEC 1",
        DbError::Api {
            status: 400,
            message: "Syntax error: Unexpected identifier".to_string(),
        },
    );
    match err {
        DbError::QueryError { sql, message } => {
            assert_eq!(sql, "SELEC 1");
            assert!(message.contains("Syntax error"));
        }
        other => panic!("unexpected error: {other}"),
    }

    let err = query_error(
        "SELECT 1",
        DbError::Api {
            status: 403,
            message: "denied".to_string(),
        },
    );
    assert!(matches!(err, DbError::Api { status: 403, .. }));
}

#[test]
fn test_catalog_for_qualified_names() {
    let dir = TempDir::new().unwrap();
    let db = backend(&dir);
    let catalog = |t: &str| db.catalog_for(&TableName::try_new(t).unwrap());
    assert_eq!(catalog("users"), "`zd-test-project.analytics`.INFORMATION_SCHEMA");
    assert_eq!(catalog("raw.users"), "`zd-test-project.raw`.INFORMATION_SCHEMA");
    assert_eq!(catalog("other-proj.raw.users"), "`other-proj.raw`.INFORMATION_SCHEMA");
}

#[test]
fn test_operations_require_connection() {
    let dir = TempDir::new().unwrap();
    let db = backend(&dir);
    assert!(!db.is_connected());
    assert_eq!(db.db_type(), "bigquery");
    assert!(matches!(
        db.read("SELECT 1", &[]).unwrap_err(),
        DbError::NotConnected { .. }
    ));
    assert!(matches!(
        db.list_tables().unwrap_err(),
        DbError::NotConnected { .. }
    ));
    // Table names are validated before anything touches the network.
    assert!(matches!(
        db.get_table_schema("users; DROP").unwrap_err(),
        DbError::Core(_)
    ));
}

#[test]
fn test_connect_requires_credentials() {
    let dir = TempDir::new().unwrap();
    let mut db = backend(&dir);
    let err = db.connect().unwrap_err();
    assert!(matches!(err, DbError::Auth(_)));
    assert!(err.is_connection_error());
    assert!(!db.is_connected());
}

#[test]
fn test_describe() {
    let dir = TempDir::new().unwrap();
    let db = backend(&dir);
    assert_eq!(
        db.describe(),
        "BigQuery Database Connection: bigquery://zd-test-project/analytics"
    );
    assert!(db.as_sql().is_some());
}
