use super::*;
use std::fs;
use tempfile::TempDir;

fn resolver_with(files: &[(&str, &str)]) -> (TempDir, TemplateResolver) {
    let dir = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(dir.path().join(name), content).unwrap();
    }
    let resolver = TemplateResolver::new(dir.path());
    (dir, resolver)
}

fn vars(pairs: &[(&str, serde_json::Value)]) -> TemplateVars {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

#[test]
fn test_render_substitutes_variables() {
    let (_dir, resolver) = resolver_with(&[(
        "users_by_age.sql",
        "SELECT * FROM t WHERE age BETWEEN {{min_age}} AND {{max_age}}",
    )]);
    let sql = resolver
        .render(
            "users_by_age",
            &vars(&[
                ("min_age", serde_json::json!(18)),
                ("max_age", serde_json::json!(30)),
            ]),
        )
        .unwrap();
    assert_eq!(sql, "SELECT * FROM t WHERE age BETWEEN 18 AND 30");
}

#[test]
fn test_sql_suffix_is_optional() {
    let (_dir, resolver) = resolver_with(&[("count.sql", "SELECT COUNT(*) FROM t")]);
    let empty = TemplateVars::new();
    assert_eq!(
        resolver.render("count", &empty).unwrap(),
        resolver.render("count.sql", &empty).unwrap()
    );
    assert_eq!(
        resolver.template_path("count"),
        resolver.sql_dir().join("count.sql")
    );
}

#[test]
fn test_render_is_deterministic() {
    let (_dir, resolver) = resolver_with(&[(
        "q.sql",
        "SELECT {{ cols | join(', ') }} FROM {{ table }}",
    )]);
    let v = vars(&[
        ("cols", serde_json::json!(["a", "b"])),
        ("table", serde_json::json!("events")),
    ]);
    let first = resolver.render("q", &v).unwrap();
    let second = resolver.render("q", &v).unwrap();
    assert_eq!(first, "SELECT a, b FROM events");
    assert_eq!(first, second);
}

#[test]
fn test_undefined_variable_is_an_error() {
    let (_dir, resolver) = resolver_with(&[(
        "q.sql",
        "SELECT * FROM t WHERE age > {{ min_age }}",
    )]);
    let err = resolver.render("q", &TemplateVars::new()).unwrap_err();
    match err {
        JinjaError::UndefinedVariable { name, template } => {
            assert_eq!(name, "min_age");
            assert_eq!(template, "q.sql");
        }
        other => panic!("expected UndefinedVariable, got {other}"),
    }
}

#[test]
fn test_undefined_variable_in_condition_is_an_error() {
    let (_dir, resolver) = resolver_with(&[(
        "q.sql",
        "SELECT * FROM t{% if active %} WHERE active{% endif %}",
    )]);
    let err = resolver.render("q", &TemplateVars::new()).unwrap_err();
    assert!(matches!(err, JinjaError::UndefinedVariable { .. }), "{err}");
}

#[test]
fn test_optional_block_with_is_defined() {
    let (_dir, resolver) = resolver_with(&[(
        "q.sql",
        "SELECT *\nFROM users\n{% if active is defined %}\nWHERE active = {{ active }}\n{% endif %}",
    )]);
    let with = resolver
        .render("q", &vars(&[("active", serde_json::json!(true))]))
        .unwrap();
    assert_eq!(with, "SELECT *\nFROM users\nWHERE active = true\n");

    let without = resolver.render("q", &TemplateVars::new()).unwrap();
    assert_eq!(without, "SELECT *\nFROM users\n");
}

#[test]
fn test_include_sibling_template() {
    let (_dir, resolver) = resolver_with(&[
        ("_where.sql", "WHERE id = {{ id }}"),
        ("q.sql", "SELECT * FROM t {% include '_where.sql' %}"),
    ]);
    let sql = resolver
        .render("q", &vars(&[("id", serde_json::json!(7))]))
        .unwrap();
    assert_eq!(sql, "SELECT * FROM t WHERE id = 7");
}

#[test]
fn test_undefined_variable_in_include_is_named() {
    let (_dir, resolver) = resolver_with(&[
        ("_where.sql", "WHERE id = {{ user_id }}"),
        ("q.sql", "SELECT * FROM t {% include '_where.sql' %}"),
    ]);
    let err = resolver.render("q", &TemplateVars::new()).unwrap_err();
    match err {
        JinjaError::UndefinedVariable { name, template } => {
            assert_eq!(name, "user_id");
            assert_eq!(template, "q.sql");
        }
        other => panic!("expected UndefinedVariable, got {other}"),
    }
}

#[test]
fn test_missing_attribute_is_named() {
    let (_dir, resolver) = resolver_with(&[("q.sql", "SELECT '{{ user.nme }}'")]);
    let err = resolver
        .render("q", &vars(&[("user", serde_json::json!({"name": "alice"}))]))
        .unwrap_err();
    match err {
        JinjaError::UndefinedVariable { name, .. } => assert_eq!(name, "user.nme"),
        other => panic!("expected UndefinedVariable, got {other}"),
    }
}

#[test]
fn test_missing_template() {
    let (_dir, resolver) = resolver_with(&[]);
    let err = resolver.render("nope", &TemplateVars::new()).unwrap_err();
    match err {
        JinjaError::TemplateNotFound { name, .. } => assert_eq!(name, "nope"),
        other => panic!("expected TemplateNotFound, got {other}"),
    }
}

#[test]
fn test_template_outside_dir_is_not_found() {
    let (_dir, resolver) = resolver_with(&[]);
    let err = resolver
        .render("../etc/passwd", &TemplateVars::new())
        .unwrap_err();
    assert!(matches!(err, JinjaError::TemplateNotFound { .. }));
}

#[test]
fn test_missing_sql_dir() {
    let dir = TempDir::new().unwrap();
    let resolver = TemplateResolver::new(dir.path().join("missing"));
    let err = resolver.render("q", &TemplateVars::new()).unwrap_err();
    assert!(matches!(err, JinjaError::SqlDirNotFound { .. }));
}

#[test]
fn test_file_changes_are_picked_up() {
    let (dir, resolver) = resolver_with(&[("q.sql", "SELECT 1")]);
    assert_eq!(resolver.render("q", &TemplateVars::new()).unwrap(), "SELECT 1");

    fs::write(dir.path().join("q.sql"), "SELECT 2").unwrap();
    assert_eq!(resolver.render("q", &TemplateVars::new()).unwrap(), "SELECT 2");
}

#[test]
fn test_render_with_struct_context() {
    #[derive(serde::Serialize)]
    struct Params {
        table: &'static str,
        limit: u32,
    }

    let (_dir, resolver) = resolver_with(&[(
        "q.sql",
        "SELECT * FROM {{ table | sql_identifier }} LIMIT {{ limit }}",
    )]);
    let sql = resolver
        .render_with(
            "q",
            Params {
                table: "events",
                limit: 5,
            },
        )
        .unwrap();
    assert_eq!(sql, "SELECT * FROM \"events\" LIMIT 5");
}

#[test]
fn test_syntax_error_is_render_error() {
    let (_dir, resolver) = resolver_with(&[("bad.sql", "SELECT {{ x ")]);
    let err = resolver
        .render("bad", &vars(&[("x", serde_json::json!(1))]))
        .unwrap_err();
    assert!(matches!(err, JinjaError::RenderError { .. }), "{err}");
}

#[test]
fn test_render_str() {
    let sql = render_str(
        "SELECT * FROM {{ catalog }}.columns WHERE table_name = {{ placeholder }}",
        serde_json::json!({"catalog": "information_schema", "placeholder": "$1"}),
    )
    .unwrap();
    assert_eq!(
        sql,
        "SELECT * FROM information_schema.columns WHERE table_name = $1"
    );

    let err = render_str("{{ missing }}", serde_json::json!({})).unwrap_err();
    assert!(matches!(err, JinjaError::UndefinedVariable { .. }));
}
