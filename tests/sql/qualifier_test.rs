//! Qualifier translation through the public API, checked as SQLite.

use osquery_bridge::sql::{
    build_select, translate_equality, QualValue, Qualifier, QualifierError, QualifierInput,
    QualifierSet, ValueRendering,
};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

fn assert_parses(sql: &str) {
    if let Err(e) = Parser::parse_sql(&SQLiteDialect {}, sql) {
        panic!("invalid SQLite: {e}\nSQL: {sql}");
    }
}

fn uid_range() -> QualifierSet {
    QualifierSet::new()
        .with(Qualifier::new("uid", ">", 0))
        .with(Qualifier::new("uid", "<", 500))
}

#[test]
fn test_same_field_predicates_are_anded() {
    let clause = uid_range().to_sql(ValueRendering::Quoted).unwrap().unwrap();
    assert_eq!(clause, r#""uid" > "0" and "uid" < "500""#);
    assert_parses(&build_select("users", Some(&clause)));
}

#[test]
fn test_fields_render_in_name_order() {
    let set = uid_range().with(Qualifier::new("shell", "=", "/bin/sh"));
    let clause = set.to_sql(ValueRendering::Quoted).unwrap().unwrap();

    assert_eq!(
        clause,
        r#""shell" = "/bin/sh" and "uid" > "0" and "uid" < "500""#
    );
}

#[test]
fn test_typed_rendering() {
    let set = QualifierSet::new()
        .with(Qualifier::new("pid", "=", 42))
        .with(Qualifier::new("name", "LIKE", "o'brien%"))
        .with(Qualifier::new("resident_size", ">", 1.5))
        .with(Qualifier::new("on_disk", "=", true))
        .with(Qualifier::new("parent", "IS", QualValue::Null));
    let clause = set.to_sql(ValueRendering::Typed).unwrap().unwrap();

    assert_eq!(
        clause,
        r#""name" LIKE 'o''brien%' and "on_disk" = 1 and "parent" IS NULL and "pid" = 42 and "resident_size" > 1.5"#
    );
    assert_parses(&build_select("processes", Some(&clause)));
}

#[test]
fn test_quoted_values_escape_quotes() {
    let set = QualifierSet::new().with(Qualifier::new("cmdline", "=", r#"say "hi""#));
    let clause = set.to_sql(ValueRendering::Quoted).unwrap().unwrap();

    assert_eq!(clause, r#""cmdline" = "say ""hi""""#);
    assert_parses(&build_select("processes", Some(&clause)));
}

#[test]
fn test_operator_whitelist() {
    let set = QualifierSet::new().with(Qualifier::new("uid", "= 0 OR 1 =", 1));
    assert!(matches!(
        set.to_sql(ValueRendering::Quoted),
        Err(QualifierError::UnsupportedOperator(_))
    ));

    let set = QualifierSet::new().with(Qualifier::new("path", "not  like", "/tmp/%"));
    assert_eq!(
        set.to_sql(ValueRendering::Quoted).unwrap().as_deref(),
        Some(r#""path" not like "/tmp/%""#)
    );
}

#[test]
fn test_equality_translation() {
    assert_eq!(translate_equality("pid = 1").unwrap(), r#""pid" = "1""#);
    assert_eq!(translate_equality("  name=launchd ").unwrap(), r#""name" = "launchd""#);

    assert!(matches!(
        translate_equality("pid 1"),
        Err(QualifierError::Malformed { equals: 0, .. })
    ));
    assert!(matches!(
        translate_equality("a = b = c"),
        Err(QualifierError::Malformed { equals: 2, .. })
    ));
}

#[test]
fn test_input_precedence() {
    let both = QualifierInput {
        rich: Some(uid_range()),
        equality: Some("uid = 0".to_string()),
    };
    assert_eq!(
        both.where_clause(ValueRendering::Quoted).unwrap().as_deref(),
        Some(r#""uid" > "0" and "uid" < "500""#)
    );

    let empty_rich = QualifierInput {
        rich: Some(QualifierSet::new()),
        equality: Some("uid = 0".to_string()),
    };
    assert_eq!(
        empty_rich.where_clause(ValueRendering::Quoted).unwrap().as_deref(),
        Some(r#""uid" = "0""#)
    );

    let malformed = QualifierInput::equality("uid == 0");
    assert_eq!(malformed.where_clause(ValueRendering::Quoted).unwrap(), None);

    assert_eq!(
        QualifierInput::default().where_clause(ValueRendering::Quoted).unwrap(),
        None
    );
}

#[test]
fn test_select_without_where() {
    assert_eq!(build_select("uptime", None), "SELECT * FROM uptime");
    assert_parses("SELECT * FROM uptime");
}
