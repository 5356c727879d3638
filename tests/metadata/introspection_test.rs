//! Schema discovery and table definitions from scripted osquery answers.

use std::sync::Arc;

use osquery_bridge::bridge::test_utils::ScriptedChannel;
use osquery_bridge::catalog::DescriptionCatalog;
use osquery_bridge::config::Settings;
use osquery_bridge::metadata::{
    describe_table, list_tables, ChannelSchemaProvider, ColumnType, SchemaError, SchemaProvider,
    SqlType,
};
use osquery_bridge::registry::ConnectionRegistry;
use osquery_bridge::sql::{QualifierInput, LIST_TABLES};
use osquery_bridge::table::TableDefinition;
use serde_json::json;

fn osquery() -> ScriptedChannel {
    ScriptedChannel::new()
        .with_response(
            LIST_TABLES,
            json!([{"name": "processes"}, {"name": "users"}, {"name": "uptime"}]),
        )
        .with_response(
            "PRAGMA table_info(users);",
            json!([
                {"cid": "0", "name": "uid", "type": "BIGINT", "notnull": "0", "pk": "1"},
                {"cid": "1", "name": "gid", "type": "BIGINT", "notnull": "0", "pk": "0"},
                {"cid": "2", "name": "username", "type": "TEXT", "notnull": "0", "pk": "0"}
            ]),
        )
        .with_response(
            "PRAGMA table_info(uptime);",
            json!([
                {"name": "days", "type": "INTEGER", "pk": "0"},
                {"name": "total_seconds", "type": "BIGINT", "pk": "0"}
            ]),
        )
        .with_failure("PRAGMA table_info(processes);", "extension went away")
        .with_response(
            r#"SELECT * FROM users WHERE "uid" = "0""#,
            json!([{"uid": "0", "gid": "0", "username": "root"}]),
        )
}

#[tokio::test]
async fn test_discover_all_tables() {
    let provider = ChannelSchemaProvider::new(Arc::new(osquery()));

    let tables = provider.list_tables().await.unwrap();
    assert_eq!(tables, vec!["processes", "users", "uptime"]);

    let described = provider.describe_tables(&tables).await;
    let ok: Vec<&str> = described
        .iter()
        .filter(|(_, result)| result.is_ok())
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(ok, vec!["users", "uptime"]);

    let (name, failed) = &described[0];
    assert_eq!(name, "processes");
    assert!(matches!(failed, Err(SchemaError::Query(_))));
}

#[tokio::test]
async fn test_primary_key_rules() {
    let channel = osquery();

    let users = describe_table(&channel, "users").await.unwrap();
    assert_eq!(users.primary_key().unwrap().name, "uid");
    assert_eq!(users.column("gid").unwrap().sql_type, SqlType::BigInt);

    // No pk marker: the first column is the key.
    let uptime = describe_table(&channel, "uptime").await.unwrap();
    assert_eq!(uptime.primary_key().unwrap().name, "days");
    assert_eq!(uptime.columns.iter().filter(|c| c.is_primary_key).count(), 1);
}

#[tokio::test]
async fn test_empty_registry() {
    let channel = ScriptedChannel::new().with_response(LIST_TABLES, json!([]));
    assert!(list_tables(&channel).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_definition_with_descriptions() {
    let catalog = DescriptionCatalog::from_json(
        r#"[{
            "name": "users",
            "description": "Local user accounts (including domain accounts that have logged on locally (Windows)).",
            "examples": ["select * from users where uid = 0"],
            "columns": [
                {"name": "uid", "description": "User ID"},
                {"name": "username", "description": "Username"}
            ]
        }]"#,
    )
    .unwrap();
    let schema = describe_table(&osquery(), "users").await.unwrap();
    let table = TableDefinition::build(&schema, &catalog);

    assert!(table.description.starts_with("Local user accounts"));
    assert_eq!(table.primary_key.as_deref(), Some("uid"));

    let types: Vec<ColumnType> = table.columns.iter().map(|c| c.column_type).collect();
    assert_eq!(types, vec![ColumnType::Int, ColumnType::Int, ColumnType::String]);

    let descriptions: Vec<&str> = table.columns.iter().map(|c| c.description.as_str()).collect();
    assert_eq!(descriptions, vec!["User ID", "", "Username"]);
}

#[tokio::test]
async fn test_registry_end_to_end() {
    let registry = ConnectionRegistry::new(Settings::default());
    let channel = Arc::new(osquery());
    registry.insert("local", channel.clone());

    let table = registry.table_definition("local", "users").await.unwrap();
    assert_eq!(table.description, "osquery table: users");

    let root = registry.get_row("local", "users", Some("uid = 0")).await.unwrap();
    assert_eq!(root["username"], "root");

    let rows = registry
        .list_rows("local", "users", &QualifierInput::equality("uid = 0"))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    // The schema lookup was issued once even though the definition and
    // the rows both needed the table.
    registry.table_schema("local", "users").await.unwrap();
    let pragma_calls = channel
        .queries()
        .iter()
        .filter(|q| q.starts_with("PRAGMA"))
        .count();
    assert_eq!(pragma_calls, 1);

    registry.close_all();
    assert!(channel.is_stopped());
}
