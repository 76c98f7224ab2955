//! Orchestrator behavior against a scripted connection.

mod common;

use common::{object, service_with, users_record, FakeConnection};
use crud_generator::domain::schema::CatalogColumn;
use crud_generator::{DictItem, Error, QueryParams, TableConfigRecord};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

const ACCOUNTS_DDL: &str = "CREATE TABLE accounts (
    id SERIAL PRIMARY KEY,
    role_id INT,
    tier VARCHAR(10),
    status VARCHAR(20)
)";

fn accounts_record() -> TableConfigRecord {
    let mut record = TableConfigRecord::new("accounts", "accounts", ACCOUNTS_DDL);
    record.search_fields = Some(
        json!([
            {"field": "role_id", "type": "single", "dict_source": {
                "table": "roles", "field": "id", "label_field": "title", "where": "active = true"
            }},
            {"field": "tier", "type": "single", "dict_source": "gold\nsilver\nbronze"},
            {"field": "status", "type": "multi_select", "dict_source": "status"},
            {"field": "id", "type": "range"}
        ])
        .to_string(),
    );
    record
}

const TICKETS_DDL: &str = "CREATE TABLE tickets (id INT PRIMARY KEY, title TEXT NOT NULL)";

fn tickets_record() -> TableConfigRecord {
    let mut record = TableConfigRecord::new("tickets", "tickets", TICKETS_DDL);
    record.creatable_fields = Some(
        json!([
            {"field": "id", "default_type": "auto_increment"},
            {"field": "title", "required": true}
        ])
        .to_string(),
    );
    record
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_runs_count_then_page() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Arc::new(FakeConnection::postgres());
    conn.respond("SELECT COUNT(*)", vec![json!({"total": 25})]);
    conn.respond(
        "SELECT id, name",
        vec![
            json!({"id": 11, "name": "John", "email": null, "age": 30, "status": "active"}),
            json!({"id": 12, "name": "Johnny", "email": null, "age": 31, "status": "active"}),
        ],
    );
    let (crud, _) = service_with(conn.clone(), vec![users_record()]).await;

    let params = QueryParams {
        page: 2,
        page_size: 10,
        search: object(json!({"name": "john"})),
        ..Default::default()
    };
    let result = crud.list("users", &params).await?;

    assert_eq!(result.total, 25);
    assert_eq!(result.page, 2);
    assert_eq!(result.page_size, 10);
    assert_eq!(result.total_pages, 3);
    assert_eq!(result.data.len(), 2);
    assert_eq!(result.data[0].get("name"), Some(&json!("John")));

    let sql: Vec<String> = conn.statements().into_iter().map(|s| s.sql).collect();
    assert_eq!(
        sql,
        vec![
            "SELECT COUNT(*) AS total FROM users WHERE name ILIKE $1::text".to_string(),
            "SELECT id, name, email, age, status FROM users WHERE name ILIKE $1::text LIMIT 10 OFFSET 10"
                .to_string(),
        ]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_without_pagination_reports_single_page() -> Result<(), Box<dyn std::error::Error>>
{
    let conn = Arc::new(FakeConnection::postgres());
    conn.respond("SELECT COUNT(*)", vec![json!({"total": "3"})]);
    let mut record = users_record();
    record.pagination = false;
    let (crud, _) = service_with(conn, vec![record]).await;

    let result = crud.list("users", &QueryParams::default()).await?;
    assert_eq!(
        (result.total, result.page, result.page_size, result.total_pages),
        (3, 1, 3, 1)
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_rejects_bad_requests_before_querying() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Arc::new(FakeConnection::postgres());
    let (crud, _) = service_with(conn.clone(), vec![users_record()]).await;

    let params = QueryParams {
        search: object(json!({"age": [1, 2, 3]})),
        ..Default::default()
    };
    let err = crud.list("users", &params).await.unwrap_err();
    assert!(matches!(err, Error::MalformedFilter { .. }));
    assert_eq!(err.status_code(), 400);
    assert!(conn.statements().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_create_returns_generated_id() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Arc::new(FakeConnection::postgres());
    conn.respond("INSERT INTO users", vec![json!({"id": 42})]);
    let (crud, _) = service_with(conn.clone(), vec![users_record()]).await;

    let result = crud
        .create("users", &object(json!({"name": "Ann", "age": 33})))
        .await?;
    assert!(result.success);
    assert_eq!(result.id, Some(json!(42)));
    assert!(result.errors.is_empty());

    let inserts = conn.statements_starting_with("INSERT");
    assert_eq!(inserts.len(), 1);
    assert!(inserts[0].sql.ends_with("RETURNING id"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_create_on_mysql_uses_last_insert_id() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Arc::new(FakeConnection::mysql());
    conn.set_last_insert_id(Some(7));
    let (crud, _) = service_with(conn.clone(), vec![users_record()]).await;

    let result = crud.create("users", &object(json!({"name": "Ann"}))).await?;
    assert!(result.success);
    assert_eq!(result.id, Some(json!(7)));
    assert_eq!(
        conn.statements()[0].sql,
        "INSERT INTO users (name, status, created_at) VALUES (?, ?, NOW())"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_create_validation_failure_writes_nothing() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Arc::new(FakeConnection::postgres());
    let (crud, _) = service_with(conn.clone(), vec![users_record()]).await;

    let result = crud
        .create(
            "users",
            &object(json!({"email": "not-an-email", "age": "old"})),
        )
        .await?;
    assert!(!result.success);
    assert_eq!(result.id, None);
    let tags: Vec<&str> = result.errors.iter().map(|e| e.tag.as_str()).collect();
    assert_eq!(tags, vec!["required", "pattern", "numeric"]);
    assert!(conn.statements().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_auto_increment_reads_next_value() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Arc::new(FakeConnection::postgres());
    conn.respond("SELECT CAST(COALESCE(MAX(id)", vec![json!({"next_value": 6})]);
    conn.respond("INSERT INTO tickets", vec![json!({"id": 6})]);
    let (crud, _) = service_with(conn.clone(), vec![tickets_record()]).await;

    let result = crud.create("tickets", &object(json!({"title": "jam"}))).await?;
    assert_eq!(result.id, Some(json!(6)));

    let sql: Vec<String> = conn.statements().into_iter().map(|s| s.sql).collect();
    assert_eq!(
        sql,
        vec![
            "SELECT CAST(COALESCE(MAX(id), 0) + 1 AS BIGINT) AS next_value FROM tickets".to_string(),
            "INSERT INTO tickets (id, title) VALUES ($1::int4, $2::text) RETURNING id".to_string(),
        ]
    );
    Ok(())
}

/// The MAX+1 lookup and the insert are separate statements: two creates that
/// observe the same maximum both try to insert the same id.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_auto_increment_is_not_safe_under_concurrency() -> Result<(), Box<dyn std::error::Error>>
{
    let conn = Arc::new(FakeConnection::postgres());
    conn.respond("SELECT CAST(COALESCE(MAX(id)", vec![json!({"next_value": 6})]);
    let (crud, _) = service_with(conn.clone(), vec![tickets_record()]).await;

    let a = object(json!({"title": "first"}));
    let b = object(json!({"title": "second"}));
    let (ra, rb) = tokio::join!(crud.create("tickets", &a), crud.create("tickets", &b));
    ra?;
    rb?;

    let ids: Vec<serde_json::Value> = conn
        .statements_starting_with("INSERT INTO tickets")
        .into_iter()
        .map(|s| s.args[0].clone())
        .collect();
    assert_eq!(ids, vec![json!(6), json!(6)]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_auto_increment_without_next_value_fails() {
    let conn = Arc::new(FakeConnection::postgres());
    let (crud, _) = service_with(conn.clone(), vec![tickets_record()]).await;

    let err = crud
        .create("tickets", &object(json!({"title": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
    assert!(conn.statements_starting_with("INSERT").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_and_delete() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Arc::new(FakeConnection::postgres());
    let (crud, _) = service_with(conn.clone(), vec![users_record()]).await;

    let updated = crud
        .update("users", &json!(5), &object(json!({"name": "Bea", "id": 9})))
        .await?;
    assert!(updated.success);
    assert_eq!(updated.rows_affected, 1);
    let stmt = &conn.statements()[0];
    assert_eq!(stmt.sql, "UPDATE users SET name = $1::text WHERE id = $2::int4");
    assert_eq!(stmt.args, vec![json!("Bea"), json!(5)]);

    // a missing row is not an error
    conn.set_rows_affected(0);
    let deleted = crud.delete("users", &json!("404")).await?;
    assert!(deleted.success);
    assert_eq!(deleted.rows_affected, 0);
    assert_eq!(conn.statements()[1].sql, "DELETE FROM users WHERE id = $1::int4");

    let invalid = crud
        .update("users", &json!(5), &object(json!({"name": ""})))
        .await?;
    assert!(!invalid.success);
    assert_eq!(invalid.errors[0].tag, "required");
    assert_eq!(conn.statements().len(), 2);

    let bad_key = crud.delete("users", &json!("five")).await.unwrap_err();
    assert!(matches!(bad_key, Error::InvalidKey { .. }));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dictionaries() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Arc::new(FakeConnection::postgres());
    conn.respond(
        "SELECT DISTINCT id, title FROM roles",
        vec![
            json!({"id": 1, "title": "Admin"}),
            json!({"id": 2, "title": null}),
        ],
    );
    conn.respond(
        "SELECT DISTINCT status FROM accounts",
        vec![json!({"status": "active"}), json!({"status": "closed"})],
    );
    let (crud, _) = service_with(conn.clone(), vec![accounts_record()]).await;

    let roles = crud.get_dict("accounts", "role_id").await?;
    assert_eq!(
        roles,
        vec![
            DictItem {
                value: json!(1),
                label: "Admin".into()
            },
            DictItem {
                value: json!(2),
                label: "2".into()
            },
        ]
    );
    assert_eq!(
        conn.statements()[0].sql,
        "SELECT DISTINCT id, title FROM roles WHERE id IS NOT NULL AND (active = true) ORDER BY id ASC"
    );

    let tiers: Vec<String> = crud
        .get_dict("accounts", "tier")
        .await?
        .into_iter()
        .map(|i| i.label)
        .collect();
    assert_eq!(tiers, vec!["gold", "silver", "bronze"]);
    assert_eq!(conn.statements().len(), 1);

    let statuses = crud.get_dict("accounts", "status").await?;
    assert_eq!(statuses[1].value, json!("closed"));
    assert_eq!(
        conn.statements()[1].sql,
        "SELECT DISTINCT status FROM accounts WHERE status IS NOT NULL ORDER BY status ASC"
    );

    let none = crud.get_dict("accounts", "id").await.unwrap_err();
    assert!(matches!(none, Error::Dictionary { .. }));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cache_serves_until_refresh() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Arc::new(FakeConnection::postgres());
    let (crud, store) = service_with(conn, vec![users_record()]).await;

    let first = crud.resolve("users").await?;
    assert_eq!(first.version, 1);
    assert!(first.config.pagination);

    let mut changed = users_record();
    changed.pagination = false;
    let saved = store.save(changed).await;
    assert_eq!(saved.version, 2);

    // still cached
    assert!(crud.config("users").await?.pagination);

    let refreshed = crud.refresh("users").await?;
    assert_eq!(refreshed.version, 2);
    assert!(!crud.config("users").await?.pagination);

    assert!(store.deactivate("users").await);
    assert!(matches!(
        crud.refresh("users").await,
        Err(Error::ConfigNotFound { .. })
    ));
    assert!(matches!(
        crud.resolve("users").await,
        Err(Error::ConfigNotFound { .. })
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_refresh_all_drops_every_entry() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Arc::new(FakeConnection::postgres());
    let (crud, _) = service_with(conn, vec![users_record(), accounts_record()]).await;
    crud.resolve("users").await?;
    crud.resolve("accounts").await?;
    assert_eq!(crud.refresh_all().await, 2);
    assert_eq!(crud.refresh_all().await, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_configuration_and_connection() {
    let conn = Arc::new(FakeConnection::postgres());
    let mut elsewhere = users_record();
    elsewhere.name = "remote_users".into();
    elsewhere.connection_id = "reporting".into();
    let (crud, _) = service_with(conn, vec![elsewhere]).await;

    let err = crud.schema("nope").await.unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound { ref name } if name == "nope"));
    assert_eq!(err.status_code(), 404);

    let err = crud.schema("remote_users").await.unwrap_err();
    assert!(matches!(err, Error::ConnectionNotFound { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_schema_from_catalog_when_no_ddl_is_stored() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Arc::new(FakeConnection::postgres());
    conn.add_catalog(
        "items",
        vec![
            CatalogColumn {
                name: "id".into(),
                data_type: "bigint".into(),
                default: Some("nextval('items_id_seq'::regclass)".into()),
                primary_key: true,
                ..Default::default()
            },
            CatalogColumn {
                name: "label".into(),
                data_type: "text".into(),
                is_nullable: true,
                ..Default::default()
            },
        ],
    );
    let (crud, _) = service_with(
        conn,
        vec![
            TableConfigRecord::new("items", "items", ""),
            TableConfigRecord::new("ghosts", "ghosts", "  "),
        ],
    )
    .await;

    let schema = crud.schema("items").await?;
    assert_eq!(schema.column_names(), vec!["id", "label"]);
    assert!(schema.primary_keys()[0].auto_increment);

    // derived configuration: everything displayed, auto ids not creatable
    let config = crud.config("items").await?;
    assert_eq!(config.display_fields.len(), 2);
    let creatable: Vec<&str> = config
        .creatable_fields
        .iter()
        .map(|c| c.field.as_str())
        .collect();
    assert_eq!(creatable, vec!["label"]);

    assert!(matches!(
        crud.schema("ghosts").await,
        Err(Error::Config { .. })
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_validate_record_checks_the_live_catalog() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Arc::new(FakeConnection::postgres());
    let (crud, _) = service_with(conn.clone(), vec![]).await;

    // table missing
    let err = crud.validate_record(&accounts_record()).await.unwrap_err();
    assert!(matches!(err, Error::Config { .. }));

    // dictionary table missing
    conn.add_table("accounts", &["id", "role_id", "tier", "status"]);
    let err = crud.validate_record(&accounts_record()).await.unwrap_err();
    assert!(matches!(err, Error::Dictionary { ref message } if message.contains("roles")));

    // label column missing
    conn.add_table("roles", &["id"]);
    let err = crud.validate_record(&accounts_record()).await.unwrap_err();
    assert!(matches!(err, Error::Dictionary { ref message } if message.contains("title")));

    conn.add_table("roles", &["id", "title"]);
    let config = crud.validate_record(&accounts_record()).await?;
    assert_eq!(config.search_fields.len(), 4);

    // references to unknown columns never reach the catalog
    let mut broken = accounts_record();
    broken.display_fields = Some(json!([{"field": "nickname"}]).to_string());
    let err = crud.validate_record(&broken).await.unwrap_err();
    assert!(matches!(err, Error::Config { ref message } if message.contains("nickname")));
    Ok(())
}
