//! HTTP surface end to end:
//! 1) Start the router in-process on an ephemeral port, backed by a scripted connection.
//! 2) Drive every route with reqwest.
//! 3) Check status codes, the response envelope, and the SQL that reached the connection.

mod common;

use common::{service_with, users_record, FakeConnection};
use crud_generator::{transport, TableConfigRecord};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use utoipa::OpenApi;

struct TestServer {
    base_url: String,
    conn: Arc<FakeConnection>,
    store: Arc<crud_generator::MemoryConfigStore>,
    client: reqwest::Client,
}

async fn start_server(conn: FakeConnection) -> Result<TestServer, Box<dyn std::error::Error>> {
    start_server_with(conn, vec![users_record()]).await
}

async fn start_server_with(
    conn: FakeConnection,
    records: Vec<TableConfigRecord>,
) -> Result<TestServer, Box<dyn std::error::Error>> {
    let conn = Arc::new(conn);
    let (crud, store) = service_with(conn.clone(), records).await;
    let router = transport::http::create_router(transport::http::AppState { crud });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;
    Ok(TestServer {
        base_url: format!("http://{}", addr),
        conn,
        store,
        client,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health() -> Result<(), Box<dyn std::error::Error>> {
    let server = start_server(FakeConnection::postgres()).await?;

    let resp = server
        .client
        .get(format!("{}/health", server.base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let body = resp.json::<JsonValue>().await?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("ok"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_route() -> Result<(), Box<dyn std::error::Error>> {
    let conn = FakeConnection::postgres();
    conn.respond("SELECT COUNT(*)", vec![json!({"total": 1})]);
    conn.respond(
        "SELECT id",
        vec![json!({"id": 1, "name": "John", "email": "j@x.io", "age": 40, "status": "active"})],
    );
    let server = start_server(conn).await?;

    let resp = server
        .client
        .get(format!("{}/api/users/list", server.base_url))
        .query(&[
            ("page", "1"),
            ("page_size", "10"),
            ("name", "john"),
            ("search", r#"{"age":{"min":18}}"#),
            ("sort", "age:desc,name"),
        ])
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let body = resp.json::<JsonValue>().await?;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["total"], json!(1));
    assert_eq!(body["data"]["total_pages"], json!(1));
    assert_eq!(body["data"]["data"][0]["name"], json!("John"));

    let select = server.conn.statements_starting_with("SELECT id");
    assert_eq!(
        select[0].sql,
        "SELECT id, name, email, age, status FROM users \
         WHERE name ILIKE $1::text AND age >= $2::int4 \
         ORDER BY age DESC, name ASC LIMIT 10 OFFSET 0"
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_route_sort_defaults_to_ascending() -> Result<(), Box<dyn std::error::Error>> {
    let conn = FakeConnection::postgres();
    conn.respond("SELECT COUNT(*)", vec![json!({"total": 0})]);
    let server = start_server(conn).await?;

    for query in ["sort=name", "sort=name&order=desc"] {
        let resp = server
            .client
            .get(format!("{}/api/users/list?{}", server.base_url, query))
            .send()
            .await?;
        assert_eq!(resp.status(), 200, "{}", query);
    }

    let select = server.conn.statements_starting_with("SELECT id");
    assert_eq!(select.len(), 2);
    assert!(select[0].sql.contains("ORDER BY name ASC "), "{}", select[0].sql);
    assert!(select[1].sql.contains("ORDER BY name DESC "), "{}", select[1].sql);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_list_route_errors() -> Result<(), Box<dyn std::error::Error>> {
    let server = start_server(FakeConnection::postgres()).await?;

    let resp = server
        .client
        .get(format!("{}/api/users/list?sort=email", server.base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), 400);
    let body = resp.json::<JsonValue>().await?;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["code"], json!("NOT_SORTABLE"));

    let resp = server
        .client
        .get(format!("{}/api/ghosts/list", server.base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), 404);
    let body = resp.json::<JsonValue>().await?;
    assert_eq!(body["code"], json!("CONFIG_NOT_FOUND"));

    let resp = server
        .client
        .get(format!("{}/api/users/list", server.base_url))
        .query(&[("search", "{not json")])
        .send()
        .await?;
    assert_eq!(resp.status(), 400);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_create_route() -> Result<(), Box<dyn std::error::Error>> {
    let conn = FakeConnection::postgres();
    conn.respond("INSERT INTO users", vec![json!({"id": 101})]);
    let server = start_server(conn).await?;
    let url = format!("{}/api/users/create", server.base_url);

    let resp = server
        .client
        .post(&url)
        .json(&json!({"name": "Ann", "email": "ann@x.io", "is_admin": true}))
        .send()
        .await?;
    assert_eq!(resp.status(), 201);
    let body = resp.json::<JsonValue>().await?;
    assert_eq!(body["data"]["success"], json!(true));
    assert_eq!(body["data"]["id"], json!(101));
    let insert = &server.conn.statements_starting_with("INSERT")[0];
    assert!(!insert.sql.contains("is_admin"));

    let resp = server
        .client
        .post(&url)
        .json(&json!({"name": "A", "age": 500}))
        .send()
        .await?;
    assert_eq!(resp.status(), 400);
    let body = resp.json::<JsonValue>().await?;
    assert_eq!(body["code"], json!("VALIDATION_FAILED"));
    let errors = body["data"]["errors"].as_array().cloned().unwrap_or_default();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["field"], json!("name"));
    assert_eq!(errors[1]["tag"], json!("max"));

    let resp = server.client.post(&url).json(&json!([1, 2])).send().await?;
    assert_eq!(resp.status(), 422);

    let resp = server
        .client
        .post(&url)
        .header("content-type", "application/json")
        .body("{broken")
        .send()
        .await?;
    assert_eq!(resp.status(), 422);
    let body = resp.json::<JsonValue>().await?;
    assert_eq!(body["code"], json!("INVALID_BODY"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_and_delete_routes() -> Result<(), Box<dyn std::error::Error>> {
    let server = start_server(FakeConnection::postgres()).await?;

    let resp = server
        .client
        .put(format!("{}/api/users/update/7", server.base_url))
        .json(&json!({"name": "Bob", "age": "41"}))
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let body = resp.json::<JsonValue>().await?;
    assert_eq!(body["data"]["rows_affected"], json!(1));
    let update = &server.conn.statements_starting_with("UPDATE")[0];
    assert_eq!(update.args, vec![json!("Bob"), json!(41), json!(7)]);

    let resp = server
        .client
        .put(format!("{}/api/users/update/7", server.base_url))
        .json(&json!({"name": ""}))
        .send()
        .await?;
    assert_eq!(resp.status(), 400);

    server.conn.set_rows_affected(0);
    let resp = server
        .client
        .delete(format!("{}/api/users/delete/8", server.base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let body = resp.json::<JsonValue>().await?;
    assert_eq!(body["data"]["success"], json!(true));
    assert_eq!(body["data"]["rows_affected"], json!(0));

    let resp = server
        .client
        .delete(format!("{}/api/users/delete/eight", server.base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), 400);
    let body = resp.json::<JsonValue>().await?;
    assert_eq!(body["code"], json!("INVALID_KEY"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_text_key_path_is_not_reinterpreted() -> Result<(), Box<dyn std::error::Error>> {
    let mut codes = TableConfigRecord::new(
        "codes",
        "codes",
        "CREATE TABLE codes (code VARCHAR(10) PRIMARY KEY, label TEXT)",
    );
    codes.display_fields = Some(json!([{"field": "code"}, {"field": "label"}]).to_string());
    codes.updatable_fields = Some(json!([{"field": "label", "label": "Label"}]).to_string());
    let server = start_server_with(FakeConnection::postgres(), vec![codes]).await?;

    let resp = server
        .client
        .put(format!("{}/api/codes/update/007", server.base_url))
        .json(&json!({"label": "x"}))
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let update = &server.conn.statements_starting_with("UPDATE")[0];
    assert_eq!(update.args, vec![json!("x"), json!("007")]);

    let resp = server
        .client
        .delete(format!("{}/api/codes/delete/007", server.base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let delete = &server.conn.statements_starting_with("DELETE")[0];
    assert_eq!(delete.args, vec![json!("007")]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dict_schema_and_refresh_routes() -> Result<(), Box<dyn std::error::Error>> {
    let conn = FakeConnection::postgres();
    conn.respond(
        "SELECT DISTINCT status",
        vec![json!({"status": "active"}), json!({"status": "banned"})],
    );
    let server = start_server(conn).await?;

    let resp = server
        .client
        .get(format!("{}/api/users/dict/status", server.base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let body = resp.json::<JsonValue>().await?;
    assert_eq!(
        body["data"],
        json!([
            {"value": "active", "label": "active"},
            {"value": "banned", "label": "banned"}
        ])
    );

    let resp = server
        .client
        .get(format!("{}/api/users/dict/name", server.base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), 422);

    let resp = server
        .client
        .get(format!("{}/api/users/schema", server.base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let body = resp.json::<JsonValue>().await?;
    assert_eq!(body["data"]["version"], json!(1));
    assert_eq!(body["data"]["schema"]["table_name"], json!("users"));
    assert_eq!(body["data"]["schema"]["columns"][1]["sql_type"], json!("varchar"));
    assert_eq!(body["data"]["config"]["search_fields"][0]["type"], json!("fuzzy"));

    server.store.save(users_record()).await;
    let resp = server
        .client
        .post(format!("{}/api/users/refresh", server.base_url))
        .send()
        .await?;
    assert_eq!(resp.status(), 200);
    let body = resp.json::<JsonValue>().await?;
    assert_eq!(body["data"]["version"], json!(2));
    assert_eq!(body["data"]["columns"], json!(6));
    Ok(())
}

#[test]
fn test_openapi_document_references_schemas() -> Result<(), Box<dyn std::error::Error>> {
    let doc = serde_json::to_value(transport::http::ApiDoc::openapi())?;
    let schema_ref = |op: &JsonValue, status: &str| {
        op["responses"][status]["content"]["application/json"]["schema"].clone()
    };

    let list = &doc["paths"]["/api/{config}/list"]["get"];
    assert_eq!(
        schema_ref(list, "200")["$ref"],
        json!("#/components/schemas/QueryResult")
    );
    let order = list["parameters"]
        .as_array()
        .and_then(|ps| ps.iter().find(|p| p["name"] == json!("order")))
        .ok_or("order parameter missing")?;
    assert!(order["description"].as_str().unwrap_or("").contains("default asc"));

    let create = &doc["paths"]["/api/{config}/create"]["post"];
    assert_eq!(
        schema_ref(create, "201")["$ref"],
        json!("#/components/schemas/CreateResult")
    );
    let update = &doc["paths"]["/api/{config}/update/{id}"]["put"];
    assert_eq!(
        update["requestBody"]["content"]["application/json"]["schema"]["$ref"],
        json!("#/components/schemas/RecordBody")
    );
    assert_eq!(
        schema_ref(update, "200")["$ref"],
        json!("#/components/schemas/MutationResult")
    );
    let dict = &doc["paths"]["/api/{config}/dict/{field}"]["get"];
    assert_eq!(
        schema_ref(dict, "200")["items"]["$ref"],
        json!("#/components/schemas/DictItem")
    );

    for name in ["QueryResult", "CreateResult", "MutationResult", "DictItem", "RecordBody"] {
        assert!(doc["components"]["schemas"].get(name).is_some(), "{} not registered", name);
    }
    Ok(())
}
