//! Integration tests for query execution against a file-backed SQLite source.

use std::path::PathBuf;

use datapoint::config::ConnectionConfig;
use datapoint::executor::{Database, QueryResponse};
use datapoint::model::Query;
use serde_json::json;

// ============================================================================
// Fixture
// ============================================================================

/// A scratch database file, removed on drop.
struct TempDb {
    path: PathBuf,
}

impl TempDb {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("datapoint-exec-{}.db", uuid::Uuid::new_v4()));
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE customers (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            );
            CREATE TABLE orders (
                id INTEGER PRIMARY KEY,
                customer_id INTEGER NOT NULL REFERENCES customers (id),
                status TEXT NOT NULL DEFAULT 'open',
                total REAL NOT NULL
            );
            INSERT INTO customers VALUES (1, 'Ada'), (2, 'Bob'), (3, 'Cy');
            INSERT INTO orders VALUES
                (1, 1, 'open', 10.0),
                (2, 1, 'paid', 5.5),
                (3, 2, 'open', 7.0),
                (4, 2, 'void', 1.0),
                (5, 3, 'paid', 2.5);
            "#,
        )
        .unwrap();
        Self { path }
    }

    fn open(&self) -> Database {
        Database::open(ConnectionConfig::sqlite(self.path.to_string_lossy())).unwrap()
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn run(db: &Database, query: serde_json::Value) -> QueryResponse {
    let query: Query = serde_json::from_value(query).unwrap();
    db.execute(&query).await
}

fn orders_customers() -> serde_json::Value {
    json!({
        "name": "orders",
        "next": [{
            "name": "customers",
            "rule": {
                "type": "inner",
                "conditions": [{"columns": [{"name": "customer_id"}, {"name": "id"}], "operator": "="}]
            }
        }]
    })
}

async fn order_count(db: &Database, filter: serde_json::Value) -> u64 {
    let response = run(
        db,
        json!({
            "type": "select",
            "table": {"name": "orders"},
            "columns": [{"name": "id", "tableKey": {"name": "orders"}}],
            "where": filter
        }),
    )
    .await;
    assert!(response.is_ok(), "{:?}", response.err);
    response.data.unwrap().total
}

// ============================================================================
// SELECT
// ============================================================================

#[tokio::test]
async fn test_join_aggregate_end_to_end() {
    let fixture = TempDb::new();
    let db = fixture.open();

    let response = run(
        &db,
        json!({
            "type": "select",
            "table": orders_customers(),
            "columns": [
                {"name": "name", "tableKey": {"name": "customers"}, "payload": {"metaKey": "who"}},
                {"name": "total", "tableKey": {"name": "orders"}, "func": "sum", "payload": {"metaKey": "amount"}}
            ],
            "orderBy": [{"name": "name", "tableKey": {"name": "customers"}, "payload": {"order": "ASC"}}]
        }),
    )
    .await;

    assert!(response.is_ok(), "{:?}", response.err);
    assert!(response.raw_sql.as_deref().unwrap().contains("GROUP BY"));

    let data = response.data.unwrap();
    assert_eq!(data.total, 3);
    assert_eq!(data.rules["who"], vec!["customers.name"]);
    assert_eq!(data.rules["amount"], vec!["sum orders.total"]);

    let rows: Vec<serde_json::Value> = data.data.into_iter().map(serde_json::Value::Object).collect();
    assert_eq!(
        rows,
        vec![
            json!({"customers.name": "Ada", "sum orders.total": 15.5}),
            json!({"customers.name": "Bob", "sum orders.total": 8.0}),
            json!({"customers.name": "Cy", "sum orders.total": 2.5}),
        ]
    );
}

#[tokio::test]
async fn test_total_counts_the_whole_result() {
    let fixture = TempDb::new();
    let db = fixture.open();

    let response = run(
        &db,
        json!({
            "type": "select",
            "table": {"name": "orders"},
            "columns": [{"name": "id", "tableKey": {"name": "orders"}}],
            "orderBy": [{"name": "id", "tableKey": {"name": "orders"}}],
            "limit": 2,
            "offset": 1
        }),
    )
    .await;

    let data = response.data.unwrap();
    assert_eq!(data.total, 5);
    assert_eq!(data.data.len(), 2);
    assert_eq!(data.data[0]["orders.id"], 2);
    assert_eq!(data.data[0]["$root_id"], 2);
    assert_eq!(data.data[1]["orders.id"], 3);
    assert!(!data.data[0].contains_key("$$total"));
}

#[tokio::test]
async fn test_list_filter() {
    let fixture = TempDb::new();
    let db = fixture.open();

    let filter = json!([{"name": "status", "tableKey": {"name": "orders"}, "value": ["open", "paid"]}]);
    assert_eq!(order_count(&db, filter).await, 4);

    let filter = json!([{"name": "status", "tableKey": {"name": "orders"}, "value": []}]);
    assert_eq!(order_count(&db, filter).await, 0);
}

#[tokio::test]
async fn test_execute_json() {
    let fixture = TempDb::new();
    let db = fixture.open();

    let body = r#"{
        "type": "select",
        "table": {"name": "customers"},
        "columns": [{"name": "name", "type": "string", "required": true, "tableKey": {"name": "customers", "increment": 0}}],
        "where": [{"name": "id", "tableKey": {"name": "customers"}, "value": 2}]
    }"#;
    let response = db.execute_json(body).await;
    let data = response.data.unwrap();
    assert_eq!(data.total, 1);
    assert_eq!(data.data[0]["customers.name"], "Bob");

    // the wire format omits absent fields
    let json = serde_json::to_value(db.execute_json(body).await).unwrap();
    assert!(json.get("err").is_none());
    assert!(json["rawSql"].is_string());
    assert_eq!(json["data"]["total"], 1);
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn test_write_round_trip() {
    let fixture = TempDb::new();
    let db = fixture.open();

    let insert = run(
        &db,
        json!({
            "type": "insert",
            "table": {"name": "orders"},
            "columns": [
                {"name": "customer_id", "value": 3},
                {"name": "total", "value": 4.0}
            ]
        }),
    )
    .await;
    assert!(insert.is_ok(), "{:?}", insert.err);
    assert!(insert.data.is_none());
    assert!(insert.raw_sql.unwrap().starts_with("INSERT INTO \"orders\""));
    assert_eq!(order_count(&db, json!([])).await, 6);

    let update = run(
        &db,
        json!({
            "type": "update",
            "table": {"name": "orders"},
            "columns": [{"name": "status", "value": "closed"}],
            "where": [{"name": "customer_id", "value": 1}]
        }),
    )
    .await;
    assert!(update.is_ok(), "{:?}", update.err);
    let closed = json!([{"name": "status", "tableKey": {"name": "orders"}, "value": "closed"}]);
    assert_eq!(order_count(&db, closed).await, 2);

    let delete = run(
        &db,
        json!({
            "type": "delete",
            "table": {"name": "orders"},
            "where": [{"name": "status", "value": ["void", "closed"]}]
        }),
    )
    .await;
    assert!(delete.is_ok(), "{:?}", delete.err);
    assert_eq!(order_count(&db, json!([])).await, 3);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_constraint_violation_reports_sql() {
    let fixture = TempDb::new();
    let db = fixture.open();

    let response = run(
        &db,
        json!({
            "type": "insert",
            "table": {"name": "orders"},
            "columns": [{"name": "customer_id", "value": 1}]
        }),
    )
    .await;

    let err = response.err.unwrap();
    assert!(err.starts_with("failed to execute query: "), "{}", err);
    assert!(err.contains("NOT NULL"), "{}", err);
    assert_eq!(
        response.raw_sql.as_deref(),
        Some(r#"INSERT INTO "orders" ("customer_id") VALUES (?)"#)
    );
}

#[tokio::test]
async fn test_unknown_root_table_is_a_parse_error() {
    let fixture = TempDb::new();
    let db = fixture.open();

    let response = run(
        &db,
        json!({
            "type": "select",
            "table": {"name": "ghosts"},
            "columns": [{"name": "id", "tableKey": {"name": "ghosts"}}]
        }),
    )
    .await;

    assert_eq!(
        response.err.as_deref(),
        Some("failed to parse query: table not exists: ghosts")
    );
    assert!(response.raw_sql.is_none());
}

// ============================================================================
// Introspection
// ============================================================================

#[tokio::test]
async fn test_tables() {
    let fixture = TempDb::new();
    let db = fixture.open();

    let tables = serde_json::to_value(db.tables().await.unwrap()).unwrap();
    assert_eq!(
        tables,
        json!([
            {"name": "customers", "columns": [
                {"name": "id", "type": "number", "required": false, "isPKey": true},
                {"name": "name", "type": "string", "required": true, "isPKey": false}
            ]},
            {"name": "orders", "columns": [
                {"name": "customer_id", "type": "number", "required": true, "isPKey": false},
                {"name": "id", "type": "number", "required": false, "isPKey": true},
                {"name": "status", "type": "string", "required": false, "isPKey": false},
                {"name": "total", "type": "number", "required": true, "isPKey": false}
            ]}
        ])
    );

    let orders = db.table("orders").await.unwrap();
    assert_eq!(orders.primary_key().unwrap().name, "id");

    let err = db.table("missing").await.unwrap_err();
    assert_eq!(err.to_string(), "table not exists: missing");
}

#[tokio::test]
async fn test_open_missing_directory_fails() {
    let path = std::env::temp_dir()
        .join(format!("datapoint-missing-{}", uuid::Uuid::new_v4()))
        .join("db.sqlite");
    let err = Database::open(ConnectionConfig::sqlite(path.to_string_lossy())).unwrap_err();
    assert!(err.to_string().starts_with("failed to connect: "), "{}", err);
}
