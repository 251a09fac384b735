//! Integration tests for the source registry and query service.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use datapoint::config::{ConnectionConfig, Settings};
use datapoint::executor::Database;
use datapoint::model::SourceQuery;
use datapoint::service::QueryService;
use datapoint::source::{RegistryError, RegistryResult, SourceRegistry, Sources};
use serde_json::json;

/// A scratch directory, removed on drop.
struct TempDir {
    path: PathBuf,
}

impl TempDir {
    fn new() -> Self {
        let path = std::env::temp_dir().join(format!("datapoint-reg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }

    /// Create a database with one `metrics` table holding `rows` rows.
    fn database(&self, name: &str, rows: i64) -> PathBuf {
        let path = self.path.join(format!("{name}.db"));
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE metrics (id INTEGER PRIMARY KEY, value INTEGER NOT NULL);")
            .unwrap();
        for i in 0..rows {
            conn.execute("INSERT INTO metrics (value) VALUES (?1)", [i]).unwrap();
        }
        path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

fn config(path: &Path) -> ConnectionConfig {
    ConnectionConfig::sqlite(path.to_string_lossy())
}

fn count_request(source: &str) -> SourceQuery {
    serde_json::from_value(json!({
        "sourceId": source,
        "query": {
            "type": "select",
            "table": {"name": "metrics"},
            "columns": [{"name": "value", "tableKey": {"name": "metrics"}}]
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn test_service_routes_by_source_id() {
    let dir = TempDir::new();
    let sources = Sources::new();
    sources.open("small", config(&dir.database("small", 2))).unwrap();
    sources.open("large", config(&dir.database("large", 7))).unwrap();

    let service = QueryService::new(Arc::new(sources));
    let small = service.execute_request(&count_request("small")).await.unwrap();
    let large = service.execute_request(&count_request("large")).await.unwrap();

    assert_eq!(small.data.unwrap().total, 2);
    assert_eq!(large.data.unwrap().total, 7);
}

#[tokio::test]
async fn test_missing_source_is_an_error_not_a_response() {
    let service = QueryService::new(Arc::new(Sources::new()));
    let err = service.execute_request(&count_request("nope")).await.unwrap_err();
    assert!(matches!(err, RegistryError::SourceNotFound(ref id) if id == "nope"));
    assert_eq!(err.to_string(), "source not found: nope");

    assert!(service.tables("nope").await.is_err());
    assert!(service.functions("nope").await.is_err());
}

#[tokio::test]
async fn test_concurrent_queries_and_registration() {
    let dir = TempDir::new();
    let sources = Arc::new(Sources::new());
    sources.open("base", config(&dir.database("base", 3))).unwrap();
    let service = QueryService::new(Arc::clone(&sources));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let service = service.clone();
        let sources = Arc::clone(&sources);
        let path = dir.database(&format!("extra{i}"), i);
        tasks.push(tokio::spawn(async move {
            let id = format!("extra{i}");
            sources.open(&id, config(&path)).unwrap();
            let base = service.execute_request(&count_request("base")).await.unwrap();
            let own = service.execute_request(&count_request(&id)).await.unwrap();
            (base.data.unwrap().total, own.data.unwrap().total)
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        assert_eq!(task.await.unwrap(), (3, i as u64));
    }
    assert_eq!(sources.len(), 9);
    assert!(sources.is_connected("extra7").await);
}

#[tokio::test]
async fn test_service_introspection() {
    let dir = TempDir::new();
    let sources = Sources::new();
    sources.open("db", config(&dir.database("db", 0))).unwrap();
    let service = QueryService::new(Arc::new(sources));

    let tables = service.tables("db").await.unwrap().unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].name, "metrics");

    let table = service.table("db", "metrics").await.unwrap().unwrap();
    assert_eq!(table.columns.len(), 2);
    assert!(service.table("db", "other").await.unwrap().is_err());

    let functions = serde_json::to_value(service.functions("db").await.unwrap()).unwrap();
    assert_eq!(functions, json!({"number": ["avg", "count", "sum", "max", "min"]}));
}

#[test]
fn test_sources_from_config_file() {
    let dir = TempDir::new();
    let db = dir.database("sales", 1);
    std::env::set_var("DATAPOINT_REGISTRY_TEST_DIR", &dir.path);

    let config_path = dir.path.join("datapoint.toml");
    std::fs::write(
        &config_path,
        r#"
        [sources.sales]
        name = "Sales"
        driver = "sqlite"
        path = "${DATAPOINT_REGISTRY_TEST_DIR}/sales.db"

        [sources.legacy]
        driver = "oracle"
        path = "x"
        "#,
    )
    .unwrap();

    let settings = Settings::from_file(&config_path).unwrap();
    assert_eq!(
        PathBuf::from(settings.source("sales").unwrap().connection().unwrap().path),
        db
    );

    let sources = Sources::from_settings(&settings);
    assert_eq!(sources.ids(), vec!["sales"]);
}

/// A registry whose sources are always unreachable.
struct Offline;

#[async_trait]
impl SourceRegistry for Offline {
    async fn database(&self, id: &str) -> RegistryResult<Arc<Database>> {
        Err(RegistryError::SourceNotFound(format!("{id} (offline)")))
    }

    async fn is_connected(&self, _id: &str) -> bool {
        false
    }
}

#[tokio::test]
async fn test_service_over_custom_registry() {
    let service = QueryService::new(Arc::new(Offline));
    let err = service.execute_request(&count_request("x")).await.unwrap_err();
    assert_eq!(err.to_string(), "source not found: x (offline)");
    assert!(!service.registry().is_connected("x").await);
}
