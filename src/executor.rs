//! Query execution against one source backend.
//!
//! A [`Database`] owns a single connection. Every call compiles and runs on
//! a blocking thread; dropping the returned future interrupts the statement
//! in flight, or keeps it from starting.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, InterruptHandle, ToSql};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::compile::{CompileError, Compiler, Statement, RESERVED_PREFIX, TOTAL_COLUMN};
use crate::config::ConnectionConfig;
use crate::model::{AggregateFunc, Query, QueryKind, Value};
use crate::schema::{self, SchemaError, SemanticType, Table};
use crate::sql::{count_star, ExprExt, WindowExt};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("failed to parse query: {0}")]
    Parse(#[from] CompileError),

    #[error("failed to parse query: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to execute query: {0}")]
    Execute(#[from] rusqlite::Error),

    #[error("failed to connect: {0}")]
    Connect(rusqlite::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("query cancelled")]
    Cancelled,

    #[error("query task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type QueryResult<T> = Result<T, QueryError>;

// ============================================================================
// Response
// ============================================================================

/// Rows returned by a select.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectData {
    pub rules: BTreeMap<String, Vec<String>>,
    pub data: Vec<serde_json::Map<String, serde_json::Value>>,
    pub total: u64,
}

/// Outcome of one query. Callers must check `err` before trusting `data`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SelectData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    #[serde(rename = "rawSql", default, skip_serializing_if = "Option::is_none")]
    pub raw_sql: Option<String>,
}

impl QueryResponse {
    pub fn failed(err: QueryError, raw_sql: Option<String>) -> Self {
        Self {
            data: None,
            err: Some(err.to_string()),
            raw_sql,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }
}

// ============================================================================
// Database
// ============================================================================

/// A live connection to one source.
pub struct Database {
    config: ConnectionConfig,
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Database({}:{})", self.config.driver.as_str(), self.config.path)
    }
}

impl Database {
    /// Open the backend described by `config` and check that it answers.
    pub fn open(config: ConnectionConfig) -> QueryResult<Self> {
        let conn = config.open().map_err(QueryError::Connect)?;
        let interrupt = Arc::new(conn.get_interrupt_handle());
        let db = Self {
            config,
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
        };
        db.ping_blocking().map_err(QueryError::Connect)?;
        Ok(db)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Liveness probe.
    pub async fn ping(&self) -> QueryResult<()> {
        self.run(|conn| Ok(ping(conn)?)).await
    }

    fn ping_blocking(&self) -> rusqlite::Result<()> {
        ping(&lock(&self.conn))
    }

    /// Compile and run a query model.
    pub async fn execute(&self, query: &Query) -> QueryResponse {
        let dialect = self.config.dialect();
        let query = query.clone();
        match self.run(move |conn| Ok(execute_on(conn, dialect, &query))).await {
            Ok(response) => response,
            Err(err) => QueryResponse::failed(err, None),
        }
    }

    /// Decode a JSON query model, then run it.
    pub async fn execute_json(&self, body: &str) -> QueryResponse {
        match serde_json::from_str::<Query>(body) {
            Ok(query) => self.execute(&query).await,
            Err(err) => QueryResponse::failed(QueryError::Decode(err), None),
        }
    }

    /// Every table with its columns.
    pub async fn tables(&self) -> QueryResult<Vec<Table>> {
        self.run(|conn| Ok(schema::introspect_tables(conn)?)).await
    }

    /// One table by name.
    pub async fn table(&self, name: &str) -> QueryResult<Table> {
        let name = name.to_string();
        self.run(move |conn| Ok(schema::introspect_table(conn, &name)?)).await
    }

    /// Aggregate functions available per semantic type.
    pub fn functions(&self) -> BTreeMap<SemanticType, Vec<AggregateFunc>> {
        BTreeMap::from([(SemanticType::Number, AggregateFunc::ALL.to_vec())])
    }

    /// Run `f` on the connection from a blocking thread.
    async fn run<T, F>(&self, f: F) -> QueryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> QueryResult<T> + Send + 'static,
    {
        let state = Arc::new(CallState::default());
        let guard = CancelOnDrop {
            state: Arc::clone(&state),
            interrupt: Arc::clone(&self.interrupt),
            armed: true,
        };

        let conn = Arc::clone(&self.conn);
        let task = tokio::task::spawn_blocking(move || {
            let conn = lock(&conn);
            if !state.start() {
                return Err(QueryError::Cancelled);
            }
            let result = f(&conn);
            // before the connection is released to the next caller
            state.finish();
            result
        });

        let result = task.await;
        guard.disarm();
        result?
    }
}

fn lock(conn: &Mutex<Connection>) -> MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}

fn ping(conn: &Connection) -> rusqlite::Result<()> {
    conn.query_row("SELECT 1", [], |_| Ok(()))
}

// ============================================================================
// Cancellation
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Queued,
    Running,
    Done,
    Cancelled,
}

/// Progress of one call, shared by the blocking task and the future.
/// Interrupts are issued with the lock held, so they can only land while
/// this call owns the connection.
#[derive(Default)]
struct CallState {
    phase: Mutex<Phase>,
}

impl CallState {
    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queued -> Running. `false` when the call was cancelled first.
    fn start(&self) -> bool {
        let mut phase = self.phase();
        if *phase == Phase::Cancelled {
            return false;
        }
        *phase = Phase::Running;
        true
    }

    fn finish(&self) {
        *self.phase() = Phase::Done;
    }

    /// Mark cancelled, interrupting the connection if the call is on it.
    fn cancel(&self, interrupt: &InterruptHandle) {
        let mut phase = self.phase();
        match *phase {
            Phase::Running => {
                warn!("query dropped while running, interrupting");
                interrupt.interrupt();
            }
            Phase::Queued => *phase = Phase::Cancelled,
            Phase::Done | Phase::Cancelled => {}
        }
    }
}

/// Interrupts the call's statement if the future is dropped before the
/// blocking task reports back.
struct CancelOnDrop {
    state: Arc<CallState>,
    interrupt: Arc<InterruptHandle>,
    armed: bool,
}

impl CancelOnDrop {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.state.cancel(&self.interrupt);
    }
}

// ============================================================================
// Execution
// ============================================================================

fn execute_on(conn: &Connection, dialect: crate::sql::Dialect, query: &Query) -> QueryResponse {
    let mut compiled = match Compiler::new(dialect, conn).compile(query) {
        Ok(compiled) => compiled,
        Err(err) => return QueryResponse::failed(err.into(), None),
    };

    if let Statement::Select(select) = &mut compiled.statement {
        select.push_select(count_star().over().alias(TOTAL_COLUMN));
    }

    let (sql, params) = compiled.render();
    debug!(%sql, params = params.len(), "executing");

    let outcome = match compiled.kind {
        QueryKind::Select => select_rows(conn, &sql, &params).map(|(data, total)| {
            Some(SelectData {
                rules: compiled.rules,
                data,
                total,
            })
        }),
        QueryKind::Insert | QueryKind::Update | QueryKind::Delete => conn
            .execute(&sql, params_from_iter(params.iter()))
            .map(|_| None),
    };

    match outcome {
        Ok(data) => QueryResponse {
            data,
            err: None,
            raw_sql: Some(sql),
        },
        Err(err) if err.sqlite_error_code() == Some(rusqlite::ErrorCode::OperationInterrupted) => {
            QueryResponse::failed(QueryError::Cancelled, Some(sql))
        }
        Err(err) => QueryResponse::failed(QueryError::Execute(err), Some(sql)),
    }
}

type Record = serde_json::Map<String, serde_json::Value>;

/// Scan rows into records, dropping reserved columns and capturing the total.
fn select_rows(
    conn: &Connection,
    sql: &str,
    params: &[Value],
) -> rusqlite::Result<(Vec<Record>, u64)> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut data = Vec::new();
    let mut total = 0u64;

    while let Some(row) = rows.next()? {
        let mut record = Record::new();
        for (idx, name) in names.iter().enumerate() {
            if name == TOTAL_COLUMN {
                total = row.get::<_, i64>(idx)?.max(0) as u64;
            } else if !name.starts_with(RESERVED_PREFIX) {
                record.insert(name.clone(), json_value(row.get_ref(idx)?));
            }
        }
        data.push(record);
    }

    Ok((data, total))
}

fn json_value(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(n) => n.into(),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned().into(),
        ValueRef::Blob(bytes) => STANDARD.encode(bytes).into(),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int(n) => ToSqlOutput::Owned(SqlValue::Integer(*n)),
            Value::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::List(_) => {
                return Err(rusqlite::Error::ToSqlConversionFailure(
                    "list values cannot be bound to a single parameter".into(),
                ))
            }
        })
    }
}
