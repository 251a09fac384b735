//! Source registry: live backend connections keyed by source id.
//!
//! The query path only needs "give me the connection for this id" and
//! "is it alive", expressed by [`SourceRegistry`]. [`Sources`] is the
//! in-process implementation, safe to read and mutate concurrently.
//!
//! ```ignore
//! use datapoint::source::{SourceRegistry, Sources};
//!
//! async fn example(sources: &Sources) -> RegistryResult<()> {
//!     let db = sources.database("sales").await?;
//!     let tables = db.tables().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{info, warn};

use crate::config::{ConnectionConfig, Settings};
use crate::executor::{Database, QueryError};

/// Errors raised by registry lookups.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("source not found: {0}")]
    SourceNotFound(String),

    #[error("failed to open source {id}: {source}")]
    Open {
        id: String,
        #[source]
        source: QueryError,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Resolves source ids to live connections.
#[async_trait]
pub trait SourceRegistry: Send + Sync {
    /// Live connection for `id`.
    async fn database(&self, id: &str) -> RegistryResult<Arc<Database>>;

    /// Whether the source exists and answers a ping.
    async fn is_connected(&self, id: &str) -> bool;
}

/// Concurrent map of source id to open database.
#[derive(Debug, Default)]
pub struct Sources {
    inner: DashMap<String, Arc<Database>>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open every configured source. Sources that fail to open are logged
    /// and left out.
    pub fn from_settings(settings: &Settings) -> Self {
        let sources = Self::new();
        for (id, source) in &settings.sources {
            let opened = source
                .connection()
                .map_err(|e| e.to_string())
                .and_then(|config| sources.open(id, config).map_err(|e| e.to_string()));
            match opened {
                Ok(()) => info!(source = %id, name = %source.name, "source connected"),
                Err(err) => warn!(source = %id, error = %err, "skipping source"),
            }
        }
        sources
    }

    /// Open `config` and register it under `id`, replacing any previous
    /// connection.
    pub fn open(&self, id: &str, config: ConnectionConfig) -> RegistryResult<()> {
        let db = Database::open(config).map_err(|source| RegistryError::Open {
            id: id.to_string(),
            source,
        })?;
        self.put(id, Arc::new(db));
        Ok(())
    }

    pub fn put(&self, id: &str, db: Arc<Database>) -> Option<Arc<Database>> {
        self.inner.insert(id.to_string(), db)
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Database>> {
        self.inner.remove(id).map(|(_, db)| db)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl SourceRegistry for Sources {
    async fn database(&self, id: &str) -> RegistryResult<Arc<Database>> {
        // clone out of the map so no shard lock is held across an await
        self.inner
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| RegistryError::SourceNotFound(id.to_string()))
    }

    async fn is_connected(&self, id: &str) -> bool {
        match self.database(id).await {
            Ok(db) => db.ping().await.is_ok(),
            Err(_) => false,
        }
    }
}
