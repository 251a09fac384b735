//! Query service: source resolution in front of the executor.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info_span, Instrument};

use crate::executor::{QueryResponse, QueryResult};
use crate::model::{AggregateFunc, Query, SourceQuery};
use crate::schema::{SemanticType, Table};
use crate::source::{RegistryResult, SourceRegistry};

/// Runs queries against sources resolved through a registry.
///
/// Registry failures come back as `Err`; query failures stay inside the
/// returned [`QueryResponse`].
pub struct QueryService<R: SourceRegistry> {
    registry: Arc<R>,
}

impl<R: SourceRegistry> Clone for QueryService<R> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<R: SourceRegistry> QueryService<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub async fn execute(&self, source_id: &str, query: &Query) -> RegistryResult<QueryResponse> {
        let db = self.registry.database(source_id).await?;
        Ok(db
            .execute(query)
            .instrument(info_span!("query", source = %source_id, kind = ?query.kind))
            .await)
    }

    /// Run a `{sourceId, query}` request.
    pub async fn execute_request(&self, request: &SourceQuery) -> RegistryResult<QueryResponse> {
        self.execute(&request.source_id, &request.query).await
    }

    pub async fn tables(&self, source_id: &str) -> RegistryResult<QueryResult<Vec<Table>>> {
        let db = self.registry.database(source_id).await?;
        Ok(db.tables().await)
    }

    pub async fn table(&self, source_id: &str, name: &str) -> RegistryResult<QueryResult<Table>> {
        let db = self.registry.database(source_id).await?;
        Ok(db.table(name).await)
    }

    pub async fn functions(
        &self,
        source_id: &str,
    ) -> RegistryResult<BTreeMap<SemanticType, Vec<AggregateFunc>>> {
        let db = self.registry.database(source_id).await?;
        Ok(db.functions())
    }
}
