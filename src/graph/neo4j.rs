//! Neo4j Bolt backend built on neo4rs.
//!
//! ```ignore
//! let rows = Neo4jConnection::scoped(&credentials, |conn| {
//!     Box::pin(async move { Ok(conn.query("RETURN 1 AS one").fetch_all().await?) })
//! })
//! .await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use futures::future::BoxFuture;
use neo4rs::{query, BoltNull, BoltType, Graph};
use serde_json::Value as JsonValue;

use crate::error::AppError;
use crate::graph::record::{Params, Record};
use crate::graph::traits::{Connector, CypherExecutor, QueryError};

/// Where and as whom to connect.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub uri: String,
    pub username: String,
    pub password: String,
}

/// A single-owner Bolt session.
pub struct Neo4jConnection {
    uri: String,
    graph: Option<Graph>,
}

impl Neo4jConnection {
    /// Connects and verifies the server answers a trivial query.
    pub async fn open(uri: &str, username: &str, password: &str) -> Result<Self, AppError> {
        let graph = Graph::new(uri, username, password).await.map_err(|e| {
            tracing::error!(uri, error = %e, "Neo4j unavailable");
            e
        })?;
        graph.run(query("RETURN 1")).await.map_err(|e| {
            tracing::error!(uri, user = username, error = %e, "Neo4j rejected the session");
            e
        })?;
        tracing::info!(uri, "Connected to Neo4j");

        Ok(Self {
            uri: uri.to_string(),
            graph: Some(graph),
        })
    }

    pub async fn open_with(credentials: &Credentials) -> Result<Self, AppError> {
        Self::open(&credentials.uri, &credentials.username, &credentials.password).await
    }

    /// Opens a connection, runs `f`, and closes the connection whether `f`
    /// succeeded or not.
    pub async fn scoped<R, F>(credentials: &Credentials, f: F) -> Result<R, AppError>
    where
        F: for<'c> FnOnce(&'c Neo4jConnection) -> BoxFuture<'c, Result<R, AppError>>,
    {
        let mut conn = Self::open_with(credentials).await?;
        conn.run_then_close(f).await
    }

    async fn run_then_close<R, F>(&mut self, f: F) -> Result<R, AppError>
    where
        F: for<'c> FnOnce(&'c Neo4jConnection) -> BoxFuture<'c, Result<R, AppError>>,
    {
        let result = f(self).await;
        self.close();
        result
    }

    pub fn is_open(&self) -> bool {
        self.graph.is_some()
    }

    /// Releases the session. Later queries fail with [`QueryError::Closed`].
    pub fn close(&mut self) {
        if self.graph.take().is_some() {
            tracing::info!(uri = %self.uri, "Neo4j connection closed");
        }
    }
}

impl Drop for Neo4jConnection {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl CypherExecutor for Neo4jConnection {
    async fn execute_query(&self, cypher: &str, params: Params) -> Result<Vec<Record>, QueryError> {
        let graph = self.graph.as_ref().ok_or(QueryError::Closed)?;

        let mut stream = graph
            .execute(build_query(cypher, params))
            .await
            .map_err(|e| QueryError::failed(e, cypher))?;

        let mut records = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| QueryError::failed(e, cypher))?
        {
            records.push(to_record(row)?);
        }
        tracing::debug!(rows = records.len(), "Query complete");
        Ok(records)
    }

    /// Runs inside an explicit transaction, rolled back on any error.
    async fn execute_write(&self, cypher: &str, params: Params) -> Result<Vec<Record>, QueryError> {
        let graph = self.graph.as_ref().ok_or(QueryError::Closed)?;

        let mut txn = graph
            .start_txn()
            .await
            .map_err(|e| QueryError::failed(e, cypher))?;

        let mut records = Vec::new();
        let outcome = async {
            let mut stream = txn.execute(build_query(cypher, params)).await?;
            while let Some(row) = stream.next(txn.handle()).await? {
                records.push(row);
            }
            Ok::<_, neo4rs::Error>(())
        }
        .await;

        if let Err(e) = outcome {
            if let Err(rollback) = txn.rollback().await {
                tracing::warn!(error = %rollback, "Rollback failed");
            }
            return Err(QueryError::failed(e, cypher));
        }
        txn.commit()
            .await
            .map_err(|e| QueryError::failed(e, cypher))?;

        let records = records
            .into_iter()
            .map(to_record)
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(rows = records.len(), "Write committed");
        Ok(records)
    }
}

fn build_query(cypher: &str, params: Params) -> neo4rs::Query {
    params
        .into_iter()
        .fold(query(cypher), |q, (name, value)| q.param(&name, to_bolt(value)))
}

fn to_record(row: neo4rs::Row) -> Result<Record, QueryError> {
    let columns: HashMap<String, JsonValue> = row.to().map_err(|e| QueryError::Decode {
        column: "*".to_string(),
        reason: e.to_string(),
    })?;
    Ok(columns.into_iter().collect())
}

/// Converts a JSON parameter into the driver's value type.
fn to_bolt(value: JsonValue) -> BoltType {
    match value {
        JsonValue::Null => BoltType::Null(BoltNull),
        JsonValue::Bool(b) => b.into(),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().unwrap_or_default().into(),
        },
        JsonValue::String(s) => s.into(),
        JsonValue::Array(items) => items.into_iter().map(to_bolt).collect::<Vec<_>>().into(),
        JsonValue::Object(map) => map
            .into_iter()
            .map(|(k, v)| (k, to_bolt(v)))
            .collect::<HashMap<String, BoltType>>()
            .into(),
    }
}

/// Opens a new [`Neo4jConnection`] per call.
#[derive(Debug, Clone)]
pub struct Neo4jConnector {
    credentials: Credentials,
}

impl Neo4jConnector {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl Connector for Neo4jConnector {
    async fn connect(&self) -> Result<Box<dyn CypherExecutor>, AppError> {
        Ok(Box::new(Neo4jConnection::open_with(&self.credentials).await?))
    }
}
