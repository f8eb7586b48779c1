//! Core traits for query execution.
//!
//! - [`CypherExecutor`] - runs Cypher and returns records; used by the health
//!   checker and the backup/restore workflows
//! - [`Connector`] - opens a fresh executor; restore needs one because every
//!   container restart invalidates the previous session

use async_trait::async_trait;
use thiserror::Error;

use crate::error::AppError;
use crate::graph::record::{Params, Record};

/// Errors from query execution. No retry happens at this layer.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The connection was closed before the query ran.
    #[error("connection is closed")]
    Closed,

    /// The server rejected the query or the remote call failed.
    #[error("{message}")]
    Failed { message: String, query: String },

    /// A column was missing or had an unexpected type.
    #[error("column '{column}': {reason}")]
    Decode { column: String, reason: String },
}

impl QueryError {
    /// Wraps a driver error together with the query that caused it.
    pub fn failed(err: impl std::fmt::Display, query: &str) -> Self {
        Self::Failed {
            message: err.to_string(),
            query: query.to_string(),
        }
    }
}

/// Executes Cypher queries against a graph database.
///
/// Implementations are single-owner sessions; callers must not share one
/// across concurrent workflows.
#[async_trait]
pub trait CypherExecutor: Send + Sync {
    /// Executes a query and collects every result record.
    async fn execute_query(&self, cypher: &str, params: Params)
        -> Result<Vec<Record>, QueryError>;

    /// Executes a mutating query.
    ///
    /// The default delegates to [`execute_query`](CypherExecutor::execute_query);
    /// the Bolt backend runs it in an explicit transaction.
    async fn execute_write(&self, cypher: &str, params: Params) -> Result<Vec<Record>, QueryError> {
        self.execute_query(cypher, params).await
    }
}

/// Opens new database sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn CypherExecutor>, AppError>;
}
