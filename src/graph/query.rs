//! Fluent query builder and common graph statistics.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::graph::record::{Params, Record};
use crate::graph::traits::{CypherExecutor, QueryError};

/// A Cypher query bound to an executor.
///
/// ```ignore
/// let rows = conn
///     .query("CALL apoc.help($name) YIELD name RETURN count(name) AS count")
///     .param("name", "export.graphml")
///     .fetch_all()
///     .await?;
/// ```
pub struct Query<'a, E: CypherExecutor + ?Sized> {
    executor: &'a E,
    cypher: String,
    params: Params,
}

impl<'a, E: CypherExecutor + ?Sized> Query<'a, E> {
    pub fn new(executor: &'a E, cypher: &str) -> Self {
        Self {
            executor,
            cypher: cypher.to_string(),
            params: Params::new(),
        }
    }

    /// Binds `$name`.
    pub fn param(mut self, name: &str, value: impl Into<JsonValue>) -> Self {
        self.params.insert(name.to_string(), value.into());
        self
    }

    pub async fn fetch_all(self) -> Result<Vec<Record>, QueryError> {
        self.executor.execute_query(&self.cypher, self.params).await
    }

    pub async fn fetch_one(self) -> Result<Option<Record>, QueryError> {
        Ok(self.fetch_all().await?.into_iter().next())
    }

    /// Reads one column of the first record, `None` when there are no rows.
    pub async fn fetch_scalar<T: DeserializeOwned>(
        self,
        column: &str,
    ) -> Result<Option<T>, QueryError> {
        match self.fetch_one().await? {
            Some(record) => record.get_opt(column),
            None => Ok(None),
        }
    }

    /// Runs a mutating query, discarding results.
    pub async fn run(self) -> Result<(), QueryError> {
        self.executor
            .execute_write(&self.cypher, self.params)
            .await
            .map(|_| ())
    }
}

/// Adds `executor.query("...")` to every [`CypherExecutor`], trait objects included.
pub trait QueryExt: CypherExecutor {
    fn query(&self, cypher: &str) -> Query<'_, Self> {
        Query::new(self, cypher)
    }
}

impl<E: CypherExecutor + ?Sized> QueryExt for E {}

/// Total number of nodes.
pub async fn node_count<E: CypherExecutor + ?Sized>(executor: &E) -> Result<i64, QueryError> {
    Ok(executor
        .query("MATCH (n) RETURN count(n) AS count")
        .fetch_scalar("count")
        .await?
        .unwrap_or(0))
}

/// Total number of relationships.
pub async fn relationship_count<E: CypherExecutor + ?Sized>(
    executor: &E,
) -> Result<i64, QueryError> {
    Ok(executor
        .query("MATCH ()-[r]->() RETURN count(r) AS count")
        .fetch_scalar("count")
        .await?
        .unwrap_or(0))
}

/// All node labels in the database.
pub async fn labels<E: CypherExecutor + ?Sized>(executor: &E) -> Result<Vec<String>, QueryError> {
    Ok(executor
        .query("CALL db.labels() YIELD label RETURN collect(label) AS labels")
        .fetch_scalar("labels")
        .await?
        .unwrap_or_default())
}

/// Removes every node and its relationships.
pub async fn clear_database<E: CypherExecutor + ?Sized>(executor: &E) -> Result<(), QueryError> {
    tracing::warn!("Clearing all data from database");
    executor.query("MATCH (n) DETACH DELETE n").run().await
}
