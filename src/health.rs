//! Health checks over an open connection.
//!
//! An unreachable database is a reported state, not an error: every check
//! here returns a value and logs what went wrong.

use serde::Serialize;

use crate::graph::{self, CypherExecutor, QueryError, QueryExt};
use crate::runtime::WaitPolicy;

/// Node/relationship totals and labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatabaseStats {
    pub node_count: i64,
    pub relationship_count: i64,
    pub labels: Vec<String>,
}

/// Result of [`HealthChecker::full_health_check`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthReport {
    pub connected: bool,
    pub apoc_available: bool,
    pub version: Option<String>,
    pub stats: Option<DatabaseStats>,
    /// First failure among the checks run after connecting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.connected && self.apoc_available
    }
}

/// Runs health queries against a connection it borrows.
pub struct HealthChecker<'a, E: CypherExecutor + ?Sized> {
    executor: &'a E,
}

impl<'a, E: CypherExecutor + ?Sized> HealthChecker<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    /// True when a trivial query round-trips.
    pub async fn check_connectivity(&self) -> bool {
        match self.executor.query("RETURN 1 AS ok").fetch_all().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Connectivity check failed");
                false
            }
        }
    }

    /// True when `apoc.help` lists at least one procedure.
    pub async fn check_apoc_available(&self) -> bool {
        let count: Result<Option<i64>, QueryError> = self
            .executor
            .query("CALL apoc.help('version') YIELD name RETURN count(name) AS count")
            .fetch_scalar("count")
            .await;
        match count {
            Ok(count) => count.unwrap_or(0) > 0,
            Err(e) => {
                tracing::error!(error = %e, "APOC check failed");
                false
            }
        }
    }

    /// Server version as reported by `dbms.components()`.
    pub async fn get_version(&self) -> Result<Option<String>, QueryError> {
        self.executor
            .query("CALL dbms.components() YIELD versions RETURN versions[0] AS version")
            .fetch_scalar("version")
            .await
    }

    pub async fn get_database_stats(&self) -> Result<DatabaseStats, QueryError> {
        Ok(DatabaseStats {
            node_count: graph::node_count(self.executor).await?,
            relationship_count: graph::relationship_count(self.executor).await?,
            labels: graph::labels(self.executor).await?,
        })
    }

    /// Polls connectivity until it succeeds or the policy is exhausted.
    pub async fn wait_for_ready(&self, policy: WaitPolicy) -> bool {
        let ready = policy
            .poll(|attempt| async move {
                let ok = self.check_connectivity().await;
                if !ok {
                    tracing::debug!(attempt, "Waiting for Neo4j...");
                }
                ok
            })
            .await;
        match ready {
            Some(attempt) => {
                tracing::info!(attempt, "Neo4j is ready");
                true
            }
            None => {
                tracing::error!(
                    "Neo4j did not become ready within {}s",
                    policy.total().as_secs()
                );
                false
            }
        }
    }

    /// Connectivity, then APOC, version and stats. Never fails; a failure
    /// after connecting is recorded in [`HealthReport::error`].
    pub async fn full_health_check(&self) -> HealthReport {
        let mut report = HealthReport {
            connected: self.check_connectivity().await,
            ..HealthReport::default()
        };
        if !report.connected {
            return report;
        }

        report.apoc_available = self.check_apoc_available().await;

        match self.get_version().await {
            Ok(version) => report.version = version,
            Err(e) => {
                tracing::error!(error = %e, "Health check failed");
                report.error = Some(e.to_string());
                return report;
            }
        }

        match self.get_database_stats().await {
            Ok(stats) => report.stats = Some(stats),
            Err(e) => {
                tracing::error!(error = %e, "Health check failed");
                report.error = Some(e.to_string());
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Params, Record};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Every query fails, like a database that went away.
    struct Unreachable;

    #[async_trait]
    impl CypherExecutor for Unreachable {
        async fn execute_query(&self, cypher: &str, _params: Params) -> Result<Vec<Record>, QueryError> {
            Err(QueryError::failed("connection refused", cypher))
        }
    }

    /// Answers by matching on a fragment of the query text.
    struct Scripted {
        apoc_count: i64,
        fail_stats: bool,
    }

    #[async_trait]
    impl CypherExecutor for Scripted {
        async fn execute_query(&self, cypher: &str, _params: Params) -> Result<Vec<Record>, QueryError> {
            let row = |k: &str, v| vec![[(k.to_string(), v)].into_iter().collect::<Record>()];
            if cypher.contains("RETURN 1") {
                Ok(row("ok", json!(1)))
            } else if cypher.contains("apoc.help") {
                Ok(row("count", json!(self.apoc_count)))
            } else if cypher.contains("dbms.components") {
                Ok(row("version", json!("5.26.0")))
            } else if self.fail_stats {
                Err(QueryError::failed("boom", cypher))
            } else if cypher.contains("db.labels") {
                Ok(row("labels", json!(["Person", "Company"])))
            } else if cypher.contains("-[r]->") {
                Ok(row("count", json!(4)))
            } else {
                Ok(row("count", json!(3)))
            }
        }
    }

    #[tokio::test]
    async fn test_unreachable_database_reports_disconnected() {
        let report = HealthChecker::new(&Unreachable).full_health_check().await;

        assert!(!report.connected);
        assert!(!report.apoc_available);
        assert_eq!(report.version, None);
        assert_eq!(report.stats, None);
    }

    #[tokio::test]
    async fn test_full_health_check_success() {
        let executor = Scripted {
            apoc_count: 1,
            fail_stats: false,
        };

        let report = HealthChecker::new(&executor).full_health_check().await;

        assert!(report.is_healthy());
        assert_eq!(report.version.as_deref(), Some("5.26.0"));
        assert_eq!(
            report.stats,
            Some(DatabaseStats {
                node_count: 3,
                relationship_count: 4,
                labels: vec!["Person".to_string(), "Company".to_string()],
            })
        );
        assert_eq!(report.error, None);
    }

    #[tokio::test]
    async fn test_apoc_missing_when_help_is_empty() {
        let executor = Scripted {
            apoc_count: 0,
            fail_stats: false,
        };

        let report = HealthChecker::new(&executor).full_health_check().await;

        assert!(report.connected);
        assert!(!report.apoc_available);
    }

    #[tokio::test]
    async fn test_stats_failure_is_recorded_not_raised() {
        let executor = Scripted {
            apoc_count: 1,
            fail_stats: true,
        };

        let report = HealthChecker::new(&executor).full_health_check().await;

        assert!(report.connected);
        assert!(report.error.is_some());
        assert_eq!(report.stats, None);
    }

    /// Fails the first `failures` queries, then succeeds.
    struct FlakyStart {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CypherExecutor for FlakyStart {
        async fn execute_query(&self, cypher: &str, _params: Params) -> Result<Vec<Record>, QueryError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(QueryError::failed("starting", cypher));
            }
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_wait_for_ready_retries_until_success() {
        let executor = FlakyStart {
            failures: 2,
            calls: AtomicUsize::new(0),
        };

        let ready = HealthChecker::new(&executor)
            .wait_for_ready(WaitPolicy::new(Duration::ZERO, 5))
            .await;

        assert!(ready);
        assert_eq!(executor.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_for_ready_gives_up() {
        let ready = HealthChecker::new(&Unreachable)
            .wait_for_ready(WaitPolicy::new(Duration::ZERO, 3))
            .await;

        assert!(!ready);
    }
}
