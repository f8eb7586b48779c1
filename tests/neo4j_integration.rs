//! Integration tests against a real Neo4j with APOC, started through
//! docker compose from the working directory.
//!
//! Run with: `cargo run -- start && cargo test --features integration --test neo4j_integration`
//!
//! The backup/restore test wipes the database.

#![cfg(feature = "integration")]

use std::sync::Arc;

use neo4j_manager::backup::{AutoConfirm, RestoreStage};
use neo4j_manager::context::Context;
use neo4j_manager::graph::{
    clear_database, node_count, relationship_count, Neo4jConnection, QueryExt,
};
use neo4j_manager::health::HealthChecker;
use neo4j_manager::runtime::WaitPolicy;
use serial_test::serial;

fn context() -> Context {
    Context::load().expect("Failed to load settings")
}

async fn connect(context: &Context) -> Neo4jConnection {
    context.connect().await.expect("Failed to connect to Neo4j")
}

/// 10 `:Person` nodes and 5 `:KNOWS` relationships.
async fn seed(conn: &Neo4jConnection) {
    clear_database(conn).await.expect("Failed to clear");
    conn.query("UNWIND range(0, 9) AS i CREATE (:Person {id: i, name: 'person' + i})")
        .run()
        .await
        .expect("Failed to create nodes");
    conn.query(
        "MATCH (a:Person), (b:Person) WHERE b.id = a.id + 1 AND a.id < 5 CREATE (a)-[:KNOWS]->(b)",
    )
    .run()
    .await
    .expect("Failed to create relationships");
}

#[serial]
mod database_tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_and_return_one() {
        let context = context();
        let conn = connect(&context).await;

        let one: Option<i64> = conn
            .query("RETURN $value AS value")
            .param("value", 1)
            .fetch_scalar("value")
            .await
            .expect("Query failed");

        assert_eq!(one, Some(1));
    }

    #[tokio::test]
    async fn test_scoped_connection_runs_closure() {
        let context = context();
        let count = Neo4jConnection::scoped(&context.credentials(), |conn| {
            Box::pin(async move { Ok(node_count(conn).await?) })
        })
        .await
        .expect("Scoped query failed");

        assert!(count >= 0);
    }

    #[tokio::test]
    async fn test_health_report() {
        let context = context();
        let conn = connect(&context).await;
        let checker = HealthChecker::new(&conn);

        assert!(checker.wait_for_ready(WaitPolicy::default()).await);
        let report = checker.full_health_check().await;

        assert!(report.connected);
        assert!(report.apoc_available);
        assert!(report.version.is_some());
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_backup_and_restore_round_trip() {
        let context = context();
        let conn = connect(&context).await;
        seed(&conn).await;

        let lifecycle = context.lifecycle();
        let manager = context
            .backup_manager(lifecycle.runtime().clone())
            .expect("Backup dir");
        let backup = manager.create_backup(&conn).await.expect("Backup failed");
        assert_eq!(backup.export.nodes, 10);
        assert_eq!(backup.export.relationships, 5);

        clear_database(&conn).await.expect("Failed to clear");
        assert_eq!(node_count(&conn).await.unwrap(), 0);
        drop(conn);

        let mut workflow = context
            .restore_workflow()
            .expect("Restore workflow")
            .with_confirmation(Arc::new(AutoConfirm));
        let name = backup.archive.file_name().unwrap().to_str().unwrap().to_string();
        let report = workflow.restore(&name).await.expect("Restore failed");

        assert_eq!(workflow.stage(), RestoreStage::Complete);
        assert_eq!(report.nodes, 10);
        assert_eq!(report.relationships, 5);

        let conn = connect(&context).await;
        assert_eq!(node_count(&conn).await.unwrap(), 10);
        assert_eq!(relationship_count(&conn).await.unwrap(), 5);

        std::fs::remove_file(&backup.archive).ok();
    }

    #[tokio::test]
    async fn test_restore_rejects_plain_text_archive() {
        let context = context();
        let backup_dir = &context.settings.paths.backup;
        std::fs::create_dir_all(backup_dir).unwrap();
        let fake = backup_dir.join("integration_fake.graphml.gz");
        std::fs::write(&fake, b"plain text").unwrap();

        let mut workflow = context.restore_workflow().expect("Restore workflow");
        let result = workflow.restore("integration_fake.graphml.gz").await;

        assert!(result.is_err());
        assert!(!workflow.stage().is_destructive());

        // Still up: nothing was stopped
        let conn = connect(&context).await;
        assert!(HealthChecker::new(&conn).check_connectivity().await);
        std::fs::remove_file(&fake).ok();
    }
}
