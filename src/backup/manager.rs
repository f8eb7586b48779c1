//! GraphML export/import through APOC and the backup sequence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use serde::Serialize;

use crate::backup::{archive, naming};
use crate::error::AppError;
use crate::graph::{CypherExecutor, QueryExt, Record};
use crate::runtime::ContainerRuntime;

/// Where backups live on the host and where APOC reads/writes in the container.
#[derive(Debug, Clone)]
pub struct BackupLayout {
    pub backup_dir: PathBuf,
    /// Neo4j import directory inside the container.
    pub container_import_dir: String,
    /// Fixed export file name inside `container_import_dir`.
    pub staging_file: String,
}

impl BackupLayout {
    /// Absolute container path of a file in the import directory.
    pub fn container_path(&self, file_name: &str) -> String {
        format!(
            "{}/{}",
            self.container_import_dir.trim_end_matches('/'),
            file_name
        )
    }
}

/// Counters yielded by `apoc.export.graphml.all`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    pub file: String,
    pub nodes: i64,
    pub relationships: i64,
    pub time_ms: i64,
}

/// Counters yielded by `apoc.import.graphml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub nodes: i64,
    pub relationships: i64,
    pub time_ms: i64,
}

/// Outcome of [`BackupManager::create_backup`].
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub archive: PathBuf,
    pub size_bytes: u64,
    pub export: ExportStats,
}

/// Runs exports and imports and manages the backup directory.
#[derive(Clone)]
pub struct BackupManager {
    runtime: Arc<dyn ContainerRuntime>,
    layout: BackupLayout,
}

impl BackupManager {
    /// Creates the manager, creating the backup directory if needed.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, layout: BackupLayout) -> Result<Self, AppError> {
        std::fs::create_dir_all(&layout.backup_dir).map_err(|source| AppError::CreateDir {
            path: layout.backup_dir.clone(),
            source,
        })?;
        Ok(Self { runtime, layout })
    }

    pub fn layout(&self) -> &BackupLayout {
        &self.layout
    }

    pub fn backup_dir(&self) -> &Path {
        &self.layout.backup_dir
    }

    /// `<prefix>_<YYYYMMDD_HHMMSS>.graphml` for the current local time.
    pub fn create_backup_filename(prefix: &str) -> String {
        naming::backup_filename(prefix, Local::now())
    }

    pub fn list_backups(&self) -> Result<Vec<PathBuf>, AppError> {
        Ok(naming::list_backups(&self.layout.backup_dir)?)
    }

    pub fn latest_backup(&self) -> Result<Option<PathBuf>, AppError> {
        Ok(naming::latest_backup(&self.layout.backup_dir)?)
    }

    /// Fails with [`AppError::PluginUnavailable`] unless `apoc.help` lists
    /// `procedure`.
    pub async fn require_procedure(
        &self,
        conn: &dyn CypherExecutor,
        procedure: &str,
    ) -> Result<(), AppError> {
        let count: i64 = conn
            .query("CALL apoc.help($name) YIELD name RETURN count(name) AS count")
            .param("name", procedure)
            .fetch_scalar("count")
            .await?
            .unwrap_or(0);
        if count == 0 {
            return Err(AppError::PluginUnavailable(procedure.to_string()));
        }
        Ok(())
    }

    /// Exports the whole database to `file_name` in the container import
    /// directory.
    pub async fn export_to_graphml(
        &self,
        conn: &dyn CypherExecutor,
        file_name: &str,
        include_types: bool,
    ) -> Result<ExportStats, AppError> {
        let record = conn
            .query(
                "CALL apoc.export.graphml.all($file, {useTypes: $useTypes, readLabels: true, storeNodeIds: false}) \
                 YIELD file, nodes, relationships, time \
                 RETURN file, nodes, relationships, time",
            )
            .param("file", file_name)
            .param("useTypes", include_types)
            .fetch_one()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Export failed");
                e
            })?
            .unwrap_or_default();

        let stats = ExportStats {
            file: record.get_opt("file")?.unwrap_or_else(|| file_name.to_string()),
            nodes: count(&record, "nodes")?,
            relationships: count(&record, "relationships")?,
            time_ms: count(&record, "time")?,
        };
        tracing::info!(
            "Exported {} nodes and {} relationships in {}ms",
            stats.nodes,
            stats.relationships,
            stats.time_ms
        );
        Ok(stats)
    }

    /// Imports `file_name` from the container import directory.
    pub async fn import_from_graphml(
        &self,
        conn: &dyn CypherExecutor,
        file_name: &str,
    ) -> Result<ImportStats, AppError> {
        let record = conn
            .query(
                "CALL apoc.import.graphml($url, {readLabels: true, storeNodeIds: false, \
                 defaultRelationshipType: 'RELATED', batchSize: 1000, useTypes: false}) \
                 YIELD nodes, relationships, time \
                 RETURN nodes, relationships, time",
            )
            .param("url", format!("file:///{}", file_name))
            .fetch_one()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Import failed");
                AppError::Import(e.to_string())
            })?
            .unwrap_or_default();

        let stats = ImportStats {
            nodes: count(&record, "nodes")?,
            relationships: count(&record, "relationships")?,
            time_ms: count(&record, "time")?,
        };
        tracing::info!(
            "Imported {} nodes and {} relationships in {}ms",
            stats.nodes,
            stats.relationships,
            stats.time_ms
        );
        Ok(stats)
    }

    /// Export → copy out → remove staging → gzip → verify. Stops at the
    /// first failing step.
    pub async fn create_backup(&self, conn: &dyn CypherExecutor) -> Result<BackupReport, AppError> {
        self.require_procedure(conn, "export.graphml").await?;

        let staging = self.layout.staging_file.as_str();
        let export = self.export_to_graphml(conn, staging, true).await?;

        let file_name = Self::create_backup_filename(naming::DEFAULT_PREFIX);
        let local = self.layout.backup_dir.join(&file_name);
        let staging_path = self.layout.container_path(staging);
        tracing::info!(dest = %local.display(), "Copying export out of the container");
        self.runtime.copy_out(&staging_path, &local).await?;
        self.runtime.exec(&["rm", "-f", &staging_path]).await?;

        let exported_len = std::fs::metadata(&local)?.len();
        if exported_len == 0 {
            return Err(AppError::Backup(format!("{} is empty", local.display())));
        }

        let archive_path = self.layout.backup_dir.join(format!("{}.gz", file_name));
        tracing::info!(archive = %archive_path.display(), "Compressing backup");
        let size_bytes = archive::compress(&local, &archive_path)?;

        let decoded = archive::verify(&archive_path)
            .map_err(|e| AppError::Backup(format!("archive verification failed: {}", e)))?;
        if decoded != exported_len {
            return Err(AppError::Backup(format!(
                "archive holds {} bytes, export has {}",
                decoded, exported_len
            )));
        }
        std::fs::remove_file(&local)?;

        tracing::info!(
            archive = %archive_path.display(),
            size_bytes,
            "Backup complete"
        );
        Ok(BackupReport {
            archive: archive_path,
            size_bytes,
            export,
        })
    }
}

fn count(record: &Record, column: &str) -> Result<i64, AppError> {
    Ok(record.get_opt(column)?.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::testing::FakeNeo4j;
    use crate::runtime::testing::FakeRuntime;

    fn manager(runtime: Arc<FakeRuntime>, dir: &Path) -> BackupManager {
        BackupManager::new(
            runtime,
            BackupLayout {
                backup_dir: dir.join("backup"),
                container_import_dir: "/var/lib/neo4j/import/".to_string(),
                staging_file: "backup_staging.graphml".to_string(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_new_creates_backup_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(FakeRuntime::running(), dir.path());
        assert!(manager.backup_dir().is_dir());
        assert_eq!(
            manager.layout().container_path("x.graphml"),
            "/var/lib/neo4j/import/x.graphml"
        );
    }

    #[tokio::test]
    async fn test_create_backup_produces_verified_archive() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = FakeRuntime::running();
        let neo4j = FakeNeo4j::new(runtime.clone(), "/var/lib/neo4j/import");
        neo4j.seed(10, 5);
        let manager = manager(runtime.clone(), dir.path());

        let report = manager.create_backup(&neo4j).await.unwrap();

        let name = report.archive.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("neo4j_backup_"));
        assert!(name.ends_with(".graphml.gz"));
        assert!(report.size_bytes > 0);
        assert_eq!(report.export.nodes, 10);
        assert_eq!(report.export.relationships, 5);
        assert!(archive::verify(&report.archive).unwrap() > 0);
        // Uncompressed copy and staging file are gone
        assert!(!report.archive.with_extension("").exists());
        assert!(runtime
            .file("/var/lib/neo4j/import/backup_staging.graphml")
            .is_none());
        assert_eq!(manager.list_backups().unwrap(), vec![report.archive]);
    }

    #[tokio::test]
    async fn test_backup_requires_export_procedure() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = FakeRuntime::running();
        let neo4j = FakeNeo4j::new(runtime.clone(), "/var/lib/neo4j/import");
        neo4j.without_apoc();

        let result = manager(runtime.clone(), dir.path()).create_backup(&neo4j).await;

        assert!(matches!(result, Err(AppError::PluginUnavailable(_))));
        assert!(!runtime.called("copy_out"));
    }

    #[tokio::test]
    async fn test_backup_aborts_when_copy_fails() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = FakeRuntime::running();
        runtime.fail_on("copy_out");
        let neo4j = FakeNeo4j::new(runtime.clone(), "/var/lib/neo4j/import");
        neo4j.seed(3, 1);
        let manager = manager(runtime.clone(), dir.path());

        let result = manager.create_backup(&neo4j).await;

        assert!(matches!(result, Err(AppError::Command { .. })));
        assert!(!runtime.called("exec"));
        assert!(manager.list_backups().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_passes_file_url() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = FakeRuntime::running();
        let neo4j = FakeNeo4j::new(runtime.clone(), "/var/lib/neo4j/import");
        runtime.put_file(
            "/var/lib/neo4j/import/restore.graphml",
            FakeNeo4j::graphml(4, 2).as_bytes(),
        );

        let stats = manager(runtime, dir.path())
            .import_from_graphml(&neo4j, "restore.graphml")
            .await
            .unwrap();

        assert_eq!(stats.nodes, 4);
        assert_eq!(stats.relationships, 2);
        assert_eq!(neo4j.counts(), (4, 2));
    }

    #[tokio::test]
    async fn test_import_failure_is_import_error() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = FakeRuntime::running();
        let neo4j = FakeNeo4j::new(runtime.clone(), "/var/lib/neo4j/import");

        let result = manager(runtime, dir.path())
            .import_from_graphml(&neo4j, "missing.graphml")
            .await;

        assert!(matches!(result, Err(AppError::Import(_))));
    }
}
