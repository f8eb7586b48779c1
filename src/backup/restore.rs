//! Destructive restore from a compressed GraphML backup.
//!
//! The archive is validated and decoded before anything is touched. The
//! database is then wiped (container down with volumes, host data directory
//! removed), recreated, and loaded twice: first a small sample to prove the
//! import works, then, after confirmation, the full file.
//!
//! The restore is not atomic. Once [`RestoreStage::ResettingDatabase`] has
//! begun a failure leaves an empty or partially loaded database behind.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::backup::manager::{BackupManager, ImportStats};
use crate::backup::{archive, graphml};
use crate::error::AppError;
use crate::graph::{clear_database, node_count, relationship_count, Connector, CypherExecutor};
use crate::permissions::PermissionFixer;
use crate::plugin::PluginProvisioner;
use crate::runtime::Lifecycle;

/// Nodes (and edges) kept in the test import sample.
pub const DEFAULT_SAMPLE_SIZE: usize = 10;

const RESTORE_FILE: &str = "restore.graphml";
const SAMPLE_FILE: &str = "restore_test.graphml";

/// Where a restore currently is. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RestoreStage {
    Validating,
    Decompressing,
    ResettingDatabase,
    StagingArtifact,
    ClearingData,
    TestImport,
    AwaitingConfirmation,
    FullImport,
    Verifying,
    FinalRestart,
    Complete,
}

impl RestoreStage {
    /// Whether the database may already have lost data at this stage.
    pub fn is_destructive(self) -> bool {
        self >= RestoreStage::ResettingDatabase
    }
}

impl fmt::Display for RestoreStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RestoreStage::Validating => "validating backup",
            RestoreStage::Decompressing => "decompressing",
            RestoreStage::ResettingDatabase => "resetting database",
            RestoreStage::StagingArtifact => "staging backup in container",
            RestoreStage::ClearingData => "clearing data",
            RestoreStage::TestImport => "test import",
            RestoreStage::AwaitingConfirmation => "awaiting confirmation",
            RestoreStage::FullImport => "full import",
            RestoreStage::Verifying => "verifying",
            RestoreStage::FinalRestart => "final restart",
            RestoreStage::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Asks the operator whether to continue after the test import.
#[async_trait]
pub trait Confirmation: Send + Sync {
    async fn confirm(&self, prompt: &str) -> Result<bool, AppError>;
}

/// Always continues; used for `--yes`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl Confirmation for AutoConfirm {
    async fn confirm(&self, prompt: &str) -> Result<bool, AppError> {
        tracing::info!("{} (auto-confirmed)", prompt);
        Ok(true)
    }
}

/// Interactive yes/no prompt on the terminal, defaulting to no.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptConfirm;

#[async_trait]
impl Confirmation for PromptConfirm {
    async fn confirm(&self, prompt: &str) -> Result<bool, AppError> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || {
            dialoguer::Confirm::new()
                .with_prompt(prompt)
                .default(false)
                .interact()
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(format!("confirmation prompt failed: {}", e)))
    }
}

/// Host-side pieces needed to bring a wiped database back up.
#[derive(Clone)]
pub struct HostSetup {
    pub provisioner: PluginProvisioner,
    pub fixer: PermissionFixer,
    pub plugin_version: String,
    pub plugins_dir: PathBuf,
    /// Host directory bind-mounted as the Neo4j data directory.
    pub data_dir: PathBuf,
    /// Every directory recreated and repaired after the reset.
    pub managed_dirs: Vec<PathBuf>,
}

/// Outcome of a completed restore.
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    pub backup: PathBuf,
    pub sample_nodes: usize,
    pub sample_edges: usize,
    pub import: ImportStats,
    pub nodes: i64,
    pub relationships: i64,
}

/// A decoded backup waiting to be staged.
struct Decoded {
    _dir: tempfile::TempDir,
    full: PathBuf,
    sample: PathBuf,
    sample_nodes: usize,
    sample_edges: usize,
}

/// Drives a single restore through its [`RestoreStage`]s.
pub struct RestoreWorkflow {
    lifecycle: Lifecycle,
    connector: Arc<dyn Connector>,
    backups: BackupManager,
    host: HostSetup,
    confirmation: Arc<dyn Confirmation>,
    sample_size: usize,
    stage: RestoreStage,
}

impl RestoreWorkflow {
    /// A workflow that prompts on the terminal before the full import.
    pub fn new(
        lifecycle: Lifecycle,
        connector: Arc<dyn Connector>,
        backups: BackupManager,
        host: HostSetup,
    ) -> Self {
        Self {
            lifecycle,
            connector,
            backups,
            host,
            confirmation: Arc::new(PromptConfirm),
            sample_size: DEFAULT_SAMPLE_SIZE,
            stage: RestoreStage::Validating,
        }
    }

    pub fn with_confirmation(mut self, confirmation: Arc<dyn Confirmation>) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size.max(1);
        self
    }

    pub fn stage(&self) -> RestoreStage {
        self.stage
    }

    /// Restores `backup`, a file name in the backup directory or a path
    /// inside it.
    pub async fn restore(&mut self, backup: &str) -> Result<RestoreReport, AppError> {
        self.stage = RestoreStage::Validating;
        let result = self.run(backup).await;
        if let Err(e) = &result {
            if self.stage.is_destructive() {
                tracing::error!(
                    stage = %self.stage,
                    error = %e,
                    "Restore failed after the database was reset; it may be empty or partially loaded"
                );
            } else {
                tracing::error!(stage = %self.stage, error = %e, "Restore failed; database untouched");
            }
        }
        result
    }

    async fn run(&mut self, backup: &str) -> Result<RestoreReport, AppError> {
        let archive_path = self.validate(backup)?;

        self.enter(RestoreStage::Decompressing);
        let decoded = self.decode(&archive_path)?;

        self.enter(RestoreStage::ResettingDatabase);
        let conn = self.reset().await?;

        self.enter(RestoreStage::StagingArtifact);
        let staged = self.stage_files(&decoded).await;
        let imported = match staged {
            Ok(()) => self.import(conn.as_ref()).await,
            Err(e) => Err(e),
        };
        self.remove_staged().await;
        let (import, nodes, relationships) = imported?;
        drop(conn);

        self.enter(RestoreStage::FinalRestart);
        self.lifecycle.restart().await?;

        self.enter(RestoreStage::Complete);
        tracing::info!(nodes, relationships, "Restore complete");
        Ok(RestoreReport {
            backup: archive_path,
            sample_nodes: decoded.sample_nodes,
            sample_edges: decoded.sample_edges,
            import,
            nodes,
            relationships,
        })
    }

    fn enter(&mut self, stage: RestoreStage) {
        tracing::info!("Restore: {}", stage);
        self.stage = stage;
    }

    fn validate(&self, backup: &str) -> Result<PathBuf, AppError> {
        let cwd = std::env::current_dir()?;
        let path = resolve_backup_path(Path::new(backup), self.backups.backup_dir(), &cwd);
        let invalid = |reason: &str| AppError::InvalidBackup {
            path: path.clone(),
            reason: reason.to_string(),
        };

        if !path.is_file() {
            return Err(invalid("file not found"));
        }
        if !backup.ends_with(".gz") {
            return Err(invalid("expected a .gz archive"));
        }

        let canonical = path.canonicalize()?;
        let backup_dir = self.backups.backup_dir().canonicalize()?;
        if !canonical.starts_with(&backup_dir) {
            return Err(invalid("outside the backup directory"));
        }
        if !archive::is_gzip(&canonical)? {
            return Err(invalid("not gzip data"));
        }

        tracing::info!(backup = %canonical.display(), "Backup validated");
        Ok(canonical)
    }

    /// Decompresses into a temporary directory and writes the test sample
    /// next to it.
    fn decode(&self, archive_path: &Path) -> Result<Decoded, AppError> {
        let invalid = |reason: String| AppError::InvalidBackup {
            path: archive_path.to_path_buf(),
            reason,
        };

        let dir = tempfile::tempdir()?;
        let full = dir.path().join(RESTORE_FILE);
        let bytes = archive::decompress(archive_path, &full)
            .map_err(|e| invalid(format!("decompression failed: {}", e)))?;
        tracing::info!(bytes, "Backup decompressed");

        let document = std::fs::read_to_string(&full)
            .map_err(|e| invalid(format!("not a text document: {}", e)))?;
        let sample = graphml::build_sample(&document, self.sample_size, self.sample_size)
            .ok_or_else(|| invalid("contains no graph elements".to_string()))?;

        let sample_path = dir.path().join(SAMPLE_FILE);
        std::fs::write(&sample_path, &sample.xml)?;
        tracing::debug!(nodes = sample.nodes, edges = sample.edges, "Test sample built");

        Ok(Decoded {
            _dir: dir,
            full,
            sample: sample_path,
            sample_nodes: sample.nodes,
            sample_edges: sample.edges,
        })
    }

    /// Wipes the container and data directory, then brings up a fresh
    /// database and connects to it.
    async fn reset(&self) -> Result<Box<dyn CypherExecutor>, AppError> {
        let runtime = self.lifecycle.runtime();
        runtime.down(true).await?;

        match std::fs::remove_dir_all(&self.host.data_dir) {
            Ok(()) => tracing::info!(path = %self.host.data_dir.display(), "Removed data directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.host.data_dir.display(),
                error = %e,
                "Could not remove data directory; continuing"
            ),
        }

        self.host.fixer.fix(&self.host.managed_dirs)?;
        self.host
            .provisioner
            .ensure_plugin(&self.host.plugin_version, &self.host.plugins_dir)
            .await?;

        runtime.up().await?;
        self.lifecycle.wait_ready().await?;

        let conn = self.connect_with_retry().await?;
        self.backups.require_procedure(conn.as_ref(), "import.graphml").await?;
        Ok(conn)
    }

    /// The HTTP probe can pass before Bolt accepts sessions.
    async fn connect_with_retry(&self) -> Result<Box<dyn CypherExecutor>, AppError> {
        let policy = self.lifecycle.policy();
        let attempts = policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.connector.connect().await {
                Ok(conn) => return Ok(conn),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Bolt not accepting connections yet");
                }
            }
            attempt += 1;
            if !policy.interval.is_zero() {
                tokio::time::sleep(policy.interval).await;
            }
        }
    }

    async fn stage_files(&self, decoded: &Decoded) -> Result<(), AppError> {
        let runtime = self.lifecycle.runtime();
        let layout = self.backups.layout();
        for (host, name) in [(&decoded.full, RESTORE_FILE), (&decoded.sample, SAMPLE_FILE)] {
            let target = layout.container_path(name);
            runtime.copy_in(host, &target).await?;
            if let Err(e) = runtime.exec(&["chmod", "644", &target]).await {
                tracing::warn!(path = %target, error = %e, "Could not chmod staged file");
            }
        }
        Ok(())
    }

    /// Clear, test import, confirm, clear, full import, verify.
    async fn import(
        &mut self,
        conn: &dyn CypherExecutor,
    ) -> Result<(ImportStats, i64, i64), AppError> {
        self.enter(RestoreStage::ClearingData);
        clear_database(conn).await?;

        self.enter(RestoreStage::TestImport);
        let test = self.import_or_surface(conn, SAMPLE_FILE).await?;

        self.enter(RestoreStage::AwaitingConfirmation);
        let prompt = format!(
            "Test import loaded {} nodes and {} relationships. Wipe it and run the full restore?",
            test.nodes, test.relationships
        );
        if !self.confirmation.confirm(&prompt).await? {
            clear_database(conn).await?;
            return Err(AppError::RestoreCancelled);
        }

        self.enter(RestoreStage::ClearingData);
        clear_database(conn).await?;

        self.enter(RestoreStage::FullImport);
        let import = self.import_or_surface(conn, RESTORE_FILE).await?;

        self.enter(RestoreStage::Verifying);
        let nodes = node_count(conn).await?;
        let relationships = relationship_count(conn).await?;
        if nodes == 0 {
            return Err(AppError::EmptyRestore);
        }
        tracing::info!(nodes, relationships, "Restored database verified");
        Ok((import, nodes, relationships))
    }

    async fn import_or_surface(
        &self,
        conn: &dyn CypherExecutor,
        file_name: &str,
    ) -> Result<ImportStats, AppError> {
        match self.backups.import_from_graphml(conn, file_name).await {
            Ok(stats) => Ok(stats),
            Err(e) => {
                self.lifecycle.surface_logs().await;
                Err(e)
            }
        }
    }

    async fn remove_staged(&self) {
        let runtime = self.lifecycle.runtime();
        let layout = self.backups.layout();
        for name in [RESTORE_FILE, SAMPLE_FILE] {
            let target = layout.container_path(name);
            if let Err(e) = runtime.exec(&["rm", "-f", &target]).await {
                tracing::warn!(path = %target, error = %e, "Could not remove staged file");
            }
        }
    }
}

/// Absolute paths are taken as is. A relative path that exists from `cwd`
/// (e.g. `backup/<name>.gz`) resolves there; anything else is a name in
/// `backup_dir`.
fn resolve_backup_path(requested: &Path, backup_dir: &Path, cwd: &Path) -> PathBuf {
    if requested.is_absolute() {
        return requested.to_path_buf();
    }
    let from_cwd = cwd.join(requested);
    if from_cwd.is_file() {
        from_cwd
    } else {
        backup_dir.join(requested)
    }
}
