//! Backup, restore and listing command handlers.

use std::sync::Arc;

use color_eyre::Result;

use crate::backup::AutoConfirm;
use crate::context::Context;
use crate::error::AppError;
use crate::runtime::{shutdown_signal, RunLock};

use super::App;

impl App {
    pub async fn run_create_backup(&self, context: &Context) -> Result<()> {
        let lifecycle = context.lifecycle();
        let manager = context.backup_manager(lifecycle.runtime().clone())?;
        let conn = context.connect().await?;

        let report = manager.create_backup(&conn).await?;
        println!(
            "{} ({} bytes, {} nodes, {} relationships)",
            report.archive.display(),
            report.size_bytes,
            report.export.nodes,
            report.export.relationships
        );
        Ok(())
    }

    /// Restore under the operation lock; `yes` skips the prompt. A signal
    /// abandons the restore at its current stage and releases the lock.
    pub async fn run_restore(&self, context: &Context, filename: &str, yes: bool) -> Result<()> {
        let _lock = RunLock::acquire(&context.settings.paths.lock_file)?;

        let mut workflow = context.restore_workflow()?;
        if yes {
            workflow = workflow.with_confirmation(Arc::new(AutoConfirm));
        }
        tracing::warn!("Restoring {} will delete all current data", filename);

        let restored = tokio::select! {
            report = workflow.restore(filename) => Some(report),
            _ = shutdown_signal() => None,
        };
        let Some(report) = restored else {
            tracing::error!(
                stage = %workflow.stage(),
                "Restore interrupted; the database may be empty or partially loaded"
            );
            return Err(AppError::Interrupted.into());
        };
        let report = report?;
        println!(
            "Restored {} ({} nodes, {} relationships)",
            report.backup.display(),
            report.nodes,
            report.relationships
        );
        Ok(())
    }

    pub fn run_list_backups(&self, context: &Context) -> Result<()> {
        let backups = crate::backup::naming::list_backups(&context.settings.paths.backup)?;
        if backups.is_empty() {
            println!("No backups in {}", context.settings.paths.backup.display());
            return Ok(());
        }
        for path in backups {
            let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            println!("{}  {} bytes", path.display(), size);
        }
        Ok(())
    }
}
