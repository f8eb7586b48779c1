//! Setup, start and stop command handlers.

use color_eyre::Result;

use crate::context::Context;
use crate::error::AppError;
use crate::runtime::{shutdown_signal, Lifecycle, RunLock};

use super::App;

impl App {
    /// Run the setup phase only.
    pub async fn run_setup(&self, context: &Context) -> Result<()> {
        let report = context.setup().await?;
        tracing::info!(
            created = report.permissions.created.len(),
            permission_warnings = report.permissions.warnings.len(),
            plugin = %report.plugin.path.display(),
            "Setup complete"
        );
        Ok(())
    }

    /// Setup, start and wait for readiness. A signal during startup stops
    /// the container; with `attach` the command stays up until signalled.
    pub async fn run_start(&self, context: &Context, attach: bool) -> Result<()> {
        let _lock = RunLock::acquire(&context.settings.paths.lock_file)?;

        context.setup().await?;

        let lifecycle = context.lifecycle();
        tokio::select! {
            ready = lifecycle.start() => {
                let ready = ready?;
                if !ready.already_running {
                    tracing::info!(
                        "Neo4j available at {} (browser {})",
                        context.settings.neo4j.uri,
                        context.settings.neo4j.http_url
                    );
                }
            }
            _ = shutdown_signal() => {
                return stop_after_signal(&lifecycle).await;
            }
        }

        if attach {
            tracing::info!("Attached; press Ctrl+C to stop Neo4j");
            shutdown_signal().await;
            lifecycle.stop().await?;
        }
        Ok(())
    }

    pub async fn run_stop(&self, context: &Context) -> Result<()> {
        let _lock = RunLock::acquire(&context.settings.paths.lock_file)?;
        let lifecycle = context.lifecycle();
        tokio::select! {
            stopped = lifecycle.stop() => { stopped?; }
            _ = shutdown_signal() => {
                tracing::warn!("Stop interrupted");
                return Err(AppError::Interrupted.into());
            }
        }
        Ok(())
    }
}

async fn stop_after_signal(lifecycle: &Lifecycle) -> Result<()> {
    tracing::warn!("Startup interrupted, stopping Neo4j");
    if let Err(e) = lifecycle.stop().await {
        tracing::error!(error = %e, "Stop after interrupt failed");
    }
    Err(AppError::Interrupted.into())
}
