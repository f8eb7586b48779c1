//! Start/stop of the managed container.

use std::sync::Arc;

use crate::error::AppError;
use crate::runtime::{ContainerRuntime, HealthProbe, WaitPolicy};

/// Log lines surfaced when startup times out.
const TIMEOUT_LOG_TAIL: usize = 50;

/// The container answered the readiness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    /// True when the container was already running and no start was issued.
    pub already_running: bool,
    /// Probe attempts used; 0 when already running.
    pub attempts: u32,
}

/// The stop command succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stopped;

/// Start/stop controller over a runtime and a readiness probe.
#[derive(Clone)]
pub struct Lifecycle {
    runtime: Arc<dyn ContainerRuntime>,
    probe: Arc<dyn HealthProbe>,
    policy: WaitPolicy,
}

impl Lifecycle {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        probe: Arc<dyn HealthProbe>,
        policy: WaitPolicy,
    ) -> Self {
        Self {
            runtime,
            probe,
            policy,
        }
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    /// Starts the container unless it is already running, then waits for
    /// readiness.
    pub async fn start(&self) -> Result<Ready, AppError> {
        if self.runtime.is_running().await? {
            tracing::info!("Neo4j is already running");
            return Ok(Ready {
                already_running: true,
                attempts: 0,
            });
        }

        self.runtime.up().await?;
        self.wait_ready().await
    }

    /// Polls the probe per the wait policy. On timeout the recent container
    /// logs are logged and [`AppError::StartupTimeout`] is returned.
    pub async fn wait_ready(&self) -> Result<Ready, AppError> {
        tracing::info!(
            attempts = self.policy.attempts,
            interval_secs = self.policy.interval.as_secs(),
            "Waiting for Neo4j to become ready"
        );

        let ready = self
            .policy
            .poll(|attempt| async move {
                let ok = self.probe.is_ready().await;
                if !ok {
                    tracing::info!(
                        "Waiting for Neo4j... ({}/{})",
                        attempt,
                        self.policy.attempts
                    );
                }
                ok
            })
            .await;

        match ready {
            Some(attempts) => {
                tracing::info!(attempts, "Neo4j is ready");
                Ok(Ready {
                    already_running: false,
                    attempts,
                })
            }
            None => {
                self.surface_logs().await;
                Err(AppError::StartupTimeout {
                    attempts: self.policy.attempts,
                    waited_secs: self.policy.total().as_secs(),
                })
            }
        }
    }

    /// Stops the container. On failure the container status is logged
    /// before the error is returned.
    pub async fn stop(&self) -> Result<Stopped, AppError> {
        match self.runtime.down(false).await {
            Ok(()) => {
                tracing::info!("Neo4j stopped");
                Ok(Stopped)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to stop Neo4j");
                match self.runtime.status().await {
                    Ok(status) => tracing::error!("Container status:\n{}", status),
                    Err(status_err) => {
                        tracing::error!(error = %status_err, "Could not read container status")
                    }
                }
                Err(e)
            }
        }
    }

    /// Restarts the container and waits for readiness.
    pub async fn restart(&self) -> Result<Ready, AppError> {
        self.runtime.restart().await?;
        self.wait_ready().await
    }

    /// Logs the last lines of container output at ERROR.
    pub async fn surface_logs(&self) {
        match self.runtime.logs(TIMEOUT_LOG_TAIL).await {
            Ok(logs) => tracing::error!("Recent Neo4j logs:\n{}", logs),
            Err(e) => tracing::error!(error = %e, "Could not fetch Neo4j logs"),
        }
    }

    /// The readiness wait policy, reused for connection retries.
    pub fn policy(&self) -> WaitPolicy {
        self.policy
    }
}
