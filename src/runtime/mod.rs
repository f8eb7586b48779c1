//! Container lifecycle: the runtime seam, readiness probing, signal-driven
//! shutdown and the operation lock.
//!
//! - [`ContainerRuntime`] - opaque container controls (start, stop, logs, exec, copy)
//! - [`HealthProbe`] - external readiness signal
//! - [`Lifecycle`] - idempotent start with bounded readiness wait, stop with diagnostics

mod compose;
mod lifecycle;
mod lock;
mod probe;
mod signal;
mod wait;

#[cfg(test)]
pub(crate) mod testing;

use std::path::Path;

use async_trait::async_trait;

use crate::error::AppError;

pub use compose::DockerCompose;
pub use lifecycle::{Lifecycle, Ready, Stopped};
pub use lock::RunLock;
pub use probe::HttpProbe;
pub use signal::shutdown_signal;
pub use wait::WaitPolicy;

/// Controls for the container running Neo4j.
///
/// Every method maps to one external command and fails with
/// [`AppError::Command`] when that command exits non-zero.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Whether the Neo4j container is currently running.
    async fn is_running(&self) -> Result<bool, AppError>;

    /// Starts the container in the background.
    async fn up(&self) -> Result<(), AppError>;

    /// Stops and removes the container; with `remove_volumes` its named
    /// volumes are discarded too.
    async fn down(&self, remove_volumes: bool) -> Result<(), AppError>;

    async fn restart(&self) -> Result<(), AppError>;

    /// Human-readable status listing, used for diagnostics.
    async fn status(&self) -> Result<String, AppError>;

    /// The last `tail` lines of container output.
    async fn logs(&self, tail: usize) -> Result<String, AppError>;

    /// Runs a command inside the container and returns its stdout.
    async fn exec(&self, args: &[&str]) -> Result<String, AppError>;

    /// Copies a host file into the container.
    async fn copy_in(&self, host_path: &Path, container_path: &str) -> Result<(), AppError>;

    /// Copies a container file to the host.
    async fn copy_out(&self, container_path: &str, host_path: &Path) -> Result<(), AppError>;
}

/// External readiness signal.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn is_ready(&self) -> bool;
}
