//! `docker compose` implementation of [`ContainerRuntime`].

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::AppError;
use crate::runtime::ContainerRuntime;

/// Drives one compose service through the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCompose {
    compose_file: PathBuf,
    service: String,
    /// Passed to compose as `NEO4J_VERSION` so the image tag follows config.
    neo4j_version: String,
}

impl DockerCompose {
    pub fn new(
        compose_file: impl Into<PathBuf>,
        service: impl Into<String>,
        neo4j_version: impl Into<String>,
    ) -> Self {
        Self {
            compose_file: compose_file.into(),
            service: service.into(),
            neo4j_version: neo4j_version.into(),
        }
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "compose".to_string(),
            "-f".to_string(),
            self.compose_file.to_string_lossy().into_owned(),
        ]
    }

    async fn output(&self, args: &[&str]) -> Result<Output, AppError> {
        let mut full = self.base_args();
        full.extend(args.iter().map(|a| a.to_string()));
        tracing::debug!("Running: docker {}", full.join(" "));

        Ok(Command::new("docker")
            .args(&full)
            .env("NEO4J_VERSION", &self.neo4j_version)
            .output()
            .await?)
    }

    /// Runs a compose subcommand and returns stdout, failing on non-zero exit.
    async fn run(&self, args: &[&str]) -> Result<String, AppError> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(AppError::Command {
                command: format!("docker compose {}", args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn container_ref(&self, path: &str) -> String {
        format!("{}:{}", self.service, path)
    }
}

#[async_trait]
impl ContainerRuntime for DockerCompose {
    async fn is_running(&self) -> Result<bool, AppError> {
        let ids = self
            .run(&["ps", "--status", "running", "-q", &self.service])
            .await?;
        Ok(!ids.trim().is_empty())
    }

    async fn up(&self) -> Result<(), AppError> {
        tracing::info!(service = %self.service, "Starting container");
        self.run(&["up", "-d", &self.service]).await.map(|_| ())
    }

    async fn down(&self, remove_volumes: bool) -> Result<(), AppError> {
        tracing::info!(service = %self.service, remove_volumes, "Stopping container");
        if remove_volumes {
            self.run(&["down", "-v"]).await.map(|_| ())
        } else {
            self.run(&["down"]).await.map(|_| ())
        }
    }

    async fn restart(&self) -> Result<(), AppError> {
        tracing::info!(service = %self.service, "Restarting container");
        self.run(&["restart", &self.service]).await.map(|_| ())
    }

    async fn status(&self) -> Result<String, AppError> {
        self.run(&["ps", "-a"]).await
    }

    async fn logs(&self, tail: usize) -> Result<String, AppError> {
        let tail = tail.to_string();
        self.run(&["logs", "--no-color", "--tail", &tail, &self.service])
            .await
    }

    async fn exec(&self, args: &[&str]) -> Result<String, AppError> {
        let mut full = vec!["exec", "-T", self.service.as_str()];
        full.extend_from_slice(args);
        self.run(&full).await
    }

    async fn copy_in(&self, host_path: &Path, container_path: &str) -> Result<(), AppError> {
        let src = host_path.to_string_lossy();
        let dest = self.container_ref(container_path);
        self.run(&["cp", &src, &dest]).await.map(|_| ())
    }

    async fn copy_out(&self, container_path: &str, host_path: &Path) -> Result<(), AppError> {
        let src = self.container_ref(container_path);
        let dest = host_path.to_string_lossy();
        self.run(&["cp", &src, &dest]).await.map(|_| ())
    }
}
