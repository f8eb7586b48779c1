//! APOC plugin provisioning.
//!
//! The jar version must match the Neo4j version exactly; mismatched pairs do
//! not load. The provisioner only fetches what it is asked for and never
//! inspects the running database.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::config::PluginSettings;
use crate::env_file::Owner;
use crate::error::AppError;
use crate::permissions::PermissionFixer;

/// Downloads a URL to a local file.
///
/// On failure the destination may be left partially written.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), AppError>;
}

/// Streams a download into the destination file with reqwest.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), AppError> {
        let download_err = |reason: String| AppError::PluginDownload {
            url: url.to_string(),
            reason,
        };

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_err(e.to_string()))?;

        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| download_err(e.to_string()))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// Result of [`PluginProvisioner::ensure_plugin`].
#[derive(Debug, Clone)]
pub struct ProvisionedPlugin {
    pub path: PathBuf,
    /// False when the jar was already present.
    pub downloaded: bool,
    /// True when the download failed but a non-empty partial file was kept.
    pub partial: bool,
}

/// Ensures the versioned APOC jar exists in the plugins directory.
#[derive(Clone)]
pub struct PluginProvisioner {
    fetcher: Arc<dyn ArtifactFetcher>,
    source: PluginSettings,
    owner: Owner,
}

impl PluginProvisioner {
    pub fn new(fetcher: Arc<dyn ArtifactFetcher>, source: PluginSettings, owner: Owner) -> Self {
        Self {
            fetcher,
            source,
            owner,
        }
    }

    /// File name of the jar for a version.
    pub fn jar_name(version: &str) -> String {
        format!("apoc-{}-core.jar", version)
    }

    /// Returns the jar path, downloading it first if it does not exist.
    ///
    /// Existence is sufficient; no checksum is verified.
    pub async fn ensure_plugin(
        &self,
        version: &str,
        dest_dir: &Path,
    ) -> Result<ProvisionedPlugin, AppError> {
        let path = dest_dir.join(Self::jar_name(version));

        if path.exists() {
            tracing::info!(path = %path.display(), "APOC plugin already present");
            return Ok(ProvisionedPlugin {
                path,
                downloaded: false,
                partial: false,
            });
        }

        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|source| AppError::CreateDir {
                path: dest_dir.to_path_buf(),
                source,
            })?;

        let url = self.source.url_for(version);
        tracing::info!(url = %url, "Downloading APOC plugin");

        let partial = match self.fetcher.fetch(&url, &path).await {
            Ok(()) => false,
            Err(e) => {
                let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
                if size == 0 {
                    let _ = tokio::fs::remove_file(&path).await;
                    tracing::error!(error = %e, "APOC download failed");
                    return Err(e);
                }
                tracing::warn!(
                    error = %e,
                    bytes = size,
                    "APOC download failed but a partial file exists; continuing with it"
                );
                true
            }
        };

        let report = PermissionFixer::new(self.owner).fix_file(&path);
        if !report.is_clean() {
            tracing::warn!(path = %path.display(), "Could not set plugin permissions");
        }

        Ok(ProvisionedPlugin {
            path,
            downloaded: true,
            partial,
        })
    }
}
