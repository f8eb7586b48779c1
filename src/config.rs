//! Tool configuration with layered resolution using figment.
//!
//! Resolution order (highest priority last):
//! 1. Built-in defaults
//! 2. User config: `~/.config/neo4j-manager/config.toml` (XDG) or platform config dir
//! 3. Project config: `.neo4j-manager.toml`
//! 4. Environment variables: `NEO4J_MANAGER_*` (nested keys split on `__`)
//!
//! Credentials and memory sizing do not live here; they belong to the
//! container's env file (see [`crate::env_file`]).
//!
//! **Project config** (`.neo4j-manager.toml`):
//! ```toml
//! [neo4j]
//! version = "5.26.0"
//!
//! [wait]
//! interval_secs = 2
//! attempts = 30
//! ```

use std::ops::Deref;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::runtime::WaitPolicy;

/// Boxed wrapper for figment::Error to reduce Result size on the stack.
#[derive(Debug)]
pub struct ConfigError(Box<figment::Error>);

impl Deref for ConfigError {
    type Target = figment::Error;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self(Box::new(err))
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub neo4j: Neo4jSettings,
    #[serde(default)]
    pub container: ContainerSettings,
    #[serde(default)]
    pub paths: PathSettings,
    #[serde(default)]
    pub wait: WaitSettings,
    #[serde(default)]
    pub plugin: PluginSettings,
}

/// Database endpoints and version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jSettings {
    /// Bolt URI used for queries.
    pub uri: String,
    /// HTTP endpoint polled by the readiness probe.
    pub http_url: String,
    /// Neo4j version (`year.month.patch`). The APOC jar is provisioned with
    /// the same version string.
    pub version: String,
}

impl Default for Neo4jSettings {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            http_url: "http://localhost:7474".to_string(),
            version: "5.26.0".to_string(),
        }
    }
}

/// How the container is addressed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSettings {
    /// Compose file, relative to the working directory.
    pub compose_file: PathBuf,
    /// Compose service running Neo4j.
    pub service: String,
    /// Neo4j import directory inside the container. APOC reads and writes
    /// GraphML files here.
    pub import_dir: String,
    /// Fixed name of the export staging file inside `import_dir`.
    pub staging_file: String,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            compose_file: PathBuf::from("docker-compose.yml"),
            service: "neo4j".to_string(),
            import_dir: "/var/lib/neo4j/import".to_string(),
            staging_file: "backup_staging.graphml".to_string(),
        }
    }
}

/// Host directories bind-mounted into the container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    pub env_file: PathBuf,
    pub data: PathBuf,
    pub logs: PathBuf,
    pub plugins: PathBuf,
    pub import: PathBuf,
    pub backup: PathBuf,
    /// Lock file held while a lifecycle or restore operation runs.
    pub lock_file: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            env_file: PathBuf::from(".env"),
            data: PathBuf::from("data"),
            logs: PathBuf::from("logs"),
            plugins: PathBuf::from("plugins"),
            import: PathBuf::from("import"),
            backup: PathBuf::from("backup"),
            lock_file: PathBuf::from(".neo4j-manager.lock"),
        }
    }
}

impl PathSettings {
    /// Directories that must exist with usable permissions before start.
    pub fn managed_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.data.clone(),
            self.logs.clone(),
            self.plugins.clone(),
            self.import.clone(),
            self.backup.clone(),
        ]
    }
}

/// Readiness polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitSettings {
    pub interval_secs: u64,
    pub attempts: u32,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            interval_secs: 2,
            attempts: 30,
        }
    }
}

impl WaitSettings {
    pub fn policy(&self) -> WaitPolicy {
        WaitPolicy::new(Duration::from_secs(self.interval_secs), self.attempts)
    }
}

/// APOC download location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSettings {
    /// URL template; `{version}` is substituted.
    pub url_template: String,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            url_template:
                "https://github.com/neo4j/apoc/releases/download/{version}/apoc-{version}-core.jar"
                    .to_string(),
        }
    }
}

impl PluginSettings {
    pub fn url_for(&self, version: &str) -> String {
        self.url_template.replace("{version}", version)
    }
}

impl Settings {
    /// Load settings with layered resolution (defaults → user → project → env).
    pub fn load() -> Result<Self, ConfigError> {
        Self::figment(Self::user_config_path(), PathBuf::from(".neo4j-manager.toml"))
            .extract()
            .map_err(ConfigError::from)
    }

    fn figment(user_config: PathBuf, project_config: PathBuf) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(user_config))
            .merge(Toml::file(project_config))
            .merge(Env::prefixed("NEO4J_MANAGER_").split("__"))
    }

    /// User config path: ~/.config/neo4j-manager/config.toml (XDG) or platform config dir.
    fn user_config_path() -> PathBuf {
        if let Some(home) = dirs::home_dir() {
            let xdg_path = home
                .join(".config")
                .join("neo4j-manager")
                .join("config.toml");
            if xdg_path.exists() {
                return xdg_path;
            }
        }
        dirs::config_dir()
            .map(|p| p.join("neo4j-manager").join("config.toml"))
            .unwrap_or_default()
    }
}
