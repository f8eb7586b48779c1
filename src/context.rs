//! Application context: loaded settings plus constructors for the
//! components each command wires together.

use std::sync::Arc;

use crate::backup::{BackupLayout, BackupManager, HostSetup, RestoreWorkflow};
use crate::config::Settings;
use crate::env_file::{EnvConfig, EnvFile, Owner};
use crate::error::AppError;
use crate::graph::{Credentials, Neo4jConnection, Neo4jConnector};
use crate::permissions::{PermissionFixer, PermissionReport};
use crate::plugin::{HttpFetcher, PluginProvisioner, ProvisionedPlugin};
use crate::runtime::{ContainerRuntime, DockerCompose, HttpProbe, Lifecycle};

/// Root context passed to every command.
#[derive(Clone)]
pub struct Context {
    pub settings: Arc<Settings>,
    pub owner: Owner,
}

impl Context {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Arc::new(settings),
            owner: Owner::current(),
        }
    }

    /// Loads settings from defaults, config files and environment.
    pub fn load() -> Result<Self, AppError> {
        Ok(Self::new(Settings::load()?))
    }

    pub fn env_file(&self) -> EnvFile {
        EnvFile::new(&self.settings.paths.env_file)
    }

    /// Credentials from the env file, read-only.
    pub fn credentials(&self) -> Credentials {
        self.credentials_from(&self.env_file().load_or_default())
    }

    pub fn credentials_from(&self, env: &EnvConfig) -> Credentials {
        Credentials {
            uri: self.settings.neo4j.uri.clone(),
            username: env.username.clone(),
            password: env.password.clone(),
        }
    }

    pub async fn connect(&self) -> Result<Neo4jConnection, AppError> {
        Neo4jConnection::open_with(&self.credentials()).await
    }

    pub fn runtime(&self) -> Arc<dyn ContainerRuntime> {
        let container = &self.settings.container;
        Arc::new(DockerCompose::new(
            &container.compose_file,
            &container.service,
            &self.settings.neo4j.version,
        ))
    }

    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::new(
            self.runtime(),
            Arc::new(HttpProbe::new(&self.settings.neo4j.http_url)),
            self.settings.wait.policy(),
        )
    }

    pub fn fixer(&self) -> PermissionFixer {
        PermissionFixer::new(self.owner)
    }

    pub fn provisioner(&self) -> PluginProvisioner {
        PluginProvisioner::new(
            Arc::new(HttpFetcher::new()),
            self.settings.plugin.clone(),
            self.owner,
        )
    }

    pub fn backup_manager(&self, runtime: Arc<dyn ContainerRuntime>) -> Result<BackupManager, AppError> {
        let container = &self.settings.container;
        BackupManager::new(
            runtime,
            BackupLayout {
                backup_dir: self.settings.paths.backup.clone(),
                container_import_dir: container.import_dir.clone(),
                staging_file: container.staging_file.clone(),
            },
        )
    }

    /// Restore workflow over the compose runtime; prompts before the full
    /// import unless the caller swaps the confirmation.
    pub fn restore_workflow(&self) -> Result<RestoreWorkflow, AppError> {
        let lifecycle = self.lifecycle();
        let backups = self.backup_manager(lifecycle.runtime().clone())?;
        let paths = &self.settings.paths;
        let host = HostSetup {
            provisioner: self.provisioner(),
            fixer: self.fixer(),
            plugin_version: self.settings.neo4j.version.clone(),
            plugins_dir: paths.plugins.clone(),
            data_dir: paths.data.clone(),
            managed_dirs: paths.managed_dirs(),
        };
        let connector = Arc::new(Neo4jConnector::new(self.credentials()));
        Ok(RestoreWorkflow::new(lifecycle, connector, backups, host))
    }

    /// Env file, directories and plugin: everything needed before the
    /// container can start.
    pub async fn setup(&self) -> Result<SetupReport, AppError> {
        let env = self.env_file().load_or_create()?;
        tracing::info!(
            uid = env.owner.uid,
            gid = env.owner.gid,
            path = %self.settings.paths.env_file.display(),
            "Env file ready"
        );

        let permissions = self.fixer().fix(&self.settings.paths.managed_dirs())?;
        let plugin = self
            .provisioner()
            .ensure_plugin(&self.settings.neo4j.version, &self.settings.paths.plugins)
            .await?;

        Ok(SetupReport {
            env,
            permissions,
            plugin,
        })
    }
}

/// What [`Context::setup`] did.
#[derive(Debug, Clone)]
pub struct SetupReport {
    pub env: EnvConfig,
    pub permissions: PermissionReport,
    pub plugin: ProvisionedPlugin,
}
