//! Application error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::graph::QueryError;

/// Application-level errors for neo4j-manager.
#[derive(Error, Debug)]
pub enum AppError {
    // Neo4j errors
    #[error("Neo4j connection error: {0}")]
    Connection(#[from] neo4rs::Error),

    #[error("Neo4j query error: {0}")]
    Query(#[from] QueryError),

    #[error("APOC procedure not available: {0}")]
    PluginUnavailable(String),

    // Setup errors
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Plugin download failed for {url}: {reason}")]
    PluginDownload { url: String, reason: String },

    #[error("Env file error: {0}")]
    EnvFile(#[from] crate::env_file::EnvFileError),

    // Container errors
    #[error("Command `{command}` failed ({status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Neo4j did not become ready after {attempts} attempts ({waited_secs}s)")]
    StartupTimeout { attempts: u32, waited_secs: u64 },

    #[error("Another neo4j-manager operation holds {0}; remove it if no operation is running")]
    Busy(PathBuf),

    #[error("Interrupted by signal")]
    Interrupted,

    // Backup / restore errors
    #[error("Invalid backup file {path}: {reason}")]
    InvalidBackup { path: PathBuf, reason: String },

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Restore finished but the database holds no nodes")]
    EmptyRestore,

    #[error("Restore cancelled by operator")]
    RestoreCancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}
