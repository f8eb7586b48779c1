//! CLI module for neo4j-manager.
//!
//! Subcommands:
//! - `setup`: Env file, directories and APOC plugin
//! - `start`: Setup, then start the container and wait for readiness
//! - `stop`: Stop the container
//! - `health`: Report connectivity, APOC, version and counts
//! - `create-backup`: Export the database to a compressed GraphML archive
//! - `restore-backup`: Replace the database with a backup
//! - `list-backups`: Show backups, newest last

mod backup;
mod health;
mod lifecycle;

use clap::{Parser, Subcommand};

use crate::context::Context;

/// neo4j-manager - run, check and back up a containerized Neo4j
#[derive(Parser)]
#[command(name = "neo4j-manager")]
#[command(about = "Operate a containerized Neo4j with APOC: lifecycle, health, backup and restore")]
#[command(version)]
pub struct App {
    /// Run in verbose mode
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Prepare env file, directories and plugin without starting anything
    Setup,

    /// Start Neo4j and wait until it is ready
    Start {
        /// Stop the container instead of starting it
        #[arg(long, conflicts_with = "attach")]
        stop: bool,

        /// Stay in the foreground and stop Neo4j on SIGINT/SIGTERM
        #[arg(long)]
        attach: bool,
    },

    /// Stop Neo4j
    Stop,

    /// Check connectivity, APOC availability, version and counts
    Health {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the database to backup/neo4j_backup_<timestamp>.graphml.gz
    CreateBackup,

    /// Wipe the database and load a backup from the backup directory
    RestoreBackup {
        /// Backup file name (in the backup directory) or path inside it
        filename: String,

        /// Skip the confirmation prompt after the test import
        #[arg(short, long)]
        yes: bool,
    },

    /// List backups in the backup directory
    ListBackups,
}

impl App {
    /// Run the CLI application.
    pub async fn run(self) -> color_eyre::Result<()> {
        let context = Context::load()?;
        match self.command {
            Command::Setup => self.run_setup(&context).await,
            Command::Start { stop: true, .. } | Command::Stop => self.run_stop(&context).await,
            Command::Start { attach, .. } => self.run_start(&context, attach).await,
            Command::Health { json } => self.run_health(&context, json).await,
            Command::CreateBackup => self.run_create_backup(&context).await,
            Command::RestoreBackup { ref filename, yes } => {
                self.run_restore(&context, filename, yes).await
            }
            Command::ListBackups => self.run_list_backups(&context),
        }
    }
}
