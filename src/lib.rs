//! neo4j-manager - operational tooling for a containerized Neo4j with APOC
//!
//! Lifecycle control, host setup (env file, permissions, plugin), health
//! checks, and GraphML backup/restore through APOC.

pub mod backup;
pub mod cli;
pub mod config;
pub mod context;
pub mod env_file;
pub mod error;
pub mod graph;
pub mod health;
pub mod permissions;
pub mod plugin;
pub mod runtime;
