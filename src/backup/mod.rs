//! Backup and restore through APOC GraphML export/import.
//!
//! - [`BackupManager`] - export, copy out, compress and verify
//! - [`RestoreWorkflow`] - validated, staged, confirmed restore

pub mod archive;
pub mod graphml;
mod manager;
pub mod naming;
mod restore;

#[cfg(test)]
pub(crate) mod testing;

pub use manager::{BackupLayout, BackupManager, BackupReport, ExportStats, ImportStats};
pub use restore::{
    AutoConfirm, Confirmation, HostSetup, PromptConfirm, RestoreReport, RestoreStage,
    RestoreWorkflow, DEFAULT_SAMPLE_SIZE,
};
