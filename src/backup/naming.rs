//! Backup file names and discovery.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};

pub const DEFAULT_PREFIX: &str = "neo4j_backup";

/// `<prefix>_<YYYYMMDD_HHMMSS>.graphml`
pub fn backup_filename(prefix: &str, at: DateTime<Local>) -> String {
    format!("{}_{}.graphml", prefix, at.format("%Y%m%d_%H%M%S"))
}

/// Backup files (`*.graphml*`) in `dir`, oldest first by modification time.
/// A missing directory has no backups.
pub fn list_backups(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut backups: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        let is_backup = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.contains(".graphml"));
        if is_backup && entry.file_type()?.is_file() {
            let modified = entry.metadata()?.modified()?;
            backups.push((modified, path));
        }
    }

    backups.sort();
    Ok(backups.into_iter().map(|(_, path)| path).collect())
}

/// Most recently modified backup, if any.
pub fn latest_backup(dir: &Path) -> io::Result<Option<PathBuf>> {
    Ok(list_backups(dir)?.pop())
}
