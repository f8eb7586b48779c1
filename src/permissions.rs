//! Best-effort ownership and mode repair for the bind-mounted directories.
//!
//! Mounted filesystems under a Linux subsystem layer routinely refuse
//! `chown` while still working for Neo4j, so only directory creation is
//! fatal. Every other failure becomes a [`PermissionWarning`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::env_file::Owner;
use crate::error::AppError;

/// Mode applied to directories.
pub const DIR_MODE: u32 = 0o755;

/// Bits that must be set on regular files (owner rw, group/other r).
const FILE_MODE_SET: u32 = 0o644;

/// Which operation failed on a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOp {
    Chown,
    Chmod,
    Read,
}

/// A tolerated failure.
#[derive(Debug, Clone)]
pub struct PermissionWarning {
    pub path: PathBuf,
    pub op: PermissionOp,
    pub message: String,
}

/// Outcome of a [`PermissionFixer::fix`] call.
#[derive(Debug, Clone, Default)]
pub struct PermissionReport {
    /// Directories that did not exist and were created.
    pub created: Vec<PathBuf>,
    /// Number of paths whose ownership and mode were both applied.
    pub fixed: usize,
    pub warnings: Vec<PermissionWarning>,
}

impl PermissionReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Applies ownership and modes to a set of directories.
#[derive(Debug, Clone, Copy)]
pub struct PermissionFixer {
    owner: Owner,
}

impl PermissionFixer {
    pub fn new(owner: Owner) -> Self {
        Self { owner }
    }

    /// Creates each directory if missing, then recursively applies owner and
    /// modes. Fails only when a directory cannot be created.
    pub fn fix<P: AsRef<Path>>(&self, dirs: &[P]) -> Result<PermissionReport, AppError> {
        let mut report = PermissionReport::default();

        for dir in dirs {
            let dir = dir.as_ref();
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|source| AppError::CreateDir {
                    path: dir.to_path_buf(),
                    source,
                })?;
                tracing::info!(path = %dir.display(), "Created directory");
                report.created.push(dir.to_path_buf());
            }
            self.apply_tree(dir, &mut report);
        }

        if report.is_clean() {
            tracing::debug!(fixed = report.fixed, "Permissions applied");
        } else {
            tracing::warn!(
                fixed = report.fixed,
                warnings = report.warnings.len(),
                "Some permission changes were refused; continuing"
            );
        }
        Ok(report)
    }

    /// Applies owner and file mode to a single file.
    pub fn fix_file(&self, path: &Path) -> PermissionReport {
        let mut report = PermissionReport::default();
        self.apply_one(path, false, &mut report);
        report
    }

    fn apply_tree(&self, dir: &Path, report: &mut PermissionReport) {
        self.apply_one(dir, true, report);

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn(report, dir, PermissionOp::Read, &e);
                return;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn(report, dir, PermissionOp::Read, &e);
                    continue;
                }
            };
            let path = entry.path();
            match entry.file_type() {
                // Symlinks are left alone; following them could escape the tree
                Ok(ft) if ft.is_symlink() => {}
                Ok(ft) if ft.is_dir() => self.apply_tree(&path, report),
                Ok(_) => self.apply_one(&path, false, report),
                Err(e) => warn(report, &path, PermissionOp::Read, &e),
            }
        }
    }

    fn apply_one(&self, path: &Path, is_dir: bool, report: &mut PermissionReport) {
        let owned = match chown(path, self.owner) {
            Ok(()) => true,
            Err(e) => {
                warn(report, path, PermissionOp::Chown, &e);
                false
            }
        };
        let moded = match chmod(path, is_dir) {
            Ok(()) => true,
            Err(e) => {
                warn(report, path, PermissionOp::Chmod, &e);
                false
            }
        };
        if owned && moded {
            report.fixed += 1;
        }
    }
}

fn warn(report: &mut PermissionReport, path: &Path, op: PermissionOp, err: &io::Error) {
    tracing::warn!(path = %path.display(), ?op, error = %err, "Permission change failed");
    report.warnings.push(PermissionWarning {
        path: path.to_path_buf(),
        op,
        message: err.to_string(),
    });
}

#[cfg(unix)]
fn chown(path: &Path, owner: Owner) -> io::Result<()> {
    std::os::unix::fs::chown(path, Some(owner.uid), Some(owner.gid))
}

#[cfg(not(unix))]
fn chown(_path: &Path, _owner: Owner) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn chmod(path: &Path, is_dir: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = if is_dir {
        DIR_MODE
    } else {
        let current = fs::metadata(path)?.permissions().mode() & 0o777;
        (current | FILE_MODE_SET) & !0o002
    };
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn chmod(_path: &Path, _is_dir: bool) -> io::Result<()> {
    Ok(())
}
