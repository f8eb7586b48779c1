//! In-memory runtime and probe for unit tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::AppError;
use crate::runtime::{ContainerRuntime, HealthProbe};

/// Records every call and simulates the container filesystem as a map.
#[derive(Default)]
pub(crate) struct FakeRuntime {
    running: AtomicBool,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl FakeRuntime {
    pub(crate) fn running() -> Arc<Self> {
        let runtime = Self::default();
        runtime.running.store(true, Ordering::SeqCst);
        Arc::new(runtime)
    }

    pub(crate) fn stopped() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every later call of `op` fail.
    pub(crate) fn fail_on(&self, op: &str) {
        self.failing.lock().unwrap().insert(op.to_string());
    }

    pub(crate) fn is_up(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn called(&self, op: &str) -> bool {
        self.calls().iter().any(|c| c == op || c.starts_with(&format!("{} ", op)))
    }

    pub(crate) fn put_file(&self, path: &str, content: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
    }

    pub(crate) fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    fn record(&self, call: String) -> Result<(), AppError> {
        let op = call.split(' ').next().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(call.clone());
        if self.failing.lock().unwrap().contains(&op) {
            return Err(AppError::Command {
                command: call,
                status: "exit status: 1".to_string(),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn is_running(&self) -> Result<bool, AppError> {
        self.record("is_running".to_string())?;
        Ok(self.running.load(Ordering::SeqCst))
    }

    async fn up(&self) -> Result<(), AppError> {
        self.record("up".to_string())?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn down(&self, remove_volumes: bool) -> Result<(), AppError> {
        self.record(format!("down {}", remove_volumes))?;
        self.running.store(false, Ordering::SeqCst);
        if remove_volumes {
            self.files.lock().unwrap().clear();
        }
        Ok(())
    }

    async fn restart(&self) -> Result<(), AppError> {
        self.record("restart".to_string())
    }

    async fn status(&self) -> Result<String, AppError> {
        self.record("status".to_string())?;
        Ok("neo4j  exited (1)".to_string())
    }

    async fn logs(&self, tail: usize) -> Result<String, AppError> {
        self.record(format!("logs {}", tail))?;
        Ok("ERROR something went wrong".to_string())
    }

    async fn exec(&self, args: &[&str]) -> Result<String, AppError> {
        self.record(format!("exec {}", args.join(" ")))?;
        if let ["rm", "-f", path] = args {
            self.files.lock().unwrap().remove(*path);
        }
        Ok(String::new())
    }

    async fn copy_in(&self, host_path: &Path, container_path: &str) -> Result<(), AppError> {
        self.record(format!("copy_in {}", container_path))?;
        let content = std::fs::read(host_path)?;
        self.put_file(container_path, &content);
        Ok(())
    }

    async fn copy_out(&self, container_path: &str, host_path: &Path) -> Result<(), AppError> {
        self.record(format!("copy_out {}", container_path))?;
        let content = self.file(container_path).ok_or_else(|| AppError::Command {
            command: format!("cp {}", container_path),
            status: "exit status: 1".to_string(),
            stderr: "no such file".to_string(),
        })?;
        std::fs::write(host_path, content)?;
        Ok(())
    }
}

/// Becomes ready after a fixed number of failed checks.
pub(crate) struct FakeProbe {
    failures: Option<usize>,
    checks: AtomicUsize,
}

impl FakeProbe {
    pub(crate) fn ready_after(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures: Some(failures),
            checks: AtomicUsize::new(0),
        })
    }

    pub(crate) fn never() -> Arc<Self> {
        Arc::new(Self {
            failures: None,
            checks: AtomicUsize::new(0),
        })
    }

    pub(crate) fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn is_ready(&self) -> bool {
        let seen = self.checks.fetch_add(1, Ordering::SeqCst);
        self.failures.is_some_and(|f| seen >= f)
    }
}
