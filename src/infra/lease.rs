//! # Provisioning Lease Module / 配置租约模块
//!
//! An exclusive advisory file lock that serializes mirror provisioning across
//! cooperating processes sharing one directory.
//!
//! 一个排他的建议性文件锁，用于在共享同一目录的协作进程之间串行化镜像配置。

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the lock file inside the shared mirror directory.
pub const LOCK_FILE_NAME: &str = "lock";

/// Holds the exclusive lock until released or dropped.
/// 持有排他锁，直到被释放或丢弃。
#[derive(Debug)]
pub struct ProvisionLease {
    file: Option<File>,
    path: PathBuf,
}

impl ProvisionLease {
    /// Blocks until the exclusive lock on `<dir>/lock` is held.
    /// The blocking `flock` runs on tokio's blocking pool.
    ///
    /// 阻塞直到持有 `<dir>/lock` 的排他锁。
    /// 阻塞的 `flock` 在 tokio 的阻塞线程池上运行。
    pub async fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        let lock_path = path.clone();
        tokio::task::spawn_blocking(move || Self::acquire_blocking(&lock_path))
            .await
            .context("Provisioning lock task was cancelled")?
    }

    pub fn acquire_blocking(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create lock directory: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        debug!(path = %path.display(), "waiting for provisioning lock");
        file.lock_exclusive()
            .with_context(|| format!("Failed to lock: {}", path.display()))?;
        debug!(path = %path.display(), "provisioning lock held");

        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
        })
    }

    /// Returns `None` when another holder has the lock.
    /// 当锁被其他持有者占用时返回 `None`。
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                file: Some(file),
                path: path.to_path_buf(),
            })),
            Err(_) => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlocks explicitly so an unlock failure can be reported.
    /// 显式解锁，以便报告解锁失败。
    pub fn release(mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .with_context(|| format!("Failed to unlock: {}", self.path.display()))?;
            debug!(path = %self.path.display(), "provisioning lock released");
        }
        Ok(())
    }
}

impl Drop for ProvisionLease {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.unlock() {
                warn!(path = %self.path.display(), error = %e, "failed to unlock provisioning lock");
            }
        }
    }
}
