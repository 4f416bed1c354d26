//! # File System Operations Module / 文件系统操作模块
//!
//! Writes the mirror registration file handed to workers and resolves the
//! shared mirror directory from the environment.
//!
//! 写入传递给 worker 的镜像注册文件，并从环境变量解析共享镜像目录。

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File name of the generated mirror registration.
pub const MIRROR_CONFIG_FILE: &str = "registry-mirror.toml";

/// Renders the registration pointing docker.io pulls at `mirror`.
pub fn render_mirror_config(mirror: &str) -> String {
    format!("\n[registry.\"docker.io\"]\nmirrors=[\"{mirror}\"]\n")
}

/// Writes the mirror registration into a fresh temporary directory.
///
/// The directory is `0711` and the file `0644` so that sandboxes running as
/// another user can read the file without listing the directory. The
/// directory is deleted when the returned `TempDir` is dropped.
///
/// 将镜像注册写入一个新的临时目录。
/// 目录权限为 `0711`，文件权限为 `0644`，使以其他用户运行的沙箱可以读取文件但不能列出目录。
/// 返回的 `TempDir` 被丢弃时目录会被删除。
pub fn write_mirror_config(mirror: &str) -> Result<TempDir> {
    let dir = tempfile::Builder::new()
        .prefix("matrix_harness_config")
        .tempdir()
        .context("Failed to create mirror config directory")?;
    set_mode(dir.path(), 0o711)?;

    let path = dir.path().join(MIRROR_CONFIG_FILE);
    fs::write(&path, render_mirror_config(mirror))
        .with_context(|| format!("Failed to write mirror config: {}", path.display()))?;
    set_mode(&path, 0o644)?;

    Ok(dir)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

/// Expands `~` and environment variables in a user-supplied directory.
/// 展开用户提供的目录中的 `~` 和环境变量。
pub fn expand_dir(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .with_context(|| format!("Failed to expand path: {raw}"))?;
    Ok(PathBuf::from(expanded.as_ref()))
}
