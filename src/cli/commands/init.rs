//! # Init Command Module / 初始化命令模块
//!
//! This module implements the `init` command for the Matrix Harness CLI,
//! which creates a new harness configuration file.
//!
//! 此模块实现了 Matrix Harness CLI 的 `init` 命令，
//! 用于创建新的配置文件。

use anyhow::{bail, Context, Result};
use colored::*;
use std::{fs, path::Path};

use crate::infra::t;

/// File name used when no path is given.
pub const DEFAULT_CONFIG_NAME: &str = "HarnessMatrix.toml";

const DEFAULT_CONFIG: &str = r#"# Matrix Harness Configuration / Matrix Harness 配置

# Language for console messages / 控制台消息的语言
language = "en"

# Test names, capitalized in leaf names / 测试名称，在叶子名称中首字母大写
tests = ["build_simple", "export_cache"]

# Registered workers / 已注册的 worker
workers = ["oci", "containerd"]

# One table per feature dimension; each key is a choice.
# 每个特性维度一个表；每个键是一个选项。
[matrix.snapshotter]
overlayfs = "overlayfs"
native = "native"

[matrix.network]
host = "host"
"#;

/// Writes the default harness file to `path`.
/// Refuses to overwrite an existing file.
///
/// 将默认配置文件写入 `path`。拒绝覆盖已存在的文件。
pub fn execute(path: &Path, locale: &str) -> Result<()> {
    if path.exists() {
        bail!(t!("init.already_exists", locale = locale, path = path.display()).to_string());
    }

    fs::write(path, default_config())
        .with_context(|| t!("init.write_failed", locale = locale, path = path.display()).to_string())?;

    println!(
        "{} {}",
        "✔".green(),
        t!("init.created", locale = locale, path = path.display()).bold()
    );
    println!("{}", t!("init.usage_hint", locale = locale));
    Ok(())
}

/// The content `execute` writes.
pub fn default_config() -> &'static str {
    DEFAULT_CONFIG
}
