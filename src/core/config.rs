//! # Configuration Module / 配置模块
//!
//! Run-level and sandbox-level configuration. Each configuration is a plain
//! struct with `with_*` builder methods that take and return the struct, so
//! independent options can be applied in any order.
//!
//! Also loads the TOML harness file used by the command-line interface.
//!
//! 运行级和沙箱级配置。每种配置都是普通结构体，带有接收并返回该结构体的 `with_*`
//! 构建方法，因此独立的选项可以按任意顺序应用。
//!
//! 同时负责加载命令行界面使用的 TOML 配置文件。

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::matrix::{MatrixSpec, MatrixValue};
use crate::core::worker::HarnessError;

/// Enables short mode, which skips the whole run.
pub const SHORT_ENV: &str = "MATRIX_HARNESS_SHORT";
/// Restricts the run to leaves whose name contains the given text.
pub const FILTER_ENV: &str = "MATRIX_HARNESS_FILTER";

/// Configuration handed to a worker when it builds one sandbox.
/// 构建单个沙箱时传递给 worker 的配置。
#[derive(Debug, Clone, Default)]
pub struct SandboxConfig {
    /// Address of the shared registry mirror / 共享注册表镜像的地址
    pub mirror: Option<String>,
    /// Directory holding the generated mirror registration file.
    /// 存放生成的镜像注册文件的目录。
    pub mirror_config_dir: Option<PathBuf>,
    /// Matrix combination selected for this leaf / 为此叶子选择的矩阵组合
    pub matrix: MatrixValue,
}

impl SandboxConfig {
    pub fn with_mirror(mut self, address: impl Into<String>) -> Self {
        self.mirror = Some(address.into());
        self
    }

    pub fn with_mirror_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mirror_config_dir = Some(dir.into());
        self
    }

    pub fn with_matrix_value(mut self, matrix: MatrixValue) -> Self {
        self.matrix = matrix;
        self
    }
}

/// Configuration for one `Harness::run`.
/// 单次 `Harness::run` 的配置。
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Feature matrix every test is expanded over / 每个测试要展开的特性矩阵
    pub matrix: MatrixSpec,
    /// Maximum number of leaves running at once.
    /// Defaults to half the CPU count plus one.
    /// 同时运行的最大叶子数量。默认为 CPU 数量的一半加一。
    pub jobs: Option<usize>,
    /// Only leaves whose name contains this text run.
    /// 只运行名称包含此文本的叶子。
    pub filter: Option<String>,
    /// Skip the whole run / 跳过整个运行
    pub short: bool,
    /// Locale for console messages / 控制台消息的语言
    pub language: Option<String>,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from `MATRIX_HARNESS_SHORT` and
    /// `MATRIX_HARNESS_FILTER`.
    /// 从 `MATRIX_HARNESS_SHORT` 和 `MATRIX_HARNESS_FILTER` 构建配置。
    pub fn from_env() -> Self {
        let short = env::var(SHORT_ENV)
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let filter = env::var(FILTER_ENV).ok().filter(|f| !f.is_empty());
        Self {
            short,
            filter,
            ..Self::default()
        }
    }

    /// Adds one feature dimension. Call once per feature.
    /// 添加一个特性维度。每个特性调用一次。
    pub fn with_matrix<K, I, N>(mut self, feature: K, choices: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (N, Value)>,
        N: Into<String>,
    {
        self.matrix.insert(feature, choices);
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs.max(1));
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_short(mut self, short: bool) -> Self {
        self.short = short;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Effective parallelism for the run.
    pub fn effective_jobs(&self) -> usize {
        self.jobs.unwrap_or(num_cpus::get() / 2 + 1).max(1)
    }
}

/// The TOML harness file read by the `plan` command.
/// `plan` 命令读取的 TOML 配置文件。
///
/// ```toml
/// language = "en"
/// tests = ["build_simple"]
/// workers = ["oci"]
///
/// [matrix.driver]
/// a = 1
/// b = 2
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessFile {
    /// The language for console messages (e.g., "en", "zh-CN").
    /// 控制台消息的语言（例如 "en", "zh-CN"）。
    #[serde(default = "default_language")]
    pub language: String,
    /// Test names, in registration order / 测试名称，按注册顺序
    pub tests: Vec<String>,
    /// Worker names, in registration order / worker 名称，按注册顺序
    pub workers: Vec<String>,
    #[serde(default)]
    pub matrix: MatrixSpec,
}

fn default_language() -> String {
    "en".to_string()
}

impl HarnessFile {
    /// Rejects files that could never produce a leaf.
    /// 拒绝永远无法产生叶子的配置文件。
    pub fn validate(&self) -> Result<()> {
        if self.tests.is_empty() {
            return Err(HarnessError::InvalidConfig("no tests declared".to_string()).into());
        }
        if self.workers.is_empty() {
            return Err(HarnessError::InvalidConfig("no workers declared".to_string()).into());
        }
        self.matrix.validate()?;
        Ok(())
    }
}

/// Reads, parses and validates a harness file.
/// 读取、解析并校验配置文件。
pub fn load_harness_file(path: &Path) -> Result<HarnessFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read harness file: {}", path.display()))?;
    let file: HarnessFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse harness file: {}", path.display()))?;
    file.validate()?;
    Ok(file)
}
