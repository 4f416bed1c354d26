//! # Data Models Module / 数据模型模块
//!
//! This module defines the data structures that flow through a run: the test
//! cases being executed, the log buffer a failing sandbox writes into, the
//! per-leaf results and the report for the whole run.
//!
//! 此模块定义了一次运行中流转的数据结构：被执行的测试用例、失败沙箱写入的日志缓冲区、
//! 每个叶子的结果以及整个运行的报告。

use anyhow::{bail, Result};
use chrono::{DateTime, Local};
use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::core::worker::Sandbox;

/// The body of a test, run once per leaf against a fresh sandbox.
pub type TestFn = Arc<dyn Fn(Arc<dyn Sandbox>) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A named test function.
///
/// The name is supplied explicitly and becomes the first segment of every
/// leaf name, with its first letter capitalized.
///
/// 具名的测试函数。
/// 名称由调用方显式提供，并作为每个叶子名称的第一段（首字母大写）。
#[derive(Clone)]
pub struct TestCase {
    pub name: String,
    pub func: TestFn,
}

impl TestCase {
    pub fn new<F, Fut>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(Arc<dyn Sandbox>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |sb: Arc<dyn Sandbox>| -> BoxFuture<'static, Result<()>> {
                Box::pin(func(sb))
            }),
        }
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Line buffer a sandbox writes its diagnostic logs into.
/// 沙箱写入诊断日志的行缓冲区。
#[derive(Debug, Default, Clone)]
pub struct LeafLog {
    lines: Vec<String>,
}

impl LeafLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, line: impl fmt::Display) {
        self.lines.push(line.to_string());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_string(self) -> String {
        self.lines.join("\n")
    }
}

/// Enumerates why a leaf failed.
/// 枚举叶子失败的原因。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub enum FailureReason {
    /// The mirror lease or the sandbox could not be created.
    /// 无法获取镜像租约或创建沙箱。
    Setup,
    /// The test body returned an error.
    /// 测试体返回了错误。
    TestFailed,
    /// The test body panicked.
    /// 测试体发生了 panic。
    Panicked,
    /// Releasing the sandbox or the mirror lease failed.
    /// 释放沙箱或镜像租约失败。
    Release,
}

/// The outcome of one (test × worker × matrix value) leaf.
/// 单个（测试 × worker × 矩阵值）叶子的结果。
#[derive(Debug, Clone, Serialize)]
pub enum LeafResult {
    Passed {
        name: String,
        duration: Duration,
    },
    Failed {
        name: String,
        reason: FailureReason,
        /// Error text of every failure seen on this leaf / 此叶子上所有失败的错误文本
        output: String,
        /// Logs captured from the sandbox / 从沙箱捕获的日志
        logs: String,
        duration: Duration,
    },
    /// The worker could not satisfy this combination.
    /// worker 无法满足该组合。
    Skipped {
        name: String,
        reason: String,
    },
}

impl LeafResult {
    pub fn name(&self) -> &str {
        match self {
            LeafResult::Passed { name, .. }
            | LeafResult::Failed { name, .. }
            | LeafResult::Skipped { name, .. } => name,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, LeafResult::Failed { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, LeafResult::Skipped { .. })
    }

    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            LeafResult::Failed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn get_duration(&self) -> Option<Duration> {
        match self {
            LeafResult::Passed { duration, .. } | LeafResult::Failed { duration, .. } => {
                Some(*duration)
            }
            LeafResult::Skipped { .. } => None,
        }
    }

    /// Records a release failure on top of the current outcome.
    ///
    /// A passing leaf becomes a `Release` failure; an already failed leaf
    /// keeps its original reason and gains the extra error text.
    ///
    /// 在当前结果之上记录释放失败。
    /// 通过的叶子变为 `Release` 失败；已失败的叶子保留原因并追加错误文本。
    pub fn with_release_error(self, err: &anyhow::Error) -> Self {
        let message = format!("release failed: {err:#}");
        match self {
            LeafResult::Passed { name, duration } => LeafResult::Failed {
                name,
                reason: FailureReason::Release,
                output: message,
                logs: String::new(),
                duration,
            },
            LeafResult::Failed {
                name,
                reason,
                output,
                logs,
                duration,
            } => LeafResult::Failed {
                name,
                reason,
                output: format!("{output}\n{message}"),
                logs,
                duration,
            },
            LeafResult::Skipped { name, reason } => LeafResult::Failed {
                name,
                reason: FailureReason::Release,
                output: format!("{reason}\n{message}"),
                logs: String::new(),
                duration: Duration::default(),
            },
        }
    }
}

/// Results of one `Harness::run`.
/// 一次 `Harness::run` 的结果。
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Local>,
    /// Leaf results sorted by name / 按名称排序的叶子结果
    pub results: Vec<LeafResult>,
    /// Set when the run's own mirror lease failed to release.
    /// 当运行自身的镜像租约释放失败时设置。
    pub teardown_error: Option<String>,
    /// The run was skipped in short mode / 该运行在短模式下被跳过
    pub short_circuited: bool,
}

impl RunReport {
    pub fn new(started_at: DateTime<Local>) -> Self {
        Self {
            started_at,
            results: Vec::new(),
            teardown_error: None,
            short_circuited: false,
        }
    }

    pub fn short_mode() -> Self {
        Self {
            short_circuited: true,
            ..Self::new(Local::now())
        }
    }

    pub fn passed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, LeafResult::Passed { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.is_skipped()).count()
    }

    pub fn get(&self, name: &str) -> Option<&LeafResult> {
        self.results.iter().find(|r| r.name() == name)
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0 || self.teardown_error.is_some()
    }

    /// Fails with the names of every failed leaf.
    /// 以所有失败叶子的名称作为错误返回。
    pub fn ensure_success(&self) -> Result<()> {
        if !self.has_failures() {
            return Ok(());
        }
        let mut failures: Vec<&str> = self
            .results
            .iter()
            .filter(|r| r.is_failure())
            .map(LeafResult::name)
            .collect();
        if let Some(err) = &self.teardown_error {
            failures.push(err.as_str());
        }
        bail!("{} leaf failure(s): {}", self.failed(), failures.join(", "))
    }
}
