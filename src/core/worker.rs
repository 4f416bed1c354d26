//! # Worker Module / Worker 模块
//!
//! This module defines the boundary to execution backends. A `Worker` is a
//! named sandbox factory registered once at startup; a `Sandbox` is the
//! environment a single leaf runs in.
//!
//! 此模块定义了与执行后端之间的边界。`Worker` 是在启动时注册一次的具名沙箱工厂；
//! `Sandbox` 是单个叶子运行时所在的环境。

use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use crate::core::config::SandboxConfig;
use crate::core::matrix::MatrixValue;
use crate::core::models::LeafLog;

/// Deferred cleanup returned alongside a sandbox or a provisioned mirror.
/// 与沙箱或已配置的镜像一同返回的延迟清理操作。
pub type ReleaseFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// Errors the harness distinguishes by kind.
/// 框架按类型区分的错误。
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A worker cannot satisfy the requested matrix combination.
    /// The leaf is skipped, not failed.
    /// worker 无法满足请求的矩阵组合。该叶子会被跳过，而不是失败。
    #[error("requirements not met: {0}")]
    Requirements(String),
    /// Two leaves derived the same display name.
    /// 两个叶子推导出了相同的显示名称。
    #[error("duplicate leaf name: {0}")]
    DuplicateLeaf(String),
    /// The harness configuration is unusable.
    /// 框架配置不可用。
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Returns `true` if any error in the chain is `HarnessError::Requirements`.
/// 如果错误链中任一错误是 `HarnessError::Requirements`，则返回 `true`。
pub fn is_requirements_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<HarnessError>(),
            Some(HarnessError::Requirements(_))
        )
    })
}

/// An execution environment built for exactly one leaf.
/// 为单个叶子构建的执行环境。
pub trait Sandbox: Send + Sync {
    /// Endpoint of the service running inside the sandbox.
    fn address(&self) -> &str;

    /// Writes diagnostic logs; called only for failed leaves.
    /// 写入诊断日志；仅对失败的叶子调用。
    fn print_logs(&self, log: &mut LeafLog);

    /// Builds a command that runs against this sandbox.
    fn cmd(&self, args: &[&str]) -> tokio::process::Command;

    /// Starts a private registry and returns its address.
    fn new_registry(&self) -> BoxFuture<'_, Result<String>>;

    fn rootless(&self) -> bool;

    /// The matrix combination this sandbox was built with.
    fn matrix(&self) -> &MatrixValue;

    /// Reads back the value chosen for `feature`.
    /// 读取为 `feature` 选择的值。
    fn value(&self, feature: &str) -> Option<&Value> {
        self.matrix().value(feature)
    }
}

/// A named sandbox factory.
/// 具名的沙箱工厂。
pub trait Worker: Send + Sync {
    fn name(&self) -> &str;

    /// Creates a sandbox configured for one leaf.
    ///
    /// Return `HarnessError::Requirements` (possibly wrapped in context) to
    /// opt out of a matrix combination the worker cannot satisfy.
    ///
    /// 为单个叶子创建已配置的沙箱。
    /// 返回 `HarnessError::Requirements`（可带上下文）以跳过 worker 无法满足的矩阵组合。
    fn new_sandbox(
        &self,
        config: SandboxConfig,
    ) -> BoxFuture<'_, Result<(Arc<dyn Sandbox>, ReleaseFn)>>;
}

/// The workers a run iterates over, in registration order.
/// The host program registers them explicitly at startup.
///
/// 一次运行要遍历的 worker，按注册顺序排列。
/// 由宿主程序在启动时显式注册。
#[derive(Clone, Default)]
pub struct WorkerRegistry {
    workers: Vec<Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, worker: impl Worker + 'static) -> Self {
        self.workers.push(Arc::new(worker));
        self
    }

    pub fn register_arc(mut self, worker: Arc<dyn Worker>) -> Self {
        self.workers.push(worker);
        self
    }

    pub fn list(&self) -> &[Arc<dyn Worker>] {
        &self.workers
    }

    pub fn names(&self) -> Vec<&str> {
        self.workers.iter().map(|w| w.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

impl std::fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
