//! # Test Execution Engine Module / 测试执行引擎模块
//!
//! This module drives a run: it plans every (test × worker × matrix value)
//! leaf, holds the run's own mirror reference for the whole run, and executes
//! each leaf as an independent task that acquires a mirror reference, builds
//! a sandbox, runs the test body and releases everything on every exit path.
//!
//! 此模块驱动一次运行：它计划每个（测试 × worker × 矩阵值）叶子，
//! 在整个运行期间持有运行自身的镜像引用，并将每个叶子作为独立任务执行：
//! 获取镜像引用、构建沙箱、运行测试体，并在所有退出路径上释放全部资源。

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use colored::*;
use futures::{stream, StreamExt};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::core::config::{RunConfig, SandboxConfig};
use crate::core::matrix::MatrixValue;
use crate::core::models::{FailureReason, LeafLog, LeafResult, RunReport, TestCase};
use crate::core::planner::{self, PlannedLeaf};
use crate::core::worker::{is_requirements_error, Worker, WorkerRegistry};
use crate::infra::mirror::MirrorManager;
use crate::infra::t;

/// Runs test cases against every registered worker and matrix combination.
/// 针对每个已注册的 worker 和矩阵组合运行测试用例。
#[derive(Debug, Clone)]
pub struct Harness {
    registry: WorkerRegistry,
    mirror: MirrorManager,
}

impl Harness {
    pub fn new(registry: WorkerRegistry, mirror: MirrorManager) -> Self {
        Self { registry, mirror }
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn mirror(&self) -> &MirrorManager {
        &self.mirror
    }

    /// Executes every leaf and returns the collected results.
    ///
    /// Matrix validation, planning and mirror setup errors are returned as
    /// `Err` before any leaf starts. Leaf failures are contained in the
    /// report; call
    /// `RunReport::ensure_success` to turn them into an error.
    ///
    /// 执行所有叶子并返回收集到的结果。
    /// 矩阵校验、计划和镜像准备错误会在任何叶子开始之前作为 `Err` 返回。
    /// 叶子失败包含在报告中；调用 `RunReport::ensure_success` 可将其转换为错误。
    pub async fn run(&self, tests: &[TestCase], config: RunConfig) -> Result<RunReport> {
        let locale = config
            .language
            .clone()
            .unwrap_or_else(|| rust_i18n::locale().to_string());

        if config.short {
            println!("{}", t!("run.short_mode", locale = &locale).dimmed());
            return Ok(RunReport::short_mode());
        }

        config.matrix.validate()?;
        let matrix = config.matrix.expand();
        let test_names: Vec<&str> = tests.iter().map(|tc| tc.name.as_str()).collect();
        let plan = planner::plan_execution(
            &test_names,
            &self.registry.names(),
            &matrix,
            config.filter.as_deref(),
        )?;

        if plan.filtered_count > 0 {
            println!(
                "{}",
                t!("run.filtered_leaves", locale = &locale, count = plan.filtered_count).cyan()
            );
        }

        let started_at = Local::now();
        let run_lease = self
            .mirror
            .acquire()
            .await
            .context(t!("run.mirror_setup_failed", locale = &locale).to_string())?;
        println!(
            "{}",
            t!("run.mirror_ready", locale = &locale, address = run_lease.address()).cyan()
        );
        println!(
            "{}",
            t!(
                "run.planned_leaves",
                locale = &locale,
                count = plan.leaves.len(),
                jobs = config.effective_jobs()
            )
            .bold()
        );

        let handles = stream::iter(plan.leaves.into_iter().map(|leaf| {
            let worker = Arc::clone(&self.registry.list()[leaf.worker_index]);
            let test = tests[leaf.test_index].clone();
            let value = matrix[leaf.matrix_index].clone();
            let mirror = self.mirror.clone();
            let locale = locale.clone();

            async move { run_leaf(leaf, worker, test, value, mirror, &locale).await }
        }))
        .buffer_unordered(config.effective_jobs())
        .collect::<Vec<LeafResult>>()
        .await;

        let mut report = RunReport::new(started_at);
        report.results = handles;
        report.results.sort_by(|a, b| a.name().cmp(b.name()));

        if let Err(e) = run_lease.release().await {
            warn!(error = %format!("{e:#}"), "run-level mirror release failed");
            report.teardown_error = Some(format!("{e:#}"));
        }

        Ok(report)
    }
}

/// Executes one leaf. The leaf's mirror reference is released before the
/// result is returned, whatever the outcome.
///
/// Only the sandbox work runs in a spawned task. The lease stays in this
/// future, so a panicking worker cannot drop it and defer the release past
/// the end of the run.
///
/// 执行单个叶子。无论结果如何，叶子的镜像引用都会在返回结果之前被释放。
/// 只有沙箱相关工作在派生的任务中运行；租约保留在当前 future 中，
/// 因此 panic 的 worker 无法丢弃它并把释放推迟到运行结束之后。
async fn run_leaf(
    leaf: PlannedLeaf,
    worker: Arc<dyn Worker>,
    test: TestCase,
    value: MatrixValue,
    mirror: MirrorManager,
    locale: &str,
) -> LeafResult {
    let start = Instant::now();
    println!("{}", t!("run.running_leaf", locale = locale, name = &leaf.name).blue());

    let lease = match mirror.acquire().await {
        Ok(lease) => lease,
        Err(e) => {
            return report_outcome(
                LeafResult::Failed {
                    name: leaf.name,
                    reason: FailureReason::Setup,
                    output: format!("{e:#}"),
                    logs: String::new(),
                    duration: start.elapsed(),
                },
                locale,
            );
        }
    };

    let config = SandboxConfig::default()
        .with_mirror(lease.address())
        .with_mirror_config_dir(lease.config_dir())
        .with_matrix_value(value);
    let name = leaf.name.clone();
    let handle = tokio::spawn(async move {
        execute_in_sandbox(&name, worker.as_ref(), test, config, start).await
    });
    let result = match handle.await {
        Ok(result) => result,
        Err(e) => LeafResult::Failed {
            name: leaf.name,
            reason: FailureReason::Panicked,
            output: format!("Critical error during leaf execution: {}", join_message(e)),
            logs: String::new(),
            duration: start.elapsed(),
        },
    };

    let result = match lease.release().await {
        Ok(()) => result,
        Err(e) => result.with_release_error(&e),
    };
    report_outcome(result, locale)
}

async fn execute_in_sandbox(
    name: &str,
    worker: &dyn Worker,
    test: TestCase,
    config: SandboxConfig,
    start: Instant,
) -> LeafResult {
    let (sandbox, release) = match worker.new_sandbox(config).await {
        Ok(built) => built,
        Err(e) if is_requirements_error(&e) => {
            return LeafResult::Skipped {
                name: name.to_string(),
                reason: format!("{e:#}"),
            };
        }
        Err(e) => {
            return LeafResult::Failed {
                name: name.to_string(),
                reason: FailureReason::Setup,
                output: format!("{e:#}"),
                logs: String::new(),
                duration: start.elapsed(),
            };
        }
    };

    // The body runs in its own task so a panic surfaces as a JoinError and
    // the sandbox is still released below.
    let body = tokio::spawn((test.func)(Arc::clone(&sandbox)));
    let outcome = match body.await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some((FailureReason::TestFailed, format!("{e:#}"))),
        Err(e) => Some((FailureReason::Panicked, join_message(e))),
    };

    let result = match outcome {
        None => LeafResult::Passed {
            name: name.to_string(),
            duration: start.elapsed(),
        },
        Some((reason, output)) => {
            let mut log = LeafLog::new();
            let captured = panic::catch_unwind(AssertUnwindSafe(|| sandbox.print_logs(&mut log)));
            if captured.is_err() {
                log.log("log capture panicked");
            }
            LeafResult::Failed {
                name: name.to_string(),
                reason,
                output,
                logs: log.into_string(),
                duration: start.elapsed(),
            }
        }
    };

    drop(sandbox);
    // Spawned so a panicking release still reports instead of unwinding the leaf.
    match tokio::spawn(async move { release().await }).await {
        Ok(Ok(())) => result,
        Ok(Err(e)) => {
            debug!(leaf = name, "sandbox release failed");
            result.with_release_error(&e)
        }
        Err(e) => {
            debug!(leaf = name, "sandbox release panicked");
            result.with_release_error(&anyhow!(join_message(e)))
        }
    }
}

fn join_message(err: JoinError) -> String {
    if err.is_panic() {
        panic_message(err.into_panic())
    } else {
        err.to_string()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

fn report_outcome(result: LeafResult, locale: &str) -> LeafResult {
    match &result {
        LeafResult::Passed { name, duration } => println!(
            "{}",
            t!(
                "run.leaf_passed",
                locale = locale,
                name = name,
                duration = format!("{:.2?}", duration)
            )
            .green()
        ),
        LeafResult::Failed { name, duration, .. } => println!(
            "{}",
            t!(
                "run.leaf_failed",
                locale = locale,
                name = name,
                duration = format!("{:.2?}", duration)
            )
            .red()
        ),
        LeafResult::Skipped { name, reason } => println!(
            "{}",
            t!("run.leaf_skipped", locale = locale, name = name, reason = reason).yellow()
        ),
    }
    result
}
