//! # Console Reporting Module / 控制台报告模块
//!
//! This module prints the summary of a run and the details of every failed
//! leaf, with colored and localized output.
//!
//! 此模块打印运行摘要以及每个失败叶子的详细信息，输出带颜色且支持国际化。

use colored::*;

use crate::core::models::{FailureReason, LeafResult, RunReport};
use crate::infra::t;

/// Prints a formatted summary of a run to the console.
///
/// 在控制台打印格式化的运行摘要。
///
/// # Output Format / 输出格式
/// ```text
/// --- Leaf Summary ---
///   - Passed   | Foo/worker=oci/driver=a                          |    1.23s
///   - Failed   | Foo/worker=oci/driver=b                          |    0.45s
///   - Skipped  | Foo/worker=rootless/driver=a                     |      N/A
/// ```
pub fn print_summary(report: &RunReport, locale: &str) {
    if report.short_circuited {
        println!("\n{}", t!("summary.short_mode", locale = locale).dimmed());
        return;
    }

    println!("\n{}", t!("summary.banner", locale = locale).bold());
    println!(
        "{}",
        t!(
            "summary.started_at",
            locale = locale,
            time = report.started_at.format("%Y-%m-%d %H:%M:%S")
        )
        .dimmed()
    );

    for result in &report.results {
        let duration_str = result
            .get_duration()
            .map(|d| format!("{:.2?}", d))
            .unwrap_or_else(|| "N/A".to_string());

        let status = match result {
            LeafResult::Passed { .. } => t!("summary.status_passed", locale = locale).green(),
            LeafResult::Failed { .. } => t!("summary.status_failed", locale = locale).red(),
            LeafResult::Skipped { .. } => t!("summary.status_skipped", locale = locale).dimmed(),
        };

        println!(
            "  - {:<10} | {:<48} | {:>8}",
            status,
            result.name(),
            duration_str
        );
    }

    println!(
        "\n{}",
        t!(
            "summary.totals",
            locale = locale,
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped()
        )
        .bold()
    );

    if let Some(err) = &report.teardown_error {
        println!("{}", t!("summary.teardown_failed", locale = locale, error = err).red());
    }
}

/// Prints the error output and captured sandbox logs of every failed leaf.
/// Does nothing when no leaf failed.
///
/// 打印每个失败叶子的错误输出和捕获的沙箱日志。没有叶子失败时不做任何操作。
pub fn print_failure_details(report: &RunReport, locale: &str) {
    let failures: Vec<&LeafResult> = report.results.iter().filter(|r| r.is_failure()).collect();
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("failure.banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));

    for (i, result) in failures.iter().enumerate() {
        println!(
            "[{}/{}] {} '{}'",
            i + 1,
            failures.len(),
            t!("failure.header", locale = locale).red(),
            result.name().cyan()
        );

        if let LeafResult::Failed {
            reason,
            output,
            logs,
            ..
        } = result
        {
            println!(
                "{}",
                t!("failure.reason", locale = locale, reason = reason_label(*reason, locale))
                    .yellow()
            );
            println!("\n{}\n", output);
            if !logs.is_empty() {
                println!("--- {} ---\n", t!("failure.sandbox_logs", locale = locale).yellow());
                println!("{}", logs);
            }
            println!("\n{}", "-".repeat(80));
        }
    }
}

fn reason_label(reason: FailureReason, locale: &str) -> String {
    match reason {
        FailureReason::Setup => t!("failure.reason_setup", locale = locale),
        FailureReason::TestFailed => t!("failure.reason_test", locale = locale),
        FailureReason::Panicked => t!("failure.reason_panic", locale = locale),
        FailureReason::Release => t!("failure.reason_release", locale = locale),
    }
    .to_string()
}
