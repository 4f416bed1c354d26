//! # Plan Command Module / 计划命令模块
//!
//! Implements the `plan` command, which expands a harness file into the leaf
//! names a run would execute without starting anything.
//!
//! 实现 `plan` 命令：将配置文件展开为一次运行将要执行的叶子名称，而不启动任何内容。

use anyhow::Result;
use colored::*;
use std::path::Path;

use crate::core::config::load_harness_file;
use crate::core::planner::plan_execution;
use crate::infra::t;

/// Prints every planned leaf name followed by the total count.
///
/// # Arguments
/// * `config` - Path to the harness file
/// * `filter` - Optional substring a leaf name must contain
/// * `locale` - Language given on the command line; the file's `language`
///   is used when absent
pub fn execute(config: &Path, filter: Option<&str>, locale: Option<&str>) -> Result<()> {
    let file = load_harness_file(config)?;
    let locale = locale.unwrap_or(file.language.as_str());

    println!(
        "{}",
        t!("plan.loading", locale = locale, path = config.display())
    );

    let matrix = file.matrix.expand();
    let tests: Vec<&str> = file.tests.iter().map(String::as_str).collect();
    let workers: Vec<&str> = file.workers.iter().map(String::as_str).collect();
    let plan = plan_execution(&tests, &workers, &matrix, filter)?;

    for leaf in &plan.leaves {
        println!("  {}", leaf.name);
    }

    if plan.filtered_count > 0 {
        println!(
            "{}",
            t!("run.filtered_leaves", locale = locale, count = plan.filtered_count).cyan()
        );
    }
    println!(
        "\n{}",
        t!("plan.total", locale = locale, count = plan.leaves.len()).bold()
    );
    Ok(())
}
