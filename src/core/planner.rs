//! # Leaf Planning Module / 叶子计划模块
//!
//! Turns tests, workers and expanded matrix values into the list of leaves a
//! run will execute, naming each leaf and rejecting duplicate names.
//!
//! 将测试、worker 和展开后的矩阵值转换为一次运行要执行的叶子列表，
//! 为每个叶子命名并拒绝重复的名称。

use anyhow::Result;
use std::collections::HashSet;

use crate::core::matrix::MatrixValue;
use crate::core::worker::HarnessError;

/// One planned (test × worker × matrix value) leaf, stored as indices into
/// the inputs it was planned from.
///
/// 一个已计划的（测试 × worker × 矩阵值）叶子，以输入列表中的索引形式存储。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLeaf {
    pub name: String,
    pub test_index: usize,
    pub worker_index: usize,
    pub matrix_index: usize,
}

/// Represents the leaves a run will execute.
/// 表示一次运行要执行的叶子。
#[derive(Debug)]
pub struct ExecutionPlan {
    pub leaves: Vec<PlannedLeaf>,
    /// Leaves dropped by the name filter / 被名称过滤器排除的叶子数量
    pub filtered_count: usize,
}

/// Upper-cases the first character of a test name.
/// 将测试名称的首字符转换为大写。
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Builds the display name of a leaf:
/// `Capitalized(test)/worker=<worker><matrix suffix>`.
///
/// 构建叶子的显示名称：`Capitalized(test)/worker=<worker><矩阵后缀>`。
pub fn leaf_name(test: &str, worker: &str, matrix: &MatrixValue) -> String {
    format!(
        "{}/worker={}{}",
        capitalize(test),
        worker,
        matrix.function_suffix()
    )
}

/// Plans every leaf, iterating workers, then tests, then matrix values.
///
/// Duplicate derived names are an authoring error and fail the whole plan.
/// The filter is applied afterwards, so a duplicate is reported even if the
/// filter would have excluded it.
///
/// 计划所有叶子，依次遍历 worker、测试和矩阵值。
/// 重复的派生名称属于编写错误，会使整个计划失败。
/// 过滤器在之后应用，因此即使过滤器会排除重复项，重复也会被报告。
pub fn plan_execution(
    tests: &[&str],
    workers: &[&str],
    matrix: &[MatrixValue],
    filter: Option<&str>,
) -> Result<ExecutionPlan> {
    let mut seen = HashSet::new();
    let mut leaves = Vec::with_capacity(tests.len() * workers.len() * matrix.len());

    for (worker_index, worker) in workers.iter().enumerate() {
        for (test_index, test) in tests.iter().enumerate() {
            for (matrix_index, value) in matrix.iter().enumerate() {
                let name = leaf_name(test, worker, value);
                if !seen.insert(name.clone()) {
                    return Err(HarnessError::DuplicateLeaf(name).into());
                }
                leaves.push(PlannedLeaf {
                    name,
                    test_index,
                    worker_index,
                    matrix_index,
                });
            }
        }
    }

    let total = leaves.len();
    if let Some(filter) = filter.filter(|f| !f.is_empty()) {
        leaves.retain(|leaf| leaf.name.contains(filter));
    }

    Ok(ExecutionPlan {
        filtered_count: total - leaves.len(),
        leaves,
    })
}
