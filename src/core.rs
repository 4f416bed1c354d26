//! # Core Module / 核心模块
//!
//! This module contains the core functionality of Matrix Harness:
//! feature-matrix expansion, leaf planning, the worker boundary and the
//! execution engine.
//!
//! 此模块包含 Matrix Harness 的核心功能：
//! 特性矩阵展开、叶子计划、worker 边界以及执行引擎。

pub mod config;
pub mod execution;
pub mod matrix;
pub mod models;
pub mod planner;
pub mod worker;

// Re-exports
pub use execution::Harness;
pub use matrix::{MatrixSpec, MatrixValue};
pub use models::{LeafResult, RunReport, TestCase};
