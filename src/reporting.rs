//! # Reporting Module / 报告模块
//!
//! This module prints run results to the console with colored, localized
//! output.
//!
//! 此模块以彩色、本地化的方式将运行结果打印到控制台。

pub mod console;

pub use console::{print_failure_details, print_summary};
