//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for Matrix Harness:
//! the shared registry mirror, the cross-process provisioning lock and
//! file system helpers.
//!
//! 此模块为 Matrix Harness 提供基础设施服务：
//! 共享注册表镜像、跨进程配置锁以及文件系统辅助功能。

pub mod fs;
pub mod lease;
pub mod mirror;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
