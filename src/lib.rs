//! # Matrix Harness Library / Matrix Harness 库
//!
//! Runs a fixed set of test functions against every combination of
//! registered execution workers and a caller-declared feature matrix, while
//! sharing one reference-counted registry mirror across all leaves and,
//! optionally, across processes on the same host.
//!
//! 针对已注册的执行 worker 与调用方声明的特性矩阵的每种组合运行一组固定的测试函数，
//! 同时在所有叶子之间（并可选地在同一主机的多个进程之间）共享一个引用计数的注册表镜像。
//!
//! ## Modules / 模块
//!
//! - `core` - Matrix expansion, leaf planning, worker boundary and execution engine
//! - `infra` - Registry mirror lifecycle, provisioning lock and file system helpers
//! - `reporting` - Console summaries of run results
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 矩阵展开、叶子计划、worker 边界和执行引擎
//! - `infra` - 注册表镜像生命周期、配置锁和文件系统辅助功能
//! - `reporting` - 运行结果的控制台摘要
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use crate::core::config::{RunConfig, SandboxConfig};
pub use crate::core::worker::{HarnessError, ReleaseFn, Sandbox, Worker, WorkerRegistry};
pub use crate::core::{Harness, LeafResult, MatrixSpec, MatrixValue, RunReport, TestCase};
pub use infra::mirror::{
    ArtifactCopier, MirrorConfig, MirrorLease, MirrorManager, ProvisionedMirror, Provisioner,
};

/// Initializes the application's internationalization (i18n) based on the system locale.
///
/// This function detects the user's system locale and sets the appropriate
/// language for console messages. It attempts to match the full locale
/// (e.g., "zh-CN"), then just the language code (e.g., "en"), and finally
/// falls back to the default language ("en").
pub fn init() {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    set_language(&locale);
}

/// Selects the console language, falling back to "en" for unknown locales.
/// 选择控制台语言，未知语言回退到 "en"。
pub fn set_language(locale: &str) {
    let available_locales = rust_i18n::available_locales!();

    let lang = if available_locales.contains(&locale) {
        locale
    } else {
        locale
            .split('-')
            .next()
            .filter(|lang_code| available_locales.contains(lang_code))
            .unwrap_or("en")
    };

    rust_i18n::set_locale(lang);
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
