//! # Reporting Module Unit Tests / Reporting 模块单元测试
//!
//! Exercises the console summary and failure printers on mixed, empty and
//! short-mode reports, and the locale selection they depend on.
//!
//! 使用混合、空以及短模式报告测试控制台摘要与失败详情输出，以及它们依赖的语言选择。

use chrono::Local;
use matrix_harness::core::models::FailureReason;
use matrix_harness::reporting::{print_failure_details, print_summary};
use matrix_harness::{LeafResult, RunReport};
use std::time::Duration;

fn mixed_report() -> RunReport {
    let mut report = RunReport::new(Local::now());
    report.results = vec![
        LeafResult::Passed {
            name: "Foo/worker=oci/driver=a".to_string(),
            duration: Duration::from_millis(1230),
        },
        LeafResult::Failed {
            name: "Foo/worker=oci/driver=b".to_string(),
            reason: FailureReason::TestFailed,
            output: "exit code 1".to_string(),
            logs: "daemon: connection refused".to_string(),
            duration: Duration::from_millis(450),
        },
        LeafResult::Skipped {
            name: "Foo/worker=rootless/driver=a".to_string(),
            reason: "requirements not met: rootless".to_string(),
        },
    ];
    report
}

#[cfg(test)]
mod summary_tests {
    use super::*;

    #[test]
    fn test_mixed_report_in_both_locales() {
        let report = mixed_report();
        for locale in ["en", "zh-CN"] {
            print_summary(&report, locale);
            print_failure_details(&report, locale);
        }
        assert_eq!(report.passed(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);
    }

    #[test]
    fn test_teardown_error_counts_as_failure() {
        let mut report = RunReport::new(Local::now());
        report.teardown_error = Some("registry refused to stop".to_string());

        print_summary(&report, "en");

        assert!(report.has_failures());
        let err = report.ensure_success().unwrap_err();
        assert!(err.to_string().contains("registry refused to stop"));
    }

    #[test]
    fn test_short_mode_and_empty_reports() {
        let short = RunReport::short_mode();
        print_summary(&short, "en");
        print_failure_details(&short, "en");
        assert!(short.ensure_success().is_ok());

        let empty = RunReport::new(Local::now());
        print_failure_details(&empty, "en");
        assert!(!empty.has_failures());
    }

    #[test]
    fn test_ensure_success_lists_failed_leaves() {
        let err = mixed_report().ensure_success().unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("1 leaf failure(s)"));
        assert!(message.contains("Foo/worker=oci/driver=b"));
        assert!(!message.contains("driver=a"));
    }
}

#[cfg(test)]
mod result_tests {
    use super::*;

    #[test]
    fn test_release_error_turns_pass_into_failure() {
        let passed = LeafResult::Passed {
            name: "Foo/worker=W".to_string(),
            duration: Duration::from_secs(1),
        };

        let result = passed.with_release_error(&anyhow::anyhow!("busy mount"));

        assert_eq!(result.reason(), Some(FailureReason::Release));
        assert_eq!(result.get_duration(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_release_error_keeps_original_reason() {
        let failed = LeafResult::Failed {
            name: "Foo/worker=W".to_string(),
            reason: FailureReason::Panicked,
            output: "test panicked: boom".to_string(),
            logs: String::new(),
            duration: Duration::ZERO,
        };

        let result = failed.with_release_error(&anyhow::anyhow!("busy mount"));

        match result {
            LeafResult::Failed { reason, output, .. } => {
                assert_eq!(reason, FailureReason::Panicked);
                assert!(output.contains("boom"));
                assert!(output.contains("release failed: busy mount"));
            }
            other => panic!("expected a failure, got {other:?}"),
        }
    }
}

#[cfg(test)]
mod language_tests {
    /// Locale is process-global, so every case runs in one test.
    #[test]
    fn test_set_language_fallbacks() {
        matrix_harness::set_language("zh-CN");
        assert_eq!(&*rust_i18n::locale(), "zh-CN");

        matrix_harness::set_language("en-US");
        assert_eq!(&*rust_i18n::locale(), "en");

        matrix_harness::set_language("invalid-lang");
        assert_eq!(&*rust_i18n::locale(), "en");

        matrix_harness::set_language("");
        assert_eq!(&*rust_i18n::locale(), "en");
    }
}

#[cfg(test)]
mod leaf_log_tests {
    use matrix_harness::core::models::LeafLog;

    #[test]
    fn test_lines_are_kept_in_order() {
        let mut log = LeafLog::new();
        assert!(log.is_empty());

        log.log("daemon started");
        log.log(format_args!("exit status {}", 1));

        assert_eq!(log.lines(), ["daemon started", "exit status 1"]);
        assert_eq!(log.into_string(), "daemon started\nexit status 1");
    }
}
