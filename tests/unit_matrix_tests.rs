//! # Matrix Module Unit Tests / Matrix 模块单元测试
//!
//! Tests feature-matrix expansion and the suffix rendered for leaf names.
//!
//! 测试特性矩阵的展开以及为叶子名称渲染的后缀。

use matrix_harness::core::matrix::MatrixSpec;
use serde_json::json;
use std::collections::HashSet;

fn driver_mode_spec() -> MatrixSpec {
    let mut spec = MatrixSpec::new();
    spec.insert("driver", [("a", json!(1)), ("b", json!(2))]);
    spec.insert("mode", [("x", json!(10))]);
    spec
}

#[cfg(test)]
mod expansion_tests {
    use super::*;

    #[test]
    fn test_empty_spec_yields_single_empty_value() {
        let values = MatrixSpec::new().expand();

        assert_eq!(values.len(), 1);
        assert!(values[0].is_empty());
        assert_eq!(values[0].function_suffix(), "");
    }

    #[test]
    fn test_product_of_choice_counts() {
        let mut spec = MatrixSpec::new();
        spec.insert("a", [("1", json!(1)), ("2", json!(2)), ("3", json!(3))]);
        spec.insert("b", [("x", json!("x")), ("y", json!("y"))]);
        spec.insert("c", [("on", json!(true)), ("off", json!(false))]);

        let values = spec.expand();

        assert_eq!(values.len(), 12);
        assert_eq!(spec.combination_count(), 12);
    }

    #[test]
    fn test_every_value_has_one_choice_per_feature() {
        let spec = driver_mode_spec();

        for value in spec.expand() {
            let dims: Vec<&str> = value.dimensions().collect();
            assert_eq!(dims, vec!["driver", "mode"]);
            assert!(value.choice("driver").is_some());
            assert_eq!(value.choice("mode").unwrap().name, "x");
        }
    }

    #[test]
    fn test_no_duplicate_combinations() {
        let mut spec = MatrixSpec::new();
        spec.insert("a", [("1", json!(1)), ("2", json!(2))]);
        spec.insert("b", [("1", json!(1)), ("2", json!(2))]);

        let suffixes: HashSet<String> = spec.expand().iter().map(|v| v.function_suffix()).collect();

        assert_eq!(suffixes.len(), 4);
    }

    #[test]
    fn test_feature_without_choices_empties_product() {
        let mut spec = MatrixSpec::new();
        spec.insert("driver", Vec::<(String, serde_json::Value)>::new());
        spec.insert("mode", [("x", json!(10))]);

        assert!(spec.expand().is_empty());
        assert_eq!(spec.combination_count(), 0);
        assert!(matches!(
            spec.validate(),
            Err(matrix_harness::HarnessError::InvalidConfig(msg)) if msg.contains("driver")
        ));
    }

    #[test]
    fn test_well_formed_matrix_validates() {
        let spec = driver_mode_spec();

        assert!(spec.validate().is_ok());
        assert!(!spec.is_empty());
        for value in spec.expand() {
            assert!(!value.is_empty());
            for (feature, _) in spec.features() {
                assert!(value.choice(feature).is_some());
            }
        }
    }

    #[test]
    fn test_values_are_carried_through() {
        let values = driver_mode_spec().expand();
        let b = values
            .iter()
            .find(|v| v.choice("driver").unwrap().name == "b")
            .unwrap();

        assert_eq!(b.value("driver"), Some(&json!(2)));
        assert_eq!(b.value("mode"), Some(&json!(10)));
        assert_eq!(b.value("missing"), None);
    }
}

#[cfg(test)]
mod suffix_tests {
    use super::*;

    #[test]
    fn test_suffix_is_sorted_by_feature() {
        let suffixes: Vec<String> = driver_mode_spec()
            .expand()
            .iter()
            .map(|v| v.function_suffix())
            .collect();

        assert_eq!(suffixes, vec!["/driver=a/mode=x", "/driver=b/mode=x"]);
    }

    #[test]
    fn test_suffix_independent_of_insertion_order() {
        let mut forward = MatrixSpec::new();
        forward.insert("zeta", [("1", json!(1)), ("2", json!(2))]);
        forward.insert("alpha", [("p", json!("p")), ("q", json!("q"))]);

        let mut backward = MatrixSpec::new();
        backward.insert("alpha", [("q", json!("q")), ("p", json!("p"))]);
        backward.insert("zeta", [("2", json!(2)), ("1", json!(1))]);

        let names = |spec: &MatrixSpec| {
            let mut names: Vec<String> = spec.expand().iter().map(ToString::to_string).collect();
            names.sort();
            names
        };

        assert_eq!(names(&forward), names(&backward));
        assert!(names(&forward).contains(&"/alpha=p/zeta=1".to_string()));
    }

    #[test]
    fn test_spec_deserializes_from_toml() {
        let spec: MatrixSpec = toml::from_str(
            r#"
            [driver]
            a = 1
            b = 2

            [mode]
            x = "ten"
            "#,
        )
        .unwrap();

        assert_eq!(spec, driver_mode_spec_with_string_mode());
    }

    fn driver_mode_spec_with_string_mode() -> MatrixSpec {
        let mut spec = MatrixSpec::new();
        spec.insert("driver", [("a", json!(1)), ("b", json!(2))]);
        spec.insert("mode", [("x", json!("ten"))]);
        spec
    }
}
