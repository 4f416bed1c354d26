//! # Feature Matrix Module / 特性矩阵模块
//!
//! This module expands a caller-declared feature matrix into every combination
//! of choices. Each combination is a `MatrixValue`, which also renders the
//! suffix used in leaf names.
//!
//! 此模块将调用方声明的特性矩阵展开为所有选项组合。
//! 每个组合是一个 `MatrixValue`，它同时负责渲染叶子名称中使用的后缀。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::core::worker::HarnessError;

/// The choices declared for one feature: choice name → opaque value.
/// 为单个特性声明的选项：选项名称 → 不透明值。
pub type FeatureChoices = BTreeMap<String, Value>;

/// A feature matrix declaration: feature name → its choices.
/// Immutable once a run starts.
///
/// 特性矩阵规格：特性名称 → 其选项。
/// 运行开始后不可变。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatrixSpec {
    features: BTreeMap<String, FeatureChoices>,
}

/// A single selected choice of one feature.
/// 某个特性的单个已选选项。
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixChoice {
    /// Name of the choice, rendered in leaf names / 选项名称，会渲染到叶子名称中
    pub name: String,
    /// Opaque value handed to workers and test bodies / 传递给 worker 和测试体的不透明值
    pub value: Value,
}

/// One combination of feature choices, exactly one choice per feature.
///
/// The empty value (no dimensions) is the identity used when the matrix is
/// empty; it renders an empty suffix.
///
/// 特性选项的一个组合，每个特性恰好一个选项。
///
/// 空值（没有维度）是矩阵为空时使用的单位元；它渲染为空后缀。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixValue {
    choices: BTreeMap<String, MatrixChoice>,
}

impl MatrixSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares (or replaces) the choices of one feature dimension.
    /// 声明（或替换）一个特性维度的选项。
    pub fn insert<K, I, N>(&mut self, feature: K, choices: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (N, Value)>,
        N: Into<String>,
    {
        let choices = choices
            .into_iter()
            .map(|(name, value)| (name.into(), value))
            .collect();
        self.features.insert(feature.into(), choices);
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterates the declared features with their choices.
    pub fn features(&self) -> impl Iterator<Item = (&str, &FeatureChoices)> {
        self.features.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of combinations `expand` will produce.
    /// 计算 `expand` 将产生的组合数量。
    pub fn combination_count(&self) -> usize {
        self.features.values().map(BTreeMap::len).product()
    }

    /// Rejects features declared without any choice.
    /// 拒绝没有声明任何选项的特性。
    pub fn validate(&self) -> Result<(), HarnessError> {
        match self.features().find(|(_, choices)| choices.is_empty()) {
            Some((feature, _)) => Err(HarnessError::InvalidConfig(format!(
                "feature '{feature}' declares no choices"
            ))),
            None => Ok(()),
        }
    }

    /// Expands the matrix into its full cartesian product.
    ///
    /// The accumulator starts as a single empty value and is crossed with the
    /// choices of each feature in turn, so an empty matrix yields
    /// exactly one empty `MatrixValue`. A feature declared with no choices
    /// makes the product empty.
    ///
    /// 将规格展开为完整的笛卡尔积。
    ///
    /// 累加器从单个空值开始，依次与每个特性的选项做叉积，
    /// 因此空规格恰好产生一个空的 `MatrixValue`。
    /// 没有任何选项的特性会使乘积为空。
    pub fn expand(&self) -> Vec<MatrixValue> {
        let mut acc = vec![MatrixValue::default()];
        for (feature, choices) in &self.features {
            let mut next = Vec::with_capacity(acc.len() * choices.len());
            for partial in &acc {
                for (name, value) in choices {
                    let mut combined = partial.clone();
                    combined.choices.insert(
                        feature.clone(),
                        MatrixChoice {
                            name: name.clone(),
                            value: value.clone(),
                        },
                    );
                    next.push(combined);
                }
            }
            acc = next;
        }
        acc
    }
}

impl MatrixValue {
    /// Feature names present in this combination, in sorted order.
    pub fn dimensions(&self) -> impl Iterator<Item = &str> {
        self.choices.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn choice(&self, feature: &str) -> Option<&MatrixChoice> {
        self.choices.get(feature)
    }

    /// Returns the opaque value chosen for `feature`, if the feature is part
    /// of this combination.
    pub fn value(&self, feature: &str) -> Option<&Value> {
        self.choices.get(feature).map(|c| &c.value)
    }

    /// Renders `/feature=choice` for every dimension, sorted by feature name.
    ///
    /// The order never depends on how the matrix was built, so the
    /// same logical combination always yields the same leaf name.
    ///
    /// 按特性名称排序，为每个维度渲染 `/feature=choice`。
    /// 顺序与规格的构建方式无关，因此相同的逻辑组合总是产生相同的叶子名称。
    pub fn function_suffix(&self) -> String {
        // BTreeMap keys iterate in lexicographic order.
        self.choices
            .iter()
            .map(|(feature, choice)| format!("/{}={}", feature, choice.name))
            .collect()
    }
}

impl fmt::Display for MatrixValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.function_suffix())
    }
}
