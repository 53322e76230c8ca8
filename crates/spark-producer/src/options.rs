//! # 守卫配置
//!
//! ## 角色定位（Why）
//! - 把“未进入作用域即推进”的兼容策略与诊断名称集中为可序列化配置，
//!   上层可以从 TOML/JSON 配置文件统一下发，而不是在每个调用点硬编码。
//!
//! ## 契约说明（What）
//! - 缺省字段回落到 [`GuardOptions::default`]：标签 `"producer"`、兼容策略 [`LegacyIteration::Warn`]；
//! - 配置在构造守卫时拷贝进实例，之后不可变。

use serde::{Deserialize, Serialize};

/// 未进入作用域即推进时的处置策略。
///
/// # 教案式说明
/// - **意图 (Why)**：早期调用点直接迭代生产者而不建立作用域，这类误用需要平滑降级一次，
///   同时允许新代码选择严格模式；
/// - **契约 (What)**：`Warn` 记录一条警告并自动进入作用域；`Reject` 返回
///   [`UsageError::NotEntered`](crate::UsageError::NotEntered)；
/// - **风险 (Trade-offs)**：`Warn` 下自动进入的守卫只能依赖耗尽或 `Drop` 释放生产者，
///   拿不到异步拆除的错误报告。
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacyIteration {
    /// 记录警告后自动进入作用域。
    #[default]
    Warn,
    /// 视为硬性误用。
    Reject,
}

/// 守卫配置。
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct GuardOptions {
    /// 诊断名称，出现在日志字段与错误消息中。
    pub label: String,
    /// 未进入作用域即推进时的策略。
    pub legacy_iteration: LegacyIteration,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            label: "producer".to_owned(),
            legacy_iteration: LegacyIteration::default(),
        }
    }
}

impl GuardOptions {
    /// 设置诊断名称。
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// 设置兼容策略。
    pub fn with_legacy_iteration(mut self, policy: LegacyIteration) -> Self {
        self.legacy_iteration = policy;
        self
    }
}
