//! # 守卫状态机
//!
//! ## 状态机约束（What）
//! - 合法跃迁：`Created → Entered ⇄ Running → Finished`；`Created` 与 `Entered`、`Running`
//!   均可直接进入 `Finished`（拆除、耗尽、异常或推进中途被取消）；
//! - `Finished` 为终态，不接受任何跃迁；
//! - `Running` 仅在一次推进/注入尚未返回时可见。

use core::fmt;

/// 守卫生命周期状态。
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ProducerState {
    /// 已构造，尚未进入作用域。
    Created,
    /// 已进入作用域，生产者挂起等待推进。
    Entered,
    /// 一次推进或注入正在进行。
    Running,
    /// 生产者已被终止并释放。
    Finished,
}

impl ProducerState {
    /// 判断状态是否允许跃迁至 `target`。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：守卫内部每次写入状态前都以此校验，保持状态图与实现一致；
    /// - **执行 (How)**：通过匹配元组 `(self, target)` 实现有限状态机判定。
    pub fn can_transition_to(self, target: ProducerState) -> bool {
        matches!(
            (self, target),
            (ProducerState::Created, ProducerState::Entered)
                | (ProducerState::Created, ProducerState::Finished)
                | (ProducerState::Entered, ProducerState::Running)
                | (ProducerState::Entered, ProducerState::Finished)
                | (ProducerState::Running, ProducerState::Entered)
                | (ProducerState::Running, ProducerState::Finished)
        )
    }

    /// 是否已终止。
    pub fn is_terminal(self) -> bool {
        matches!(self, ProducerState::Finished)
    }

    /// 日志字段使用的小写名称。
    pub fn as_str(self) -> &'static str {
        match self {
            ProducerState::Created => "created",
            ProducerState::Entered => "entered",
            ProducerState::Running => "running",
            ProducerState::Finished => "finished",
        }
    }
}

impl fmt::Display for ProducerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
