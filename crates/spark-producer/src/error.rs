//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 区分三类失败：调用方违反生命周期契约（[`UsageError`]）、被包装的生产者违反终止契约
//!   （[`ProtocolViolation`]）、以及生产者或调用方自身的异常（[`GuardError::Passthrough`]）；
//! - 守卫不引入新的业务错误类别，只负责在异常继续传播之前确保生产者已被终止。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，原因链通过 `source()` 暴露；
//! - 每个变体提供稳定错误码（`producer.<类别>.<语义>`），供日志与告警精确分类；
//! - 所有失败对该守卫实例而言都是终局的，不做自动重试。

use thiserror::Error;

/// 稳定错误码集合。
pub mod codes {
    /// 作用域已进入，不支持重入。
    pub const USAGE_REENTERED: &str = "producer.usage.reentered";
    /// 守卫已结束，无法再推进或进入。
    pub const USAGE_CLOSED: &str = "producer.usage.closed";
    /// 未进入作用域即推进（严格模式）。
    pub const USAGE_NOT_ENTERED: &str = "producer.usage.not_entered";
    /// 上一步推进仍未完成。
    pub const USAGE_BUSY: &str = "producer.usage.busy";
    /// 注入异常后生产者仍继续产出。
    pub const PROTOCOL_DID_NOT_STOP: &str = "producer.protocol.did_not_stop";
    /// 注入取消后生产者仍继续产出。
    pub const PROTOCOL_IGNORED_CANCELLATION: &str = "producer.protocol.ignored_cancellation";
    /// 请求关闭后生产者仍继续产出。
    pub const PROTOCOL_IGNORED_CLOSE: &str = "producer.protocol.ignored_close";
    /// 生产者或调用方自身的异常。
    pub const PASSTHROUGH: &str = "producer.passthrough";
    /// 外层作用域取消。
    pub const CANCELLED: &str = "producer.cancelled";
}

/// 调用方违反守卫生命周期契约。
///
/// # 教案式说明
/// - **意图 (Why)**：这些错误都意味着调用点存在缺陷，必须立即暴露给直接调用方；
/// - **契约 (What)**：`label` 为守卫的诊断名称，便于在多个生产者并存时定位；
/// - **风险 (Trade-offs)**：`Busy` 在正常代码中不可达（`&mut self` 已由借用检查排除并发），
///   只会在推进 Future 被 `mem::forget` 之类的方式泄露后出现。
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum UsageError {
    /// 作用域仍活跃时再次进入；守卫不支持重入。
    #[error("`{label}` has already been entered")]
    AlreadyEntered { label: String },
    /// 守卫已终止，任何进入、推进或注入都被拒绝。
    #[error("`{label}` is closed and cannot be used")]
    Closed { label: String },
    /// 严格模式下未进入作用域即推进或注入。
    #[error("`{label}` is iterated outside of its scope")]
    NotEntered { label: String },
    /// 上一步推进或注入仍未落地。
    #[error("`{label}` is already running a step")]
    Busy { label: String },
}

impl UsageError {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            UsageError::AlreadyEntered { .. } => codes::USAGE_REENTERED,
            UsageError::Closed { .. } => codes::USAGE_CLOSED,
            UsageError::NotEntered { .. } => codes::USAGE_NOT_ENTERED,
            UsageError::Busy { .. } => codes::USAGE_BUSY,
        }
    }
}

/// 拆除阶段触发守卫动作的原因，作为后续错误的 `source`。
#[derive(Debug, Error)]
pub enum Cause<E> {
    /// 外层作用域取消。
    #[error("scope was cancelled")]
    Cancelled,
    /// 调用方抛出的业务异常。
    #[error(transparent)]
    Error(E),
}

impl<E> Cause<E> {
    /// 若原因为业务异常，返回其引用。
    pub fn as_error(&self) -> Option<&E> {
        match self {
            Cause::Error(error) => Some(error),
            Cause::Cancelled => None,
        }
    }
}

/// 被包装的生产者在应当终止时继续产出了值。
///
/// # 教案式说明
/// - **意图 (Why)**：生产者忽视终止请求会让资源悬挂，守卫必须响亮失败而不是接受多出来的值；
/// - **契约 (What)**：`cause` 为触发拆除的原始异常或取消；被多产出的值直接丢弃；
/// - **风险 (Trade-offs)**：产出值被丢弃而非回传，避免调用方误以为序列仍可继续。
#[derive(Debug, Error)]
pub enum ProtocolViolation<E> {
    /// 注入调用方异常后，生产者没有结束而是继续产出。
    ///
    /// - **契约 (What)**：`cause` 为被注入的原始异常，经 `source()` 暴露。
    #[error("`{label}` didn't stop after the error was injected")]
    DidNotStop {
        label: String,
        #[source]
        cause: Option<Cause<E>>,
    },
    /// 注入取消信号后，生产者继续产出。
    #[error("`{label}` ignored the cancellation request")]
    IgnoredCancellation {
        label: String,
        #[source]
        cause: Option<Cause<E>>,
    },
    /// 正常关闭请求之后，生产者继续产出。
    #[error("`{label}` ignored the close request")]
    IgnoredClose { label: String },
}

impl<E> ProtocolViolation<E> {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolViolation::DidNotStop { .. } => codes::PROTOCOL_DID_NOT_STOP,
            ProtocolViolation::IgnoredCancellation { .. } => codes::PROTOCOL_IGNORED_CANCELLATION,
            ProtocolViolation::IgnoredClose { .. } => codes::PROTOCOL_IGNORED_CLOSE,
        }
    }

    /// 触发本次违规的原始原因。
    pub fn cause(&self) -> Option<&Cause<E>> {
        match self {
            ProtocolViolation::DidNotStop { cause, .. }
            | ProtocolViolation::IgnoredCancellation { cause, .. } => cause.as_ref(),
            ProtocolViolation::IgnoredClose { .. } => None,
        }
    }
}

/// 守卫对外暴露的统一错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：调用方只需匹配一个枚举即可区分“我用错了”“生产者坏了”“业务异常照常传播”
///   与“作用域被取消”四种局面；
/// - **契约 (What)**：
///   - `Usage`：生命周期误用，永不重试；
///   - `Protocol`：生产者违反终止契约，原因链挂在 `source()` 上；
///   - `Passthrough`：生产者或调用方自身的异常，守卫不解释也不吞掉；若它是生产者对注入异常的
///     转译，`cause` 记录被注入的原始原因；
///   - `Cancelled`：取消在生产者被终止后继续向外传播；
/// - **执行逻辑 (How)**：`From<E>` 让调用方在作用域体内直接用 `?` 抛出业务异常，
///   该异常随后按“调用方异常”路径交给 [`GuardedProducer::exit`](crate::GuardedProducer::exit)。
#[derive(Debug, Error)]
pub enum GuardError<E> {
    #[error(transparent)]
    Usage(UsageError),
    #[error(transparent)]
    Protocol(ProtocolViolation<E>),
    #[error("{error}")]
    Passthrough {
        error: E,
        #[source]
        cause: Option<Cause<E>>,
    },
    #[error("producer scope was cancelled")]
    Cancelled,
}

impl<E> GuardError<E> {
    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            GuardError::Usage(usage) => usage.code(),
            GuardError::Protocol(violation) => violation.code(),
            GuardError::Passthrough { .. } => codes::PASSTHROUGH,
            GuardError::Cancelled => codes::CANCELLED,
        }
    }

    /// 包装一个未经守卫转译的异常。
    pub fn passthrough(error: E) -> Self {
        GuardError::Passthrough { error, cause: None }
    }

    /// 是否为生命周期误用。
    pub fn is_usage(&self) -> bool {
        matches!(self, GuardError::Usage(_))
    }

    /// 是否为生产者违反终止契约。
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, GuardError::Protocol(_))
    }

    /// 是否为取消。
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GuardError::Cancelled)
    }

    /// 若为透传异常，返回其引用。
    pub fn as_passthrough(&self) -> Option<&E> {
        match self {
            GuardError::Passthrough { error, .. } => Some(error),
            _ => None,
        }
    }

    /// 若为透传异常，取出所有权。
    pub fn into_passthrough(self) -> Option<E> {
        match self {
            GuardError::Passthrough { error, .. } => Some(error),
            _ => None,
        }
    }

    /// 守卫记录的触发原因（协议违规或转译异常）。
    pub fn recorded_cause(&self) -> Option<&Cause<E>> {
        match self {
            GuardError::Protocol(violation) => violation.cause(),
            GuardError::Passthrough { cause, .. } => cause.as_ref(),
            _ => None,
        }
    }
}

impl<E> From<E> for GuardError<E> {
    fn from(error: E) -> Self {
        GuardError::passthrough(error)
    }
}
