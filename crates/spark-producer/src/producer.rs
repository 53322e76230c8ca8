//! # 原始生产者契约（RawProducer）
//!
//! ## 核心意图（Why）
//! - 把“可推进、可注入异常、可请求关闭”的挂起式生产者能力集显式化为 trait，
//!   构造守卫时由类型系统完成能力校验，而不是在首次使用时才发现缺口；
//! - 守卫只依赖本模块的三个能力，不关心生产者内部如何持有连接、定时器或嵌套生产者。
//!
//! ## 契约说明（What）
//! - 三个能力均可挂起（返回 Future），调用方在同一实例上绝不会并发调用；
//! - 任一能力返回 `Err` 或 [`Step::Finished`] 即视为生产者已终止，守卫之后不会再调用它；
//! - 注入的业务异常以借用形式交给生产者（[`Signal::Error`]），原始异常的所有权始终留在守卫，
//!   因此“生产者静默终止后原异常继续传播”无需 `Clone`。

use async_trait::async_trait;

/// 生产者一次恢复执行后的落点。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Step<T> {
    /// 产出一个值并再次挂起。
    Yielded(T),
    /// 正常结束，不会再产出值。
    Finished,
}

impl<T> Step<T> {
    /// 是否为产出值的落点。
    pub fn is_yielded(&self) -> bool {
        matches!(self, Step::Yielded(_))
    }

    /// 转换为 `Option`，`Finished` 映射为 `None`。
    pub fn into_option(self) -> Option<T> {
        match self {
            Step::Yielded(value) => Some(value),
            Step::Finished => None,
        }
    }
}

/// 注入到生产者当前挂起点的信号。
///
/// # 教案式说明
/// - **意图 (Why)**：取消与业务异常在拆除阶段需要区别对待：生产者可能据此决定是否多做一次清理，
///   因此守卫必须原样转达“是哪一类终止原因”；
/// - **契约 (What)**：`Cancelled` 代表外层作用域被拆除；`Error` 借出调用方抛出的业务异常；
/// - **风险 (Trade-offs)**：借用意味着生产者若想把原异常包装进新异常，需要自行构造（例如保留消息），
///   守卫会在 [`GuardError::Passthrough`](crate::GuardError::Passthrough) 上另行记录原因链。
#[derive(Debug)]
pub enum Signal<'a, E> {
    /// 取消类终止信号。
    Cancelled,
    /// 业务异常。
    Error(&'a E),
}

impl<E> Clone for Signal<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Signal<'_, E> {}

impl<E> Signal<'_, E> {
    /// 是否为取消信号。
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Signal::Cancelled)
    }
}

/// 注入信号后，异常从生产者中逸出的方式。
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Thrown<E> {
    /// 生产者未处理注入的信号，原样向外传播。
    Injected,
    /// 生产者以另一个异常作为回应。
    New(E),
}

/// 挂起式生产者的能力集：推进、注入异常并恢复、请求关闭。
///
/// # 教案式说明
/// - **意图 (Why)**：以显式 trait 取代运行期的属性探测；`GuardedProducer` 自身不实现该 trait，
///   因而“重复包装”在编译期即被拒绝；
/// - **契约 (What)**：
///   - `advance`：恢复执行直到下一个值或结束；
///   - `inject`：在当前挂起点抛出 `signal` 并恢复，观察生产者是继续产出、结束还是抛出异常；
///   - `request_close`：请求生产者展开并释放资源，契约上不得再产出值；
///   - **前置条件**：守卫保证同一实例上的调用串行，且不会在终止后再次调用；
///   - **后置条件**：返回 `Err` 或 `Finished` 后，生产者应已释放其持有的全部资源。
/// - **风险 (Trade-offs)**：通过 `async-trait` 装箱 Future，换取对象安全与 `Send` 约束的统一表达；
///   每次推进多一次堆分配，相比生产者内部 I/O 可以忽略。
#[async_trait]
pub trait RawProducer: Send {
    /// 产出值类型。
    type Item: Send;
    /// 生产者自身的异常类型。
    type Error: std::error::Error + Send + Sync + 'static;

    /// 推进到下一个值或结束。
    async fn advance(&mut self) -> Result<Step<Self::Item>, Self::Error>;

    /// 在当前挂起点注入信号并恢复执行。
    async fn inject(
        &mut self,
        signal: Signal<'_, Self::Error>,
    ) -> Result<Step<Self::Item>, Thrown<Self::Error>>;

    /// 请求生产者终止并释放资源。
    async fn request_close(&mut self) -> Result<Step<Self::Item>, Self::Error>;
}
