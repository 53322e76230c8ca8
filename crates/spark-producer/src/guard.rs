//! # 生产者守卫（GuardedProducer）
//!
//! ## 核心意图（Why）
//! - 挂起式生产者跨挂起点持有连接、定时器或嵌套生产者，半途放弃或吞掉注入的异常都会泄露资源；
//! - 守卫保证：每个进入过的生产者恰好被终止一次，终止幂等，拒绝终止的生产者被检测并响亮报告。
//!
//! ## 教案式使用指南（How）
//! 1. 调用 [`GuardedProducer::new`] 包装原始生产者；
//! 2. [`enter`](GuardedProducer::enter) 进入作用域，反复 [`advance`](GuardedProducer::advance)
//!    直到返回 `Ok(None)`；
//! 3. 无论以何种方式离开作用域，都以对应的 [`Outcome`] 调用 [`exit`](GuardedProducer::exit)，
//!    或直接使用 [`scoped`](crate::scoped) 让辅助函数代劳。
//!
//! ## 释放保障（What）
//! - 异步拆除：`exit`/`close`/`cancel` 先把生产者驱动到终止，再传播结果；
//! - 同步兜底：推进中途 Future 被丢弃、或守卫在未结束时被 `Drop`，生产者随即被同步释放
//!   （依赖其自身的 `Drop`），并记录一条警告。

use core::fmt;

use futures::Stream;
use tracing::{debug, error, warn};

use crate::error::{Cause, GuardError, ProtocolViolation, UsageError, codes};
use crate::options::{GuardOptions, LegacyIteration};
use crate::producer::{RawProducer, Signal, Step, Thrown};
use crate::state::ProducerState;

/// 离开作用域的方式。
///
/// # 教案式说明
/// - **意图 (Why)**：以类型化结果取代“靠异常类型判断拆除路径”，三种路径对应三种拆除动作；
/// - **契约 (What)**：`Normal` 走请求关闭；`Cancelled` 注入取消信号；`Errored` 把调用方异常
///   注入生产者，给它观察同一异常并清理的机会。
#[derive(Debug)]
pub enum Outcome<E> {
    /// 正常离开（包括提前结束迭代）。
    Normal,
    /// 外层作用域被取消。
    Cancelled,
    /// 调用方在消费过程中抛出业务异常。
    Errored(E),
}

impl<E> Outcome<E> {
    /// 守卫无需介入时，结果按原样传播。
    fn into_result(self) -> Result<(), GuardError<E>> {
        match self {
            Outcome::Normal => Ok(()),
            Outcome::Cancelled => Err(GuardError::Cancelled),
            Outcome::Errored(error) => Err(GuardError::passthrough(error)),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Outcome::Normal => "normal",
            Outcome::Cancelled => "cancelled",
            Outcome::Errored(_) => "errored",
        }
    }
}

/// 独占持有一个原始生产者的作用域守卫。
///
/// # 教案式说明
/// - **意图 (Why)**：集中实现 `Created → Entered ⇄ Running → Finished` 状态机，
///   让上层组合算子只需“取句柄、推进、关闭”三件事；
/// - **契约 (What)**：
///   - 生产者在整个生命周期内只归属本守卫，进入 `Finished` 前已被释放；
///   - 所有可挂起操作都取 `&mut self`，同一实例的并发调用在编译期即被拒绝；
///   - `GuardedProducer` 不实现 [`RawProducer`]，因此不能被再次包装：
///
/// ```compile_fail
/// use spark_producer::{GuardedProducer, from_iter};
///
/// let inner = GuardedProducer::new(from_iter::<_, std::io::Error>(vec![1, 2, 3]));
/// let _twice = GuardedProducer::new(inner);
/// ```
///
///   同理，不具备能力集的对象无法构造守卫：
///
/// ```compile_fail
/// use spark_producer::GuardedProducer;
///
/// let _guard = GuardedProducer::new(vec![1, 2, 3]);
/// ```
///
/// - **风险 (Trade-offs)**：Rust 没有异步析构，`Drop` 兜底只能同步丢弃生产者，
///   拿不到生产者在拆除阶段的错误报告；需要完整报告时务必显式 `exit`。
pub struct GuardedProducer<P: RawProducer> {
    producer: Option<P>,
    state: ProducerState,
    options: GuardOptions,
    entered_implicitly: bool,
}

impl<P: RawProducer> GuardedProducer<P> {
    /// 以默认配置包装原始生产者。
    pub fn new(producer: P) -> Self {
        Self::with_options(producer, GuardOptions::default())
    }

    /// 以指定配置包装原始生产者，初始状态为 [`ProducerState::Created`]。
    pub fn with_options(producer: P, options: GuardOptions) -> Self {
        Self {
            producer: Some(producer),
            state: ProducerState::Created,
            options,
            entered_implicitly: false,
        }
    }

    /// 当前状态。
    pub fn state(&self) -> ProducerState {
        self.state
    }

    /// 是否已终止。
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// 诊断名称。
    pub fn label(&self) -> &str {
        &self.options.label
    }

    /// 构造时拷贝的配置。
    pub fn options(&self) -> &GuardOptions {
        &self.options
    }

    /// 是否经由兼容路径隐式进入作用域。
    pub fn entered_implicitly(&self) -> bool {
        self.entered_implicitly
    }

    /// 进入作用域。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：仅 `Created` 可进入；已进入（含隐式进入）返回
    ///   [`UsageError::AlreadyEntered`]，已结束返回 [`UsageError::Closed`]；
    /// - **后置条件**：返回自身的可变引用，供后续推进使用。
    pub fn enter(&mut self) -> Result<&mut Self, GuardError<P::Error>> {
        match self.state {
            ProducerState::Created => {
                self.transition(ProducerState::Entered);
                Ok(self)
            }
            ProducerState::Entered | ProducerState::Running => {
                Err(self.usage(UsageError::AlreadyEntered {
                    label: self.options.label.clone(),
                }))
            }
            ProducerState::Finished => Err(self.closed()),
        }
    }

    /// 推进生产者一步。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - 产出值 → `Ok(Some(value))`，状态回到 `Entered`；
    ///   - 生产者结束 → 释放生产者，进入 `Finished`，返回 `Ok(None)`（正常的序列结束信号）；
    ///   - 生产者抛出异常 → 释放生产者，进入 `Finished`，异常以 `Passthrough` 透传；
    ///   - 已结束 → [`UsageError::Closed`]；未进入 → 视 [`LegacyIteration`] 警告并隐式进入或拒绝。
    /// - **取消 (Trade-offs)**：若返回的 Future 在生产者工作期间被丢弃，生产者会在丢弃时被同步释放，
    ///   守卫随即进入 `Finished`。
    pub async fn advance(&mut self) -> Result<Option<P::Item>, GuardError<P::Error>> {
        self.begin_step("advance")?;
        let mut flight = InFlight::launch(self);
        let result = match flight.guard.producer.as_mut() {
            Some(producer) => producer.advance().await,
            None => return Err(flight.guard.closed()),
        };
        flight.land();

        let guard = &mut *flight.guard;
        match result {
            Ok(Step::Yielded(item)) => {
                guard.transition(ProducerState::Entered);
                Ok(Some(item))
            }
            Ok(Step::Finished) => {
                guard.release("exhausted");
                Ok(None)
            }
            Err(error) => {
                guard.release("raised");
                Err(GuardError::passthrough(error))
            }
        }
    }

    /// 在生产者当前挂起点注入业务异常并恢复执行。
    ///
    /// # 教案式注释
    /// - **意图 (Why)**：让持有作用域的一方模拟“外部异常落在挂起点”，观察生产者的反应；
    /// - **契约 (What)**：
    ///   - 生产者捕获后继续产出 → `Ok(Some(value))`，保持 `Entered`；
    ///   - 生产者捕获后结束 → 释放，`Ok(None)`；
    ///   - 生产者未处理 → 释放，原异常以 `Passthrough` 返回；
    ///   - 生产者抛出新异常 → 释放，新异常透传并以原异常为 `cause`。
    pub async fn inject(
        &mut self,
        error: P::Error,
    ) -> Result<Option<P::Item>, GuardError<P::Error>> {
        self.begin_step("inject")?;
        let mut flight = InFlight::launch(self);
        let reaction = match flight.guard.producer.as_mut() {
            Some(producer) => producer.inject(Signal::Error(&error)).await,
            None => return Err(flight.guard.closed()),
        };
        flight.land();

        let guard = &mut *flight.guard;
        match reaction {
            Ok(Step::Yielded(item)) => {
                guard.transition(ProducerState::Entered);
                Ok(Some(item))
            }
            Ok(Step::Finished) => {
                guard.release("finished after injection");
                Ok(None)
            }
            Err(Thrown::Injected) => {
                guard.release("raised injected error");
                Err(GuardError::passthrough(error))
            }
            Err(Thrown::New(translated)) => {
                guard.release("raised translated error");
                Err(GuardError::Passthrough {
                    error: translated,
                    cause: Some(Cause::Error(error)),
                })
            }
        }
    }

    /// 离开作用域，并按 `outcome` 把生产者驱动到终止。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：
    ///   - 已结束：守卫不做任何事，`outcome` 原样传播（`Normal` → `Ok`）；
    ///   - `Normal`：请求关闭；生产者继续产出视为 [`ProtocolViolation::IgnoredClose`]；
    ///   - `Cancelled`：注入取消信号；生产者抑制或重抛均视为遵守，取消仍向外传播；
    ///     继续产出视为 [`ProtocolViolation::IgnoredCancellation`]；
    ///   - `Errored(e)`：注入 `e`；生产者结束或重抛时 `e` 原样传播；继续产出视为
    ///     [`ProtocolViolation::DidNotStop`]；抛出新异常时新异常以 `e` 为原因传播。
    /// - **执行 (How)**：先把状态置为 `Finished` 并取出生产者，再等待拆除；即便本 Future
    ///   中途被丢弃，取出的生产者也随之释放。
    pub async fn exit(&mut self, outcome: Outcome<P::Error>) -> Result<(), GuardError<P::Error>> {
        match self.state {
            ProducerState::Finished => return outcome.into_result(),
            ProducerState::Running => {
                self.abandon("exit while a step was in flight");
                return outcome.into_result();
            }
            ProducerState::Created | ProducerState::Entered => {}
        }

        let Some(mut producer) = self.producer.take() else {
            self.transition(ProducerState::Finished);
            return outcome.into_result();
        };
        let kind = outcome.kind();
        self.transition(ProducerState::Finished);

        let result = teardown(&mut producer, outcome, &self.options.label).await;
        drop(producer);

        match &result {
            Err(GuardError::Protocol(violation)) => error!(
                producer = %self.options.label,
                code = violation.code(),
                outcome = kind,
                "{violation}"
            ),
            _ => debug!(producer = %self.options.label, outcome = kind, "producer scope exited"),
        }
        result
    }

    /// 正常关闭，等价于 `exit(Outcome::Normal)`。
    pub async fn close(&mut self) -> Result<(), GuardError<P::Error>> {
        self.exit(Outcome::Normal).await
    }

    /// 显式取消：注入取消信号并终止生产者。
    ///
    /// - **契约 (What)**：生产者遵守取消（重抛或抑制）时返回 `Ok(())`；已结束时为空操作；
    ///   继续产出返回协议违规，转译为新异常时透传新异常。
    pub async fn cancel(&mut self) -> Result<(), GuardError<P::Error>> {
        match self.exit(Outcome::Cancelled).await {
            Err(GuardError::Cancelled) => Ok(()),
            other => other,
        }
    }

    /// 转换为只进不退的 [`Stream`]。
    ///
    /// # 教案式注释
    /// - **契约 (What)**：未进入的守卫会先显式进入；生产者耗尽时流结束，出错时产出一次错误后结束；
    /// - **风险 (Trade-offs)**：流在耗尽前被丢弃时只能走 `Drop` 兜底释放，拿不到拆除阶段的报告。
    pub fn into_stream(self) -> impl Stream<Item = Result<P::Item, GuardError<P::Error>>> {
        futures::stream::unfold(Some(self), |slot| async move {
            let Some(mut guard) = slot else {
                return None;
            };
            if guard.state == ProducerState::Created {
                if let Err(err) = guard.enter() {
                    return Some((Err(err), None));
                }
            }
            match guard.advance().await {
                Ok(Some(item)) => Some((Ok(item), Some(guard))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    fn begin_step(&mut self, operation: &'static str) -> Result<(), GuardError<P::Error>> {
        match self.state {
            ProducerState::Entered => Ok(()),
            ProducerState::Created => match self.options.legacy_iteration {
                LegacyIteration::Warn => {
                    warn!(
                        producer = %self.options.label,
                        code = codes::USAGE_NOT_ENTERED,
                        operation,
                        "producer is iterated outside of its scope; entering implicitly"
                    );
                    self.entered_implicitly = true;
                    self.transition(ProducerState::Entered);
                    Ok(())
                }
                LegacyIteration::Reject => Err(self.usage(UsageError::NotEntered {
                    label: self.options.label.clone(),
                })),
            },
            ProducerState::Running => Err(self.usage(UsageError::Busy {
                label: self.options.label.clone(),
            })),
            ProducerState::Finished => Err(self.closed()),
        }
    }

    fn transition(&mut self, target: ProducerState) {
        debug_assert!(
            self.state.can_transition_to(target),
            "非法状态跃迁：{} -> {}",
            self.state,
            target
        );
        self.state = target;
    }

    /// 生产者已自行终止（耗尽或抛出异常），丢弃并进入终态。
    fn release(&mut self, reason: &'static str) {
        drop(self.producer.take());
        self.transition(ProducerState::Finished);
        debug!(producer = %self.options.label, reason, "producer released");
    }

    /// 无法执行异步拆除时的同步兜底释放。
    fn abandon(&mut self, reason: &'static str) {
        let was_live = matches!(
            self.state,
            ProducerState::Entered | ProducerState::Running
        );
        if self.producer.take().is_some() && was_live {
            warn!(
                producer = %self.options.label,
                state = %self.state,
                reason,
                "producer released without asynchronous teardown"
            );
        }
        if !self.state.is_terminal() {
            self.transition(ProducerState::Finished);
        }
    }

    fn usage(&self, err: UsageError) -> GuardError<P::Error> {
        debug!(producer = %self.options.label, code = err.code(), state = %self.state, "{err}");
        GuardError::Usage(err)
    }

    fn closed(&self) -> GuardError<P::Error> {
        self.usage(UsageError::Closed {
            label: self.options.label.clone(),
        })
    }
}

impl<P: RawProducer> Drop for GuardedProducer<P> {
    fn drop(&mut self) {
        if !self.state.is_terminal() {
            self.abandon("guard dropped before exit");
        }
    }
}

impl<P: RawProducer> fmt::Debug for GuardedProducer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedProducer")
            .field("label", &self.options.label)
            .field("state", &self.state)
            .field("entered_implicitly", &self.entered_implicitly)
            .finish_non_exhaustive()
    }
}

/// 单步推进期间的释放保障：Future 在生产者工作时被丢弃，则同步释放生产者。
struct InFlight<'a, P: RawProducer> {
    guard: &'a mut GuardedProducer<P>,
    armed: bool,
}

impl<'a, P: RawProducer> InFlight<'a, P> {
    fn launch(guard: &'a mut GuardedProducer<P>) -> Self {
        guard.transition(ProducerState::Running);
        Self { guard, armed: true }
    }

    fn land(&mut self) {
        self.armed = false;
    }
}

impl<P: RawProducer> Drop for InFlight<'_, P> {
    fn drop(&mut self) {
        if self.armed {
            self.guard.abandon("step interrupted");
        }
    }
}

/// 按离开方式把仍挂起的生产者驱动到终止。
async fn teardown<P: RawProducer>(
    producer: &mut P,
    outcome: Outcome<P::Error>,
    label: &str,
) -> Result<(), GuardError<P::Error>> {
    match outcome {
        Outcome::Normal => {
            let reaction = producer.request_close().await;
            match reaction {
                Ok(Step::Finished) => Ok(()),
                Ok(Step::Yielded(_)) => Err(GuardError::Protocol(ProtocolViolation::IgnoredClose {
                    label: label.to_owned(),
                })),
                Err(error) => Err(GuardError::passthrough(error)),
            }
        }
        Outcome::Cancelled => {
            let reaction = producer.inject(Signal::Cancelled).await;
            match reaction {
                Ok(Step::Finished) | Err(Thrown::Injected) => Err(GuardError::Cancelled),
                Ok(Step::Yielded(_)) => Err(GuardError::Protocol(
                    ProtocolViolation::IgnoredCancellation {
                        label: label.to_owned(),
                        cause: Some(Cause::Cancelled),
                    },
                )),
                Err(Thrown::New(error)) => Err(GuardError::Passthrough {
                    error,
                    cause: Some(Cause::Cancelled),
                }),
            }
        }
        Outcome::Errored(original) => {
            let reaction = producer.inject(Signal::Error(&original)).await;
            match reaction {
                Ok(Step::Finished) | Err(Thrown::Injected) => {
                    Err(GuardError::passthrough(original))
                }
                Ok(Step::Yielded(_)) => {
                    Err(GuardError::Protocol(ProtocolViolation::DidNotStop {
                        label: label.to_owned(),
                        cause: Some(Cause::Error(original)),
                    }))
                }
                Err(Thrown::New(error)) => Err(GuardError::Passthrough {
                    error,
                    cause: Some(Cause::Error(original)),
                }),
            }
        }
    }
}
