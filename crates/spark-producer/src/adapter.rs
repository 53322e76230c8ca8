//! # 适配器：把“只会推进”的序列接入守卫
//!
//! ## 核心意图（Why）
//! - 许多值来源只实现了推进（迭代器、`futures::Stream`），没有注入异常或请求关闭的能力；
//!   适配器为它们补齐能力集，使其在终止与幂等关闭上与真正的挂起式生产者表现一致。
//!
//! ## 契约说明（What）
//! - 适配器从不捕获注入的信号：`inject` 一律以 [`Thrown::Injected`] 让信号原样传播，并就地丢弃底层来源；
//! - `request_close` 丢弃底层来源并返回 [`Step::Finished`]；
//! - 底层来源耗尽或出错后立即被丢弃，之后的推进都返回 `Finished`。

use core::{fmt, marker::PhantomData, pin::Pin};

use async_trait::async_trait;
use futures::{Stream, StreamExt};

use crate::producer::{RawProducer, Signal, Step, Thrown};

/// 以立即可得的值（列表、迭代器）为来源的生产者。
pub struct IterProducer<I, E> {
    iter: Option<I>,
    _error: PhantomData<fn() -> E>,
}

/// 从任意 `IntoIterator` 构造生产者，`E` 为守卫链路上使用的异常类型。
pub fn from_iter<I, E>(values: I) -> IterProducer<I::IntoIter, E>
where
    I: IntoIterator,
{
    IterProducer {
        iter: Some(values.into_iter()),
        _error: PhantomData,
    }
}

impl<I, E> IterProducer<I, E> {
    /// 底层迭代器是否已被释放。
    pub fn is_released(&self) -> bool {
        self.iter.is_none()
    }
}

impl<I, E> fmt::Debug for IterProducer<I, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterProducer")
            .field("released", &self.is_released())
            .finish()
    }
}

#[async_trait]
impl<I, E> RawProducer for IterProducer<I, E>
where
    I: Iterator + Send,
    I::Item: Send,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = I::Item;
    type Error = E;

    async fn advance(&mut self) -> Result<Step<I::Item>, E> {
        match self.iter.as_mut().and_then(Iterator::next) {
            Some(value) => Ok(Step::Yielded(value)),
            None => {
                self.iter = None;
                Ok(Step::Finished)
            }
        }
    }

    async fn inject(&mut self, _signal: Signal<'_, E>) -> Result<Step<I::Item>, Thrown<E>> {
        self.iter = None;
        Err(Thrown::Injected)
    }

    async fn request_close(&mut self) -> Result<Step<I::Item>, E> {
        self.iter = None;
        Ok(Step::Finished)
    }
}

/// 以 `Stream<Item = Result<T, E>>` 为来源的生产者。
///
/// - **契约 (What)**：流中的 `Err(e)` 视为生产者抛出异常，之后流被丢弃；
/// - **风险 (Trade-offs)**：来源被装箱固定，换取对 `!Unpin` 流的支持。
pub struct StreamProducer<S> {
    stream: Option<Pin<Box<S>>>,
}

/// 从 `futures::Stream` 构造生产者。
pub fn from_stream<S>(stream: S) -> StreamProducer<S> {
    StreamProducer {
        stream: Some(Box::pin(stream)),
    }
}

impl<S> StreamProducer<S> {
    /// 底层流是否已被释放。
    pub fn is_released(&self) -> bool {
        self.stream.is_none()
    }
}

impl<S> fmt::Debug for StreamProducer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamProducer")
            .field("released", &self.is_released())
            .finish()
    }
}

#[async_trait]
impl<S, T, E> RawProducer for StreamProducer<S>
where
    S: Stream<Item = Result<T, E>> + Send,
    T: Send,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    async fn advance(&mut self) -> Result<Step<T>, E> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(Step::Finished);
        };
        match stream.next().await {
            Some(Ok(value)) => Ok(Step::Yielded(value)),
            Some(Err(error)) => {
                self.stream = None;
                Err(error)
            }
            None => {
                self.stream = None;
                Ok(Step::Finished)
            }
        }
    }

    async fn inject(&mut self, _signal: Signal<'_, E>) -> Result<Step<T>, Thrown<E>> {
        self.stream = None;
        Err(Thrown::Injected)
    }

    async fn request_close(&mut self) -> Result<Step<T>, E> {
        self.stream = None;
        Ok(Step::Finished)
    }
}
