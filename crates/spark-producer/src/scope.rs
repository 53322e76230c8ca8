//! # 作用域辅助（scoped）
//!
//! ## 核心意图（Why）
//! - Rust 没有异步析构，`async with` 式的“离开即拆除”需要显式驱动；
//! - `scoped` 把“进入 → 执行作用域体 → 按离开方式拆除”收敛为一次调用，作用域体的任何退出路径
//!   （正常返回、`?` 提前返回、取消）都会映射为对应的 [`Outcome`]。
//!
//! ## 契约说明（What）
//! - 作用域体返回 `Err(GuardError::Passthrough { cause: None, .. })` 且守卫仍未结束时，视为调用方抛出的
//!   业务异常，按 [`Outcome::Errored`] 注入生产者；
//! - 返回 `Err(GuardError::Cancelled)` 视为外层取消，按 [`Outcome::Cancelled`] 拆除；
//! - 其他错误（生命周期误用、协议违规、生产者已自行抛出的异常）原样返回，守卫若尚未结束则先正常关闭，
//!   关闭阶段的错误只记录日志，不覆盖原错误。

use futures::future::BoxFuture;
use tracing::warn;

use crate::error::GuardError;
use crate::guard::{GuardedProducer, Outcome};
use crate::options::GuardOptions;
use crate::producer::RawProducer;

/// 以默认配置在受守卫的作用域内消费生产者。
///
/// # 示例（Examples）
/// ```rust
/// use futures::executor::block_on;
/// use spark_producer::{GuardError, from_iter, scoped};
///
/// let total = block_on(scoped(from_iter::<_, std::io::Error>(1..=4), |guard| {
///     Box::pin(async move {
///         let mut sum = 0;
///         while let Some(value) = guard.advance().await? {
///             sum += value;
///         }
///         Ok::<_, GuardError<std::io::Error>>(sum)
///     })
/// }))
/// .expect("列表生产者不会失败");
/// assert_eq!(total, 10);
/// ```
pub async fn scoped<P, R, F>(producer: P, body: F) -> Result<R, GuardError<P::Error>>
where
    P: RawProducer,
    F: for<'g> FnOnce(&'g mut GuardedProducer<P>) -> BoxFuture<'g, Result<R, GuardError<P::Error>>>,
{
    scoped_with(producer, GuardOptions::default(), body).await
}

/// 以指定配置在受守卫的作用域内消费生产者。
pub async fn scoped_with<P, R, F>(
    producer: P,
    options: GuardOptions,
    body: F,
) -> Result<R, GuardError<P::Error>>
where
    P: RawProducer,
    F: for<'g> FnOnce(&'g mut GuardedProducer<P>) -> BoxFuture<'g, Result<R, GuardError<P::Error>>>,
{
    let mut guarded = GuardedProducer::with_options(producer, options);
    guarded.enter()?;
    let result = body(&mut guarded).await;

    let (value, outcome) = match result {
        Ok(value) => (Some(value), Outcome::Normal),
        Err(GuardError::Cancelled) => (None, Outcome::Cancelled),
        Err(GuardError::Passthrough { error, cause: None }) if !guarded.is_finished() => {
            (None, Outcome::Errored(error))
        }
        Err(err) => {
            if !guarded.is_finished() {
                if let Err(close_err) = guarded.close().await {
                    warn!(
                        producer = %guarded.label(),
                        code = close_err.code(),
                        "closing producer failed while propagating an earlier error: {close_err}"
                    );
                }
            }
            return Err(err);
        }
    };

    guarded.exit(outcome).await?;
    // 以 `Cancelled`/`Errored` 离开时 `exit` 必然返回错误，走到这里只剩正常路径。
    value.ok_or(GuardError::Cancelled)
}
