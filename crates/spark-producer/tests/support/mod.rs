//! 守卫测试支撑模块：集中维护脚本化生产者与释放探针。
//!
//! # 模块定位（Why）
//! - 各测试文件需要同一组“行为各异”的生产者：正常逐个产出、吞掉注入信号、把注入信号转译为新异常、
//!   以及收到终止请求后仍继续产出的“卡住”生产者；集中定义避免语义漂移；
//! - [`Probe`] 记录释放次数、关闭请求次数与收到的信号，断言“恰好释放一次”。
//!
//! # 契约说明（What）
//! - 每个生产者持有一个 [`ProbeToken`]，生产者被丢弃即视为释放；
//! - 信号以字符串形式记录（`"cancelled"`、`"error:<消息>"`、`"close"`），便于断言顺序。

#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use spark_producer::{RawProducer, Signal, Step, Thrown, async_trait};

/// 测试统一使用的异常类型。
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum TestError {
    #[error("division by zero")]
    ZeroDivision,
    #[error("runtime error: {0}")]
    Runtime(&'static str),
}

#[derive(Debug, Default)]
struct ProbeLog {
    releases: AtomicUsize,
    close_requests: AtomicUsize,
    signals: Mutex<Vec<String>>,
}

/// 观测生产者生命周期的探针。
#[derive(Clone, Debug, Default)]
pub struct Probe {
    log: Arc<ProbeLog>,
}

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生产者被释放（丢弃）的次数。
    pub fn releases(&self) -> usize {
        self.log.releases.load(Ordering::SeqCst)
    }

    /// `request_close` 被调用的次数。
    pub fn close_requests(&self) -> usize {
        self.log.close_requests.load(Ordering::SeqCst)
    }

    /// 按顺序收到的信号。
    pub fn signals(&self) -> Vec<String> {
        self.log.signals.lock().unwrap().clone()
    }

    pub fn token(&self) -> ProbeToken {
        ProbeToken { log: Arc::clone(&self.log) }
    }
}

/// 嵌入生产者内部，随生产者一起被丢弃。
#[derive(Debug)]
pub struct ProbeToken {
    log: Arc<ProbeLog>,
}

impl ProbeToken {
    fn record_signal(&self, signal: &Signal<'_, TestError>) {
        let entry = match signal {
            Signal::Cancelled => "cancelled".to_owned(),
            Signal::Error(error) => format!("error:{error}"),
        };
        self.log.signals.lock().unwrap().push(entry);
    }

    fn record_close(&self) {
        self.log.close_requests.fetch_add(1, Ordering::SeqCst);
        self.log.signals.lock().unwrap().push("close".to_owned());
    }
}

impl Drop for ProbeToken {
    fn drop(&mut self) {
        self.log.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// 依次产出 `0..count`，可选每拍休眠；不处理任何注入信号。
pub struct Ticker {
    next: u32,
    count: u32,
    tick: Option<Duration>,
    token: ProbeToken,
}

impl Ticker {
    pub fn new(count: u32, probe: &Probe) -> Self {
        Self {
            next: 0,
            count,
            tick: None,
            token: probe.token(),
        }
    }

    /// 每次产出前休眠 `tick`（依赖 Tokio 计时器）。
    pub fn with_tick(count: u32, tick: Duration, probe: &Probe) -> Self {
        Self {
            tick: Some(tick),
            ..Self::new(count, probe)
        }
    }
}

#[async_trait]
impl RawProducer for Ticker {
    type Item = u32;
    type Error = TestError;

    async fn advance(&mut self) -> Result<Step<u32>, TestError> {
        if self.next >= self.count {
            return Ok(Step::Finished);
        }
        if let Some(tick) = self.tick {
            tokio::time::sleep(tick).await;
        }
        let value = self.next;
        self.next += 1;
        Ok(Step::Yielded(value))
    }

    async fn inject(
        &mut self,
        signal: Signal<'_, TestError>,
    ) -> Result<Step<u32>, Thrown<TestError>> {
        self.token.record_signal(&signal);
        Err(Thrown::Injected)
    }

    async fn request_close(&mut self) -> Result<Step<u32>, TestError> {
        self.token.record_close();
        Ok(Step::Finished)
    }
}

/// 永远产出 `1`；收到任何注入信号或关闭请求都静默结束。
pub struct Silence {
    token: ProbeToken,
}

impl Silence {
    pub fn new(probe: &Probe) -> Self {
        Self { token: probe.token() }
    }
}

#[async_trait]
impl RawProducer for Silence {
    type Item = u32;
    type Error = TestError;

    async fn advance(&mut self) -> Result<Step<u32>, TestError> {
        Ok(Step::Yielded(1))
    }

    async fn inject(
        &mut self,
        signal: Signal<'_, TestError>,
    ) -> Result<Step<u32>, Thrown<TestError>> {
        self.token.record_signal(&signal);
        Ok(Step::Finished)
    }

    async fn request_close(&mut self) -> Result<Step<u32>, TestError> {
        self.token.record_close();
        Ok(Step::Finished)
    }
}

/// 永远产出 `1`；收到任何注入信号或关闭请求都抛出 `Runtime("translated")`。
pub struct Reraise {
    token: ProbeToken,
}

impl Reraise {
    pub fn new(probe: &Probe) -> Self {
        Self { token: probe.token() }
    }
}

#[async_trait]
impl RawProducer for Reraise {
    type Item = u32;
    type Error = TestError;

    async fn advance(&mut self) -> Result<Step<u32>, TestError> {
        Ok(Step::Yielded(1))
    }

    async fn inject(
        &mut self,
        signal: Signal<'_, TestError>,
    ) -> Result<Step<u32>, Thrown<TestError>> {
        self.token.record_signal(&signal);
        Err(Thrown::New(TestError::Runtime("translated")))
    }

    async fn request_close(&mut self) -> Result<Step<u32>, TestError> {
        self.token.record_close();
        Err(TestError::Runtime("translated"))
    }
}

/// 先产出 `1`；收到注入信号或关闭请求后再产出 `2`，违反终止契约。
pub struct Stuck {
    token: ProbeToken,
}

impl Stuck {
    pub fn new(probe: &Probe) -> Self {
        Self { token: probe.token() }
    }
}

#[async_trait]
impl RawProducer for Stuck {
    type Item = u32;
    type Error = TestError;

    async fn advance(&mut self) -> Result<Step<u32>, TestError> {
        Ok(Step::Yielded(1))
    }

    async fn inject(
        &mut self,
        signal: Signal<'_, TestError>,
    ) -> Result<Step<u32>, Thrown<TestError>> {
        self.token.record_signal(&signal);
        Ok(Step::Yielded(2))
    }

    async fn request_close(&mut self) -> Result<Step<u32>, TestError> {
        self.token.record_close();
        Ok(Step::Yielded(2))
    }
}

/// 第一次推进就抛出 `ZeroDivision`。
pub struct Faulty {
    token: ProbeToken,
}

impl Faulty {
    pub fn new(probe: &Probe) -> Self {
        Self { token: probe.token() }
    }
}

#[async_trait]
impl RawProducer for Faulty {
    type Item = u32;
    type Error = TestError;

    async fn advance(&mut self) -> Result<Step<u32>, TestError> {
        Err(TestError::ZeroDivision)
    }

    async fn inject(
        &mut self,
        signal: Signal<'_, TestError>,
    ) -> Result<Step<u32>, Thrown<TestError>> {
        self.token.record_signal(&signal);
        Err(Thrown::Injected)
    }

    async fn request_close(&mut self) -> Result<Step<u32>, TestError> {
        self.token.record_close();
        Ok(Step::Finished)
    }
}

/// 推进与注入都永远不会完成，用于模拟单步执行途中被取消；注入的信号在挂起前已被记录。
pub struct Hanging {
    token: ProbeToken,
}

impl Hanging {
    pub fn new(probe: &Probe) -> Self {
        Self { token: probe.token() }
    }
}

#[async_trait]
impl RawProducer for Hanging {
    type Item = u32;
    type Error = TestError;

    async fn advance(&mut self) -> Result<Step<u32>, TestError> {
        futures::future::pending::<()>().await;
        Ok(Step::Finished)
    }

    async fn inject(
        &mut self,
        signal: Signal<'_, TestError>,
    ) -> Result<Step<u32>, Thrown<TestError>> {
        self.token.record_signal(&signal);
        futures::future::pending::<()>().await;
        Err(Thrown::Injected)
    }

    async fn request_close(&mut self) -> Result<Step<u32>, TestError> {
        self.token.record_close();
        Ok(Step::Finished)
    }
}
