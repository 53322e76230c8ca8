#![deny(unsafe_code)]
#![doc = r#"
# spark-producer

## 设计动机（Why）
- **定位**：为挂起式生产者（异步生成器）提供作用域守卫。生产者跨挂起点持有连接、定时器或
  嵌套生产者，半途放弃或吞掉注入的异常/取消都会泄露资源或留下不一致的关闭状态。
- **架构角色**：组合算子（串联、合并、缓冲、节流）只需三件事：从原始生产者取得受守卫的句柄、
  推进取得下一个值或“已耗尽”信号、确定性地关闭。本 crate 只负责这一个生产者的生命周期。

## 核心契约（What）
- **能力集**：[`RawProducer`] 显式声明推进、注入异常并恢复、请求关闭三项能力，构造守卫时由
  类型系统校验；[`GuardedProducer`] 自身不实现它，重复包装在编译期即被拒绝；
- **状态机**：`Created → Entered ⇄ Running → Finished`，[`ProducerState`] 给出完整跃迁表；
- **终止保障**：每个进入过的生产者恰好终止一次；[`GuardedProducer::exit`] 幂等；拒绝终止的生产者
  以 [`ProtocolViolation`] 报告；
- **错误域**：[`GuardError`] 区分生命周期误用、协议违规、透传异常与取消，全部携带稳定错误码。

## 实现策略（How）
- 拆除路径由类型化的 [`Outcome`] 决定：正常离开走请求关闭，取消注入取消信号，业务异常原样注入；
- 推进期间以内部的释放保障对象兜底：Future 在生产者工作时被丢弃，生产者随即被同步释放；
- [`scoped`] 提供 `async with` 式的一次性作用域，[`from_iter`]/[`from_stream`] 让只会推进的来源
  也能接入守卫。

## 风险与考量（Trade-offs）
- Rust 没有异步析构：守卫在未结束时被 `Drop` 只能同步丢弃生产者并记录警告，拿不到拆除阶段的报告；
- 未进入作用域即推进默认降级为一次警告并隐式进入（见 [`LegacyIteration`]），严格模式可在
  [`GuardOptions`] 中开启。

## 示例
```rust
use futures::executor::block_on;
use spark_producer::{GuardedProducer, Outcome, from_iter};

block_on(async {
    let mut guard = GuardedProducer::new(from_iter::<_, std::io::Error>(vec!["a", "b"]));
    guard.enter()?;
    assert_eq!(guard.advance().await?, Some("a"));
    // 提前结束迭代：正常离开仍会关闭生产者。
    guard.exit(Outcome::Normal).await?;
    assert!(guard.is_finished());
    Ok::<_, spark_producer::GuardError<std::io::Error>>(())
})
.expect("列表生产者遵守关闭契约");
```
"#]

mod adapter;
pub mod error;
mod guard;
mod options;
mod producer;
mod scope;
mod state;

pub use adapter::{IterProducer, StreamProducer, from_iter, from_stream};
pub use error::{Cause, GuardError, ProtocolViolation, UsageError, codes};
pub use guard::{GuardedProducer, Outcome};
pub use options::{GuardOptions, LegacyIteration};
pub use producer::{RawProducer, Signal, Step, Thrown};
pub use scope::{scoped, scoped_with};
pub use state::ProducerState;

/// 重新导出 `async_trait`，生产者实现方无需单独引入依赖。
pub use async_trait::async_trait;
