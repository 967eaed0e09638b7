//! # context 模块说明
//!
//! ## 角色定位（Why）
//! - 每个可挂起的网络操作都要能被外部放弃：调用方取消，或截止时间到达；
//! - 把“先检查、再竞速、失败者清理”的模式收敛到 [`CallContext::race_with_cleanup`]，
//!   拨号与监听无需各自实现一遍。
//!
//! ## 契约（What）
//! - [`Cancellation`]：可克隆、共享同一原子位的取消令牌，`cancel` 仅首次返回 `true`；
//! - [`Deadline`]：基于 Tokio 单调时钟的绝对截止点，可以为空；
//! - [`CallContext::error`]：同步查询“是否已经失效”，取消优先于超时；
//! - [`CallContext::race_with_cleanup`]：操作先完成但上下文已失效时，仍判定为取消并把结果交给清理回调。

use crate::error::{CancelReason, NetError, Operation};
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{sync::Notify, time::Instant};

/// 取消原语，统一表达跨模块的可中断性契约。
///
/// # 逻辑解析（How）
/// - 内部使用 [`AtomicBool`] 表达取消状态，并通过 [`Arc`] 支持多方共享；
/// - 取消时通过 [`Notify::notify_waiters`] 唤醒所有等待者，等待方先登记再检查标志位，避免丢失唤醒；
/// - `child` 生成共享同一原子位的派生实例，便于在不同子系统传播取消信号。
///
/// # 契约说明（What）
/// - **前置条件**：构造时无需额外参数，默认处于“未取消”状态。
/// - **后置条件**：一旦调用 `cancel` 成功，`is_cancelled` 全局可见，所有 [`Cancellation::cancelled`] 等待者被唤醒。
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    inner: Arc<CancellationState>,
}

#[derive(Debug, Default)]
struct CancellationState {
    flag: AtomicBool,
    notify: Notify,
}

impl Cancellation {
    /// 创建处于“未取消”状态的取消令牌。
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询当前是否已被标记取消。
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// 将当前令牌标记为取消。
    ///
    /// 返回值为 `true` 表示本次调用首次触发取消；返回 `false` 表示之前已被取消。
    pub fn cancel(&self) -> bool {
        let first = self
            .inner
            .flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// 派生共享同一原子位的子令牌，用于跨模块传播取消语义。
    pub fn child(&self) -> Self {
        self.clone()
    }

    /// 等待直到令牌被取消；已取消时立即返回。
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// 截止原语，描述操作的最迟完成时间。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Deadline {
    instant: Option<Instant>,
}

impl Deadline {
    /// 创建未设置截止时间的实例。
    pub const fn none() -> Self {
        Self { instant: None }
    }

    /// 根据绝对时间点构造截止时间。
    pub fn at(instant: Instant) -> Self {
        Self {
            instant: Some(instant),
        }
    }

    /// 以当前时间加持续时间生成截止时间。
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    pub fn instant(&self) -> Option<Instant> {
        self.instant
    }

    /// 判断是否已经超时。
    pub fn is_expired(&self) -> bool {
        self.instant
            .is_some_and(|deadline| deadline <= Instant::now())
    }
}

#[derive(Debug, Default)]
struct CallContextInner {
    cancellation: Cancellation,
    deadline: Deadline,
}

/// 调用上下文，在网络 API 之间传递取消与截止语义。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 解析、建连、接受、读写都会挂起，调用方需要一个统一的信号来放弃它们；
/// - 通过 [`Arc`] 共享，克隆成本为常数，可随任务跨线程传递。
///
/// ## 契约（What）
/// - [`CallContext::error`] 返回 `Some` 即表示上下文已失效，之后任何挂起点都应立即失败；
/// - 取消与超时同时成立时报告 [`CancelReason::Cancelled`]；
/// - [`CallContext::background`] 永不失效。
///
/// ## 注意事项（Trade-offs）
/// - 截止时间不会自动触发取消令牌，两者在检查时分别判定。
#[derive(Clone, Debug, Default)]
pub struct CallContext {
    inner: Arc<CallContextInner>,
}

impl CallContext {
    /// 创建上下文构建器。
    pub fn builder() -> CallContextBuilder {
        CallContextBuilder::default()
    }

    /// 永不取消、没有截止时间的上下文。
    pub fn background() -> Self {
        Self::default()
    }

    /// 获取取消原语。
    pub fn cancellation(&self) -> &Cancellation {
        &self.inner.cancellation
    }

    /// 查询截止时间。
    pub fn deadline(&self) -> Deadline {
        self.inner.deadline
    }

    /// 同步查询上下文是否已失效。
    pub fn error(&self) -> Option<CancelReason> {
        if self.inner.cancellation.is_cancelled() {
            Some(CancelReason::Cancelled)
        } else if self.inner.deadline.is_expired() {
            Some(CancelReason::DeadlineExceeded)
        } else {
            None
        }
    }

    /// 上下文已失效时返回对应操作的取消错误。
    pub fn check(&self, op: Operation) -> Result<(), NetError> {
        match self.error() {
            Some(reason) => Err(NetError::cancelled(op, reason)),
            None => Ok(()),
        }
    }

    /// 等待上下文失效，返回失效原因。
    pub async fn done(&self) -> CancelReason {
        let cancelled = self.inner.cancellation.cancelled();
        match self.inner.deadline.instant() {
            Some(deadline) => tokio::select! {
                biased;
                _ = cancelled => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                cancelled.await;
                CancelReason::Cancelled
            }
        }
    }

    /// 让 `future` 与上下文失效竞速，失败者被直接丢弃。
    pub async fn race<F, T>(&self, op: Operation, future: F) -> Result<T, NetError>
    where
        F: Future<Output = Result<T, NetError>>,
    {
        self.race_with_cleanup(op, future, drop).await
    }

    /// 让 `future` 与上下文失效竞速，并释放失败者持有的资源。
    ///
    /// # 教案级注释
    ///
    /// ## 契约（What）
    /// - 进入前上下文已失效：立即返回 [`NetError::Cancelled`]，`future` 不会被轮询；
    /// - 上下文先失效：`future` 被丢弃，其内部资源随之释放；
    /// - `future` 成功但此刻上下文已失效：成功值交给 `cleanup`，仍返回取消错误；
    /// - `future` 自身失败：原样返回其错误。
    ///
    /// ## 逻辑（How）
    /// - `tokio::select!` 采用 `biased`，同一轮就绪时先判定上下文，保证取消优先。
    pub async fn race_with_cleanup<F, T, C>(
        &self,
        op: Operation,
        future: F,
        cleanup: C,
    ) -> Result<T, NetError>
    where
        F: Future<Output = Result<T, NetError>>,
        C: FnOnce(T),
    {
        self.check(op)?;
        tokio::select! {
            biased;
            reason = self.done() => Err(NetError::cancelled(op, reason)),
            result = future => {
                let value = result?;
                match self.error() {
                    Some(reason) => {
                        cleanup(value);
                        Err(NetError::cancelled(op, reason))
                    }
                    None => Ok(value),
                }
            }
        }
    }
}

/// `CallContext` 构建器。
#[derive(Debug, Default)]
pub struct CallContextBuilder {
    cancellation: Cancellation,
    deadline: Deadline,
}

impl CallContextBuilder {
    /// 设置取消原语。
    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// 设置截止时间。
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// 以相对时长设置截止时间。
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Deadline::after(timeout))
    }

    pub fn build(self) -> CallContext {
        CallContext {
            inner: Arc::new(CallContextInner {
                cancellation: self.cancellation,
                deadline: self.deadline,
            }),
        }
    }
}
