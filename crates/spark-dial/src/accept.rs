//! # accept 模块说明
//!
//! ## 角色定位（Why）
//! - 入站套接字与挂起的 `accept` 调用以不可预测的顺序到达，需要一个与传输无关的匹配点；
//! - 把“谁先被匹配”“被取消的 accept 如何归还已匹配的套接字”集中在一处，
//!   监听器只负责投递。
//!
//! ## 契约（What）
//! - 同一时刻，“等待中的套接字”与“挂起的 accept”至多有一方非空；
//! - 两侧均按 [`AcceptOrder`] 出队，默认后进先出；
//! - 关闭后新的投递被拒绝，挂起的 accept 以 [`NetError::Closed`] 失败，剩余套接字交还调用方释放。

use crate::{
    context::CallContext,
    error::{NetError, Operation},
};
use serde::Deserialize;
use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{Mutex, MutexGuard},
    task::{Context, Poll},
};
use tokio::sync::oneshot;
use tracing::trace;

/// 挂起方与等待方的出队顺序。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcceptOrder {
    /// 后进先出：最近到达的套接字先被接受，最近挂起的 accept 先被满足。
    #[default]
    Lifo,
    /// 先进先出。
    Fifo,
}

impl AcceptOrder {
    fn pop<T>(self, queue: &mut VecDeque<T>) -> Option<T> {
        match self {
            AcceptOrder::Lifo => queue.pop_back(),
            AcceptOrder::Fifo => queue.pop_front(),
        }
    }
}

struct QueueState<S> {
    closed: bool,
    waiting: VecDeque<S>,
    pending: VecDeque<(u64, oneshot::Sender<S>)>,
    next_id: u64,
}

/// 入站套接字与 `accept` 调用的匹配队列。
///
/// # 教案级注释
///
/// ## 逻辑（How）
/// - `offer`：若有挂起的 accept，按顺序取一个并通过 `oneshot` 交付；接收方已离开时换下一个；
///   否则进入等待队列；
/// - `accept`：依次判定“已关闭”“上下文已失效”，再从等待队列取值，取不到则登记挂起；
/// - 挂起的 accept 被上下文打断或被丢弃时，先从登记表摘除自身，再回收可能已交付的套接字重新投递。
///
/// ## 注意事项（Trade-offs）
/// - 内部使用 `std::sync::Mutex`，临界区内不跨越 `.await`；锁中毒时沿用内部状态继续工作。
pub struct AcceptQueue<S> {
    order: AcceptOrder,
    state: Mutex<QueueState<S>>,
}

impl<S: Send> AcceptQueue<S> {
    pub fn new(order: AcceptOrder) -> Self {
        Self {
            order,
            state: Mutex::new(QueueState {
                closed: false,
                waiting: VecDeque::new(),
                pending: VecDeque::new(),
                next_id: 0,
            }),
        }
    }

    pub fn order(&self) -> AcceptOrder {
        self.order
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<S>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 投递入站套接字；队列已关闭时原样退回。
    pub fn offer(&self, socket: S) -> Result<(), S> {
        let mut state = self.lock();
        if state.closed {
            return Err(socket);
        }
        let mut socket = socket;
        while let Some((id, sender)) = self.order.pop(&mut state.pending) {
            match sender.send(socket) {
                Ok(()) => {
                    trace!(accept = id, "inbound socket handed to pending accept");
                    return Ok(());
                }
                Err(returned) => socket = returned,
            }
        }
        state.waiting.push_back(socket);
        Ok(())
    }

    /// 等待下一个入站套接字。
    pub async fn accept(&self, ctx: &CallContext) -> Result<S, NetError> {
        let waiter = {
            let mut state = self.lock();
            if state.closed {
                return Err(NetError::closed(Operation::ACCEPT, "listener"));
            }
            ctx.check(Operation::ACCEPT)?;
            if let Some(socket) = self.order.pop(&mut state.waiting) {
                return Ok(socket);
            }
            let id = state.next_id;
            state.next_id += 1;
            let (sender, receiver) = oneshot::channel();
            state.pending.push_back((id, sender));
            PendingAccept {
                queue: self,
                id,
                receiver,
                done: false,
            }
        };

        ctx.race_with_cleanup(
            Operation::ACCEPT,
            async move {
                waiter
                    .await
                    .map_err(|_| NetError::closed(Operation::ACCEPT, "listener"))
            },
            |socket| self.requeue(socket),
        )
        .await
    }

    /// 重新投递被取消方退回的套接字；队列已关闭时直接丢弃。
    fn requeue(&self, socket: S) {
        if self.offer(socket).is_err() {
            trace!("listener closed, dropping requeued socket");
        }
    }

    fn forget(&self, id: u64) {
        self.lock().pending.retain(|(pending, _)| *pending != id);
    }

    /// 关闭队列并取出所有未被接受的套接字；重复调用返回空列表。
    pub fn close(&self) -> Vec<S> {
        let mut state = self.lock();
        state.closed = true;
        state.pending.clear();
        state.waiting.drain(..).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// 等待被接受的套接字数量。
    pub fn waiting_len(&self) -> usize {
        self.lock().waiting.len()
    }

    /// 挂起中的 accept 数量。
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }
}

impl<S> std::fmt::Debug for AcceptQueue<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f.debug_struct("AcceptQueue")
            .field("order", &self.order)
            .field("closed", &state.closed)
            .field("waiting", &state.waiting.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

/// 挂起中的 accept；未完成即被丢弃时把自身从登记表摘除，并归还已交付的套接字。
struct PendingAccept<'a, S: Send> {
    queue: &'a AcceptQueue<S>,
    id: u64,
    receiver: oneshot::Receiver<S>,
    done: bool,
}

impl<S: Send> Future for PendingAccept<'_, S> {
    type Output = Result<S, oneshot::error::RecvError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let polled = Pin::new(&mut self.receiver).poll(cx);
        if polled.is_ready() {
            self.done = true;
        }
        polled
    }
}

impl<S: Send> Drop for PendingAccept<'_, S> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        self.queue.forget(self.id);
        if let Ok(socket) = self.receiver.try_recv() {
            self.queue.requeue(socket);
        }
    }
}
