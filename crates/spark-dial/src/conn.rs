use crate::{
    context::{CallContext, Cancellation},
    error::{NetError, Operation, map_io_error},
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use socket2::SockRef;
use spark_netaddr::{L4Addr, L4Protocol};
use std::{
    fmt, io,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::Mutex as AsyncMutex,
};
use tracing::trace;

/// 单次读的缓冲上限；`max` 更大时本次只返回已到达且不超过该上限的数据。
const READ_CHUNK: usize = 64 * 1024;

/// 已建立的双工字节流。
///
/// # 教案级注释
///
/// ## 契约（What）
/// - `local_addr`/`remote_addr`：创建时固定，之后不变；
/// - `read(ctx, max)`：返回至多 `max` 字节的已到达数据；同一连接同一时刻只允许一个读，
///   第二个并发读立即以 [`NetError::ReadInProgress`] 失败；读挂起期间连接被关闭、
///   对端关闭或套接字出错都会使该读失败；
/// - `write(ctx, data)`：完成只表示数据已交给传输层，不代表对端已收到；
/// - `close`：尽力而为，不保证对端在返回前观察到关闭；重复调用无副作用；
/// - `abort`：以 `SO_LINGER=0` 强制终止，对端将收到 RST。
#[async_trait]
pub trait Connection: Send + Sync + fmt::Debug {
    /// 获取本地地址。
    fn local_addr(&self) -> &L4Addr;

    /// 获取对端地址。
    fn remote_addr(&self) -> &L4Addr;

    async fn read(&self, ctx: &CallContext, max: usize) -> Result<Bytes, NetError>;

    async fn write(&self, ctx: &CallContext, data: &[u8]) -> Result<(), NetError>;

    async fn close(&self) -> Result<(), NetError>;

    fn abort(&self);
}

/// TCP 套接字级配置项，实现对内核行为的显式控制。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 将“关闭时是否等待未发送数据”与“是否关闭 Nagle 算法”显式配置化，
///   避免调用方直接操作 `socket2` 或平台相关常量。
///
/// ## 核心逻辑（How）
/// - `linger` 为 `Some(dur)` 时，通过 `socket2::SockRef::set_linger` 设置 `SO_LINGER`，
///   使得关闭阶段在 `dur` 后未完成就发送 RST；`None` 表示遵循内核默认策略；
/// - `nodelay` 通过 `TCP_NODELAY` 关闭小包合并。
///
/// ## 设计取舍与注意事项（Trade-offs）
/// - `SO_LINGER` 在不同平台的精度不同（Linux 取整到秒），测试与生产环境需选择合适超时；
/// - 若设置过小，可能导致仍在发送缓冲区的数据被丢弃并触发对端 `ECONNRESET`。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TcpSocketConfig {
    linger: Option<Duration>,
    nodelay: bool,
}

impl TcpSocketConfig {
    /// 创建默认配置，等价于 `linger = None`、`nodelay = false`。
    pub const fn new() -> Self {
        Self {
            linger: None,
            nodelay: false,
        }
    }

    /// 设置 `SO_LINGER` 超时时长。
    pub fn with_linger(mut self, linger: Option<Duration>) -> Self {
        self.linger = linger;
        self
    }

    /// 设置 `TCP_NODELAY`。
    pub fn with_nodelay(mut self, nodelay: bool) -> Self {
        self.nodelay = nodelay;
        self
    }

    pub fn linger(&self) -> Option<Duration> {
        self.linger
    }

    pub fn nodelay(&self) -> bool {
        self.nodelay
    }

    pub(crate) fn apply(&self, stream: &TcpStream) -> io::Result<()> {
        SockRef::from(stream).set_linger(self.linger)?;
        stream.set_nodelay(self.nodelay)
    }
}

/// 以 `SO_LINGER=0` 丢弃尚未交付的套接字，对端收到 RST。
pub(crate) fn discard(stream: TcpStream) {
    let _ = SockRef::from(&stream).set_linger(Some(Duration::ZERO));
    drop(stream);
}

/// 读标志的作用域守卫，读结束（含被取消）时复位。
struct ReadingGuard<'a>(&'a AtomicBool);

impl Drop for ReadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// TCP 连接的最小实现，封装读写与关闭。
///
/// # 教案式注释
///
/// ## 逻辑 (How)
/// - 将 `TcpStream` 拆为读写两半，分别以 `tokio::sync::Mutex` 包裹，读写互不阻塞；
/// - `reading` 原子位保证同一时刻至多一个读；`closed` 令牌在 `close`/`abort` 时触发，
///   打断挂起中的读写；
/// - 读写通过 [`CallContext::race`] 注入取消与截止时间。
///
/// ## 注意事项 (Trade-offs)
/// - `write` 使用 `write_all`，被取消时可能已写出部分数据；
/// - 读缓冲取 `max` 与 [`READ_CHUNK`] 的较小者，过大的 `max` 不会预先分配。
pub struct TcpConn {
    reader: AsyncMutex<Option<OwnedReadHalf>>,
    writer: AsyncMutex<Option<OwnedWriteHalf>>,
    reading: AtomicBool,
    closed: Cancellation,
    local_addr: L4Addr,
    remote_addr: L4Addr,
}

impl TcpConn {
    /// 包装已连通的 `TcpStream`，并写入套接字配置。
    pub fn from_stream(stream: TcpStream, config: &TcpSocketConfig) -> Result<Self, NetError> {
        config
            .apply(&stream)
            .map_err(|err| map_io_error(Operation::CONFIGURE, err))?;
        let local = stream
            .local_addr()
            .map_err(|err| map_io_error(Operation::CONFIGURE, err))?;
        let remote = stream
            .peer_addr()
            .map_err(|err| map_io_error(Operation::CONFIGURE, err))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: AsyncMutex::new(Some(reader)),
            writer: AsyncMutex::new(Some(writer)),
            reading: AtomicBool::new(false),
            closed: Cancellation::new(),
            local_addr: L4Addr::from_socket_addr(L4Protocol::Tcp, local),
            remote_addr: L4Addr::from_socket_addr(L4Protocol::Tcp, remote),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn closed_error(op: Operation) -> NetError {
        NetError::closed(op, "connection")
    }
}

#[async_trait]
impl Connection for TcpConn {
    fn local_addr(&self) -> &L4Addr {
        &self.local_addr
    }

    fn remote_addr(&self) -> &L4Addr {
        &self.remote_addr
    }

    async fn read(&self, ctx: &CallContext, max: usize) -> Result<Bytes, NetError> {
        if self.closed.is_cancelled() {
            return Err(Self::closed_error(Operation::READ));
        }
        if self.reading.swap(true, Ordering::AcqRel) {
            return Err(NetError::ReadInProgress);
        }
        let _reading = ReadingGuard(&self.reading);
        if max == 0 {
            return Ok(Bytes::new());
        }

        let mut guard = self.reader.lock().await;
        let Some(reader) = guard.as_mut() else {
            return Err(Self::closed_error(Operation::READ));
        };
        let mut buf = BytesMut::with_capacity(max.min(READ_CHUNK));
        let outcome = tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(Self::closed_error(Operation::READ)),
            result = ctx.race(Operation::READ, async {
                reader
                    .read_buf(&mut buf)
                    .await
                    .map_err(|err| map_io_error(Operation::READ, err))
            }) => result,
        };
        match outcome {
            Ok(0) => Err(Self::closed_error(Operation::READ)),
            Ok(_) => Ok(buf.freeze()),
            Err(err) => {
                if err.is_closed() {
                    guard.take();
                }
                Err(err)
            }
        }
    }

    async fn write(&self, ctx: &CallContext, data: &[u8]) -> Result<(), NetError> {
        if self.closed.is_cancelled() {
            return Err(Self::closed_error(Operation::WRITE));
        }
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(Self::closed_error(Operation::WRITE));
        };
        let outcome = tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(Self::closed_error(Operation::WRITE)),
            result = ctx.race(Operation::WRITE, async {
                writer
                    .write_all(data)
                    .await
                    .map_err(|err| map_io_error(Operation::WRITE, err))
            }) => result,
        };
        // `abort` 在写持锁期间无法取走写半部，由这里释放。
        if outcome.as_ref().is_err_and(NetError::is_closed) {
            guard.take();
        }
        outcome
    }

    async fn close(&self) -> Result<(), NetError> {
        if !self.closed.cancel() {
            return Ok(());
        }
        trace!(local = %self.local_addr, remote = %self.remote_addr, "tcp connection closing");
        if let Some(mut writer) = self.writer.lock().await.take() {
            // 对端可能已经断开，关闭阶段的写端错误不影响结果。
            let _ = writer.shutdown().await;
        }
        self.reader.lock().await.take();
        Ok(())
    }

    fn abort(&self) {
        self.closed.cancel();
        if let Ok(mut guard) = self.writer.try_lock()
            && let Some(writer) = guard.take()
        {
            let stream: &TcpStream = writer.as_ref();
            let _ = SockRef::from(stream).set_linger(Some(Duration::ZERO));
        }
        if let Ok(mut guard) = self.reader.try_lock()
            && let Some(reader) = guard.take()
        {
            let stream: &TcpStream = reader.as_ref();
            let _ = SockRef::from(stream).set_linger(Some(Duration::ZERO));
        }
    }
}

impl fmt::Debug for TcpConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpConn")
            .field("local_addr", &self.local_addr)
            .field("remote_addr", &self.remote_addr)
            .field("closed", &self.closed.is_cancelled())
            .finish()
    }
}

impl fmt::Display for TcpConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[TcpConn: {} <-> {}]", self.local_addr, self.remote_addr)
    }
}
