use crate::{
    accept::{AcceptOrder, AcceptQueue},
    conn::{Connection, TcpConn, TcpSocketConfig, discard},
    context::CallContext,
    error::{NetError, Operation, map_io_error},
    util::to_socket_addr,
};
use async_trait::async_trait;
use spark_netaddr::{AddrError, IntoNetLoc, L4Addr, L4Protocol, Scope};
use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    net::{TcpListener as TokioTcpListener, TcpSocket, TcpStream},
    task::JoinHandle,
};
use tracing::{debug, trace, warn};

/// 接受失败（如文件描述符耗尽）后的重试间隔。
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// 已绑定的监听端点。
///
/// # 教案级注释
///
/// ## 契约（What）
/// - `addr`：绑定时确定，端口为 `0` 时反映内核分配的实际端口；
/// - `accept(ctx)`：返回下一个入站连接；监听器已关闭返回 [`NetError::Closed`]，
///   上下文失效返回 [`NetError::Cancelled`]，两者同时成立时报告关闭；
/// - `close`：释放监听资源，挂起的 `accept` 以关闭错误失败，尚未被接受的入站连接被终止；
///   重复调用返回 `Ok(())`。
#[async_trait]
pub trait Listener: Send + Sync + fmt::Debug {
    fn addr(&self) -> &L4Addr;

    async fn accept(&self, ctx: &CallContext) -> Result<Box<dyn Connection>, NetError>;

    async fn close(&self) -> Result<(), NetError>;
}

/// 监听器的绑定与接受参数。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListenerConfig {
    backlog: u32,
    accept_order: AcceptOrder,
    socket: TcpSocketConfig,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            backlog: 1024,
            accept_order: AcceptOrder::default(),
            socket: TcpSocketConfig::default(),
        }
    }
}

impl ListenerConfig {
    /// 内核 `listen` 队列长度。
    pub fn with_backlog(mut self, backlog: u32) -> Self {
        self.backlog = backlog;
        self
    }

    /// 入站连接与挂起 `accept` 的匹配顺序。
    pub fn with_accept_order(mut self, order: AcceptOrder) -> Self {
        self.accept_order = order;
        self
    }

    /// 应用到每个被接受连接的套接字配置。
    pub fn with_socket_config(mut self, socket: TcpSocketConfig) -> Self {
        self.socket = socket;
        self
    }

    pub fn backlog(&self) -> u32 {
        self.backlog
    }

    pub fn accept_order(&self) -> AcceptOrder {
        self.accept_order
    }

    pub fn socket_config(&self) -> &TcpSocketConfig {
        &self.socket
    }
}

/// 基于 Tokio 的 TCP 监听器。
///
/// # 教案式注释
///
/// ## 意图 (Why)
/// - 内核队列中的连接按到达顺序交付，而挂起的 `accept` 需要按配置顺序匹配，
///   因此由后台任务持续接受并投递到 [`AcceptQueue`]，`accept` 只从队列取值。
///
/// ## 逻辑 (How)
/// - `bind`：校验作用域与地址族，经 `TcpSocket` 设置 `SO_REUSEADDR` 后绑定并监听；
/// - 后台任务循环 `accept`，成功即投递，队列关闭时终止刚接受的连接并退出；
///   单次接受失败记录告警后稍候重试；
/// - `close`/`Drop`：终止后台任务（随之释放监听套接字），关闭队列并以 RST 终止未被接受的连接。
///
/// ## 注意事项 (Trade-offs)
/// - 入站连接在被 `accept` 取走前已完成握手，对端可能已开始发送数据；
/// - 未被接受的连接在队列中无上限累积，受内核 backlog 与对端行为约束。
pub struct TcpListener {
    addr: L4Addr,
    queue: Arc<AcceptQueue<TcpStream>>,
    acceptor: Mutex<Option<JoinHandle<()>>>,
    config: ListenerConfig,
}

impl TcpListener {
    /// 在 `scope` 内绑定 `addr` 并开始接受连接。
    ///
    /// # 契约（What）
    /// - 只支持 `tcp`、`tcp4`、`tcp6`，其余作用域返回 [`NetError::UnsupportedScope`]；
    /// - 主机必须是 IP 字面量；地址族与作用域后缀冲突返回格式错误；
    /// - 返回的监听器保留请求中的 zone。
    ///
    /// 需要在 Tokio 运行时中调用。
    pub async fn bind(
        scope: Scope,
        addr: impl IntoNetLoc,
        config: ListenerConfig,
    ) -> Result<Self, NetError> {
        if !scope.is_tcp() {
            return Err(NetError::UnsupportedScope(scope));
        }
        let requested = L4Addr::resolve(L4Protocol::Tcp, addr)?;
        if !scope.accepts(&requested.ip()) {
            return Err(NetError::Addr(AddrError::Format {
                what: "listen address family",
                input: requested.to_string(),
            }));
        }

        let socket_addr = to_socket_addr(&requested)?;
        let socket = if socket_addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|err| map_io_error(Operation::BIND, err))?;
        socket
            .set_reuseaddr(true)
            .map_err(|err| map_io_error(Operation::BIND, err))?;
        socket
            .bind(socket_addr)
            .map_err(|err| map_io_error(Operation::BIND, err))?;
        let listener = socket
            .listen(config.backlog)
            .map_err(|err| map_io_error(Operation::BIND, err))?;
        let local = listener
            .local_addr()
            .map_err(|err| map_io_error(Operation::BIND, err))?;

        let bound = L4Addr::from_socket_addr(L4Protocol::Tcp, local);
        let addr = L4Addr::tcp(bound.ip(), i64::from(bound.port()), requested.zone())?;
        let queue = Arc::new(AcceptQueue::new(config.accept_order));
        let acceptor = tokio::spawn(accept_loop(listener, Arc::clone(&queue), addr.clone()));
        debug!(%addr, %scope, order = ?config.accept_order, "tcp listener bound");

        Ok(Self {
            addr,
            queue,
            acceptor: Mutex::new(Some(acceptor)),
            config,
        })
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    fn shutdown(&self) {
        let acceptor = self
            .acceptor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let Some(acceptor) = acceptor else {
            return;
        };
        acceptor.abort();
        let unaccepted = self.queue.close();
        debug!(addr = %self.addr, unaccepted = unaccepted.len(), "tcp listener closed");
        unaccepted.into_iter().for_each(discard);
    }
}

async fn accept_loop(
    listener: TokioTcpListener,
    queue: Arc<AcceptQueue<TcpStream>>,
    addr: L4Addr,
) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                trace!(listener = %addr, %peer, "inbound connection queued");
                if let Err(stream) = queue.offer(stream) {
                    discard(stream);
                    break;
                }
            }
            Err(err) => {
                warn!(listener = %addr, error = %err, "tcp accept failed, retrying");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

#[async_trait]
impl Listener for TcpListener {
    fn addr(&self) -> &L4Addr {
        &self.addr
    }

    async fn accept(&self, ctx: &CallContext) -> Result<Box<dyn Connection>, NetError> {
        // 排队期间已被对端重置的连接无法取得地址，跳过后继续等待下一个。
        loop {
            let stream = self.queue.accept(ctx).await?;
            match TcpConn::from_stream(stream, &self.config.socket) {
                Ok(conn) => return Ok(Box::new(conn)),
                Err(err) => {
                    debug!(addr = %self.addr, error = %err, "dropping unusable inbound connection");
                }
            }
        }
    }

    async fn close(&self) -> Result<(), NetError> {
        self.shutdown();
        Ok(())
    }
}

impl Drop for TcpListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for TcpListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpListener")
            .field("addr", &self.addr)
            .field("queue", &self.queue)
            .field("config", &self.config)
            .finish()
    }
}
