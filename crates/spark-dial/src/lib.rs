#![deny(unsafe_code)]
#![doc = r#"
# spark-dial

## 设计动机（Why）
- **定位**：在 Tokio 运行时上提供可取消的建连层：主机名解析、多端点顺序回退拨号、
  监听与接受连接，以及面向字节流的读写关闭抽象。
- **架构角色**：地址语义全部来自 `spark-netaddr`，本 crate 只负责“何时挂起、何时放弃、
  谁来释放资源”。

## 核心契约（What）
- 每个可挂起操作都接收 [`CallContext`]，在挂起点与取消/截止时间竞速，
  失败者持有的资源（已建立的连接、已匹配的入站套接字）一定被释放或转交；
- 所有公开入口要么返回完整构造的值，要么返回 [`NetError`] 的某一种；
- 拨号按解析器给出的顺序逐个尝试端点，单个端点失败被吞掉，只有全部失败才报告 [`NetError::Dial`]；
- 监听器以可配置的顺序（默认后进先出）匹配入站套接字与挂起的 `accept`。

## 实现策略（How）
- [`context`]：基于原子位 + `Notify` 的取消令牌与 Tokio 截止时间，`race*` 系列以
  `tokio::select!` 组合；
- [`Dialer`]：解析 → 过滤地址族 → 逐个经 [`Connector`] 建连；
- [`AcceptQueue`]：与传输无关的匹配队列，[`TcpListener`] 由后台接受任务向其投递；
- [`Network`]：显式构造的默认实例，自由函数 [`dial`]、[`listen`]、[`lookup_host`] 委托给它。

## 风险与考量（Trade-offs）
- 顺序拨号不实现 Happy Eyeballs，端点较多且前序端点黑洞时建连耗时线性增长，可借助
  每次尝试的超时缓解；
- 后进先出的匹配顺序不保证公平，需要先来先服务时请在配置中切换为 `fifo`。
"#]

mod accept;
mod config;
mod conn;
mod connector;
pub mod context;
mod dialer;
pub mod error;
mod listener;
mod network;
mod resolver;
mod util;

pub use accept::{AcceptOrder, AcceptQueue};
pub use config::{DialSection, ListenSection, NetConfig, ResolverSection, SocketSection};
pub use conn::{Connection, TcpConn, TcpSocketConfig};
pub use connector::{Connector, TcpConnector};
pub use context::{CallContext, CallContextBuilder, Cancellation, Deadline};
pub use dialer::{Dialer, DialerBuilder};
pub use error::{CancelReason, ErrorKind, NetError, Operation};
pub use listener::{Listener, ListenerConfig, TcpListener};
pub use network::{Network, dial, listen, lookup_host};
pub use resolver::{LayeredResolver, LookupHostResult, Resolver, StaticResolver, SystemResolver};

pub use spark_netaddr as addr;
