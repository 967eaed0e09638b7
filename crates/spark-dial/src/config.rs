//! # config 模块说明
//!
//! ## 角色定位（Why）
//! - 以声明式 TOML 描述拨号、监听与静态主机表，部署时无需改动代码即可调整建连行为；
//! - 配置只在构造 [`Network`](crate::Network) 时读取一次，运行期不可变。
//!
//! ## 契约（What）
//! - 所有段落与字段均可省略，缺省值等同于 [`NetConfig::default`]；
//! - 未知字段视为错误，避免拼写错误被静默忽略；
//! - 文本解析失败与取值不合法都报告为 [`NetError::Config`]。
//!
//! ```toml
//! [dial]
//! local_addr = "0.0.0.0:0"
//! attempt_timeout_ms = 3000
//!
//! [listen]
//! backlog = 512
//! accept_order = "fifo"
//! socket = { linger_ms = 0, nodelay = true }
//!
//! [resolver.hosts]
//! "db.internal" = ["10.0.0.5", "10.0.0.6"]
//! ```

use crate::{
    accept::AcceptOrder,
    conn::TcpSocketConfig,
    error::NetError,
    listener::ListenerConfig,
    resolver::StaticResolver,
};
use serde::Deserialize;
use spark_netaddr::{L4Addr, L4Protocol, codec};
use std::{collections::BTreeMap, time::Duration};

/// 网络层的完整配置。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetConfig {
    pub dial: DialSection,
    pub listen: ListenSection,
    pub resolver: ResolverSection,
}

/// `[dial]` 段。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DialSection {
    /// 本地绑定地址，`host:port` 形式，主机须为 IP 字面量。
    pub local_addr: Option<String>,
    /// 单个端点的建连超时（毫秒）。
    pub attempt_timeout_ms: Option<u64>,
    pub socket: SocketSection,
}

/// `[listen]` 段。
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListenSection {
    pub backlog: u32,
    pub accept_order: AcceptOrder,
    pub socket: SocketSection,
}

impl Default for ListenSection {
    fn default() -> Self {
        Self {
            backlog: ListenerConfig::default().backlog(),
            accept_order: AcceptOrder::default(),
            socket: SocketSection::default(),
        }
    }
}

/// `[resolver]` 段：优先于系统解析器的静态主机表。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverSection {
    pub hosts: BTreeMap<String, Vec<String>>,
}

/// 套接字选项。
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SocketSection {
    /// `SO_LINGER` 超时（毫秒），缺省遵循内核策略。
    pub linger_ms: Option<u64>,
    /// `TCP_NODELAY`。
    pub nodelay: bool,
}

impl NetConfig {
    /// 从 TOML 文本解析配置。
    pub fn from_toml_str(text: &str) -> Result<Self, NetError> {
        toml::from_str(text).map_err(|err| NetError::Config(err.to_string()))
    }

    /// 解析 `[dial] local_addr`。
    pub(crate) fn local_addr(&self) -> Result<Option<L4Addr>, NetError> {
        self.dial
            .local_addr
            .as_deref()
            .map(|text| {
                L4Addr::resolve(L4Protocol::Tcp, text)
                    .map_err(|err| NetError::Config(format!("dial.local_addr: {err}")))
            })
            .transpose()
    }

    pub(crate) fn attempt_timeout(&self) -> Option<Duration> {
        self.dial.attempt_timeout_ms.map(Duration::from_millis)
    }

    pub(crate) fn listener_config(&self) -> ListenerConfig {
        ListenerConfig::default()
            .with_backlog(self.listen.backlog)
            .with_accept_order(self.listen.accept_order)
            .with_socket_config(self.listen.socket.to_socket_config())
    }

    /// 构造静态主机表；表项必须是 IP 字面量。
    pub(crate) fn static_hosts(&self) -> Result<StaticResolver, NetError> {
        let mut table = StaticResolver::new();
        for (host, addrs) in &self.resolver.hosts {
            if let Some(bad) = addrs.iter().find(|addr| !codec::validate_ip_addr(addr)) {
                return Err(NetError::Config(format!(
                    "resolver.hosts.{host}: `{bad}` is not an IP address"
                )));
            }
            table.insert(host, addrs.iter().cloned());
        }
        Ok(table)
    }
}

impl SocketSection {
    pub(crate) fn to_socket_config(&self) -> TcpSocketConfig {
        TcpSocketConfig::new()
            .with_linger(self.linger_ms.map(Duration::from_millis))
            .with_nodelay(self.nodelay)
    }
}
