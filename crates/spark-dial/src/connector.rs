use crate::{
    conn::{Connection, TcpConn, TcpSocketConfig},
    error::{NetError, Operation, map_io_error},
    util::to_socket_addr,
};
use async_trait::async_trait;
use spark_netaddr::L4Addr;
use std::fmt;
use tokio::net::TcpSocket;

/// 单个端点的建连能力，是拨号器与具体传输之间的接缝。
///
/// 实现只负责“连一次”，不感知上下文：取消与截止时间由拨号器在外层竞速，
/// 被放弃的 Future 会被直接丢弃，实现需保证丢弃即释放套接字。
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn connect(
        &self,
        remote: &L4Addr,
        local: Option<&L4Addr>,
    ) -> Result<Box<dyn Connection>, NetError>;
}

/// 基于 Tokio `TcpSocket` 的建连实现。
#[derive(Clone, Debug, Default)]
pub struct TcpConnector {
    config: TcpSocketConfig,
}

impl TcpConnector {
    pub fn new(config: TcpSocketConfig) -> Self {
        Self { config }
    }

    /// 新建连接默认应用的套接字配置。
    pub fn socket_config(&self) -> &TcpSocketConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(
        &self,
        remote: &L4Addr,
        local: Option<&L4Addr>,
    ) -> Result<Box<dyn Connection>, NetError> {
        let remote_addr = to_socket_addr(remote)?;
        let socket = if remote_addr.is_ipv4() {
            TcpSocket::new_v4()
        } else {
            TcpSocket::new_v6()
        }
        .map_err(|err| map_io_error(Operation::CONNECT, err))?;
        if let Some(local) = local {
            socket
                .bind(to_socket_addr(local)?)
                .map_err(|err| map_io_error(Operation::BIND, err))?;
        }
        let stream = socket
            .connect(remote_addr)
            .await
            .map_err(|err| map_io_error(Operation::CONNECT, err))?;
        Ok(Box::new(TcpConn::from_stream(stream, &self.config)?))
    }
}
