use crate::{
    context::CallContext,
    error::{NetError, Operation},
};
use async_trait::async_trait;
use spark_netaddr::codec;
use std::{collections::HashMap, fmt, net::SocketAddr, sync::Arc};
use tracing::debug;

/// 主机名解析结果：IPv4/IPv6 地址文本，保持解析后端给出的顺序。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LookupHostResult {
    pub addrs: Vec<String>,
}

/// 主机名到地址列表的解析能力。
///
/// # 教案级注释
///
/// ## 契约（What）
/// - 返回的地址可以混合 IPv4 与 IPv6，顺序由后端决定，本层不重排；
/// - 后端失败（不存在、超时、传输错误）报告为 [`NetError::Resolution`]；
/// - 上下文失效报告为 [`NetError::Cancelled`]，且会抢占仍在进行中的查询。
#[async_trait]
pub trait Resolver: Send + Sync + fmt::Debug {
    async fn lookup_host(
        &self,
        ctx: &CallContext,
        host: &str,
    ) -> Result<LookupHostResult, NetError>;
}

/// 基于操作系统解析器（`getaddrinfo`）的实现。
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup_host(
        &self,
        ctx: &CallContext,
        host: &str,
    ) -> Result<LookupHostResult, NetError> {
        ctx.check(Operation::RESOLVE)?;
        if codec::validate_ip_addr(host) {
            return Ok(LookupHostResult {
                addrs: vec![host.to_owned()],
            });
        }

        let resolved = ctx
            .race(Operation::RESOLVE, async {
                tokio::net::lookup_host((host, 0))
                    .await
                    .map_err(|err| NetError::Resolution {
                        host: host.to_owned(),
                        detail: err.to_string(),
                    })
            })
            .await?;

        let mut addrs: Vec<String> = Vec::new();
        for addr in resolved {
            let text = socket_ip_text(&addr);
            if !addrs.contains(&text) {
                addrs.push(text);
            }
        }
        if addrs.is_empty() {
            return Err(NetError::Resolution {
                host: host.to_owned(),
                detail: "no addresses returned".to_owned(),
            });
        }
        debug!(host, count = addrs.len(), "system resolver answered");
        Ok(LookupHostResult { addrs })
    }
}

/// 取出 IP 文本；IPv6 的非零 scope id 作为数字 zone 保留。
fn socket_ip_text(addr: &SocketAddr) -> String {
    match addr {
        SocketAddr::V6(v6) if v6.scope_id() != 0 => format!("{}%{}", v6.ip(), v6.scope_id()),
        _ => addr.ip().to_string(),
    }
}

/// 内存中的静态主机表，主机名大小写不敏感。
///
/// 常用于测试与配置文件中的 hosts 覆盖；未登记的主机返回 [`NetError::Resolution`]。
#[derive(Clone, Debug, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<String>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记主机，返回自身以便链式调用。已登记的主机会被整体覆盖。
    pub fn with_host<I, S>(mut self, host: &str, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(host, addrs);
        self
    }

    pub fn insert<I, S>(&mut self, host: &str, addrs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts.insert(
            host.to_ascii_lowercase(),
            addrs.into_iter().map(Into::into).collect(),
        );
    }

    pub fn get(&self, host: &str) -> Option<&[String]> {
        self.hosts
            .get(&host.to_ascii_lowercase())
            .map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn lookup_host(
        &self,
        ctx: &CallContext,
        host: &str,
    ) -> Result<LookupHostResult, NetError> {
        ctx.check(Operation::RESOLVE)?;
        match self.get(host) {
            Some(addrs) => Ok(LookupHostResult {
                addrs: addrs.to_vec(),
            }),
            None => Err(NetError::Resolution {
                host: host.to_owned(),
                detail: "host not present in static table".to_owned(),
            }),
        }
    }
}

/// 先查静态表、未命中再委托给后备解析器。
#[derive(Clone, Debug)]
pub struct LayeredResolver {
    table: StaticResolver,
    fallback: Arc<dyn Resolver>,
}

impl LayeredResolver {
    pub fn new(table: StaticResolver, fallback: Arc<dyn Resolver>) -> Self {
        Self { table, fallback }
    }
}

#[async_trait]
impl Resolver for LayeredResolver {
    async fn lookup_host(
        &self,
        ctx: &CallContext,
        host: &str,
    ) -> Result<LookupHostResult, NetError> {
        if self.table.get(host).is_some() {
            return self.table.lookup_host(ctx, host).await;
        }
        self.fallback.lookup_host(ctx, host).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{context::Deadline, error::ErrorKind};

    #[tokio::test]
    async fn literal_hosts_bypass_backend() {
        let ctx = CallContext::background();
        let result = SystemResolver
            .lookup_host(&ctx, "fe80::1%eth0")
            .await
            .unwrap();
        assert_eq!(result.addrs, vec!["fe80::1%eth0".to_owned()]);
    }

    #[tokio::test]
    async fn system_resolver_resolves_localhost() {
        let ctx = CallContext::background();
        let result = SystemResolver.lookup_host(&ctx, "localhost").await.unwrap();
        assert!(!result.addrs.is_empty());
        assert!(result.addrs.iter().all(|addr| codec::validate_ip_addr(addr)));
    }

    #[tokio::test]
    async fn expired_context_is_reported_before_lookup() {
        let ctx = CallContext::builder()
            .with_deadline(Deadline::at(tokio::time::Instant::now()))
            .build();
        let err = SystemResolver
            .lookup_host(&ctx, "example.invalid")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn static_table_is_case_insensitive_and_ordered() {
        let table = StaticResolver::new().with_host("Db.Internal", ["192.0.2.2", "192.0.2.1"]);
        let ctx = CallContext::background();
        let result = table.lookup_host(&ctx, "db.internal").await.unwrap();
        assert_eq!(result.addrs, vec!["192.0.2.2", "192.0.2.1"]);
        let err = table.lookup_host(&ctx, "other").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
    }

    #[tokio::test]
    async fn layered_resolver_prefers_table() {
        let fallback = StaticResolver::new().with_host("b", ["198.51.100.1"]);
        let layered = LayeredResolver::new(
            StaticResolver::new().with_host("a", ["192.0.2.1"]),
            Arc::new(fallback),
        );
        let ctx = CallContext::background();
        assert_eq!(layered.lookup_host(&ctx, "a").await.unwrap().addrs, vec!["192.0.2.1"]);
        assert_eq!(layered.lookup_host(&ctx, "b").await.unwrap().addrs, vec!["198.51.100.1"]);
        assert!(layered.lookup_host(&ctx, "c").await.is_err());
    }
}
