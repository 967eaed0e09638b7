use crate::{
    conn::{Connection, TcpSocketConfig},
    connector::{Connector, TcpConnector},
    context::CallContext,
    error::{NetError, Operation},
    resolver::{Resolver, SystemResolver},
};
use spark_netaddr::{AddrError, IntoNetLoc, L4Addr, L4Protocol, NetLoc, Scope, codec};
use std::{io, sync::Arc, time::Duration};
use tracing::{debug, trace};

/// 多端点顺序回退的拨号器。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 主机名往往解析出多个地址，任一地址不可达都不应让整次拨号失败；
/// - 把解析器与建连器作为可替换的依赖，测试无需真实网络即可验证回退行为。
///
/// ## 逻辑（How）
/// 单次拨号的状态流转为 *解析 → 遍历端点 → 建连 → 已连通*，或终止于失败：
/// 1. 检查上下文；目标主机是 IP 字面量时直接作为唯一端点，否则交给解析器，
///    每个解析结果与原端口组合成候选；
/// 2. 逐个候选：再次检查上下文，解析为 [`L4Addr`]，按作用域后缀过滤地址族；
/// 3. 建连与上下文竞速，上下文先失效则立即以取消失败；单个候选失败被吞掉并尝试下一个；
/// 4. 候选耗尽（包括全部被过滤的情况）返回 [`NetError::Dial`]。
///
/// ## 契约（What）
/// - 候选按解析器顺序严格串行尝试，不做并发建连；
/// - 本地绑定地址原样传给每次尝试；与候选地址族不一致时视为该候选失败；
/// - 上下文失效优先于任何进行中尝试的结果，迟到的连接会被强制终止。
///
/// ## 注意事项（Trade-offs）
/// - 设置 `attempt_timeout` 后单次尝试超时按失败处理并继续下一个候选，
///   避免单个黑洞地址耗尽整个上下文的时间预算。
#[derive(Clone, Debug)]
pub struct Dialer {
    local_addr: Option<L4Addr>,
    resolver: Arc<dyn Resolver>,
    connector: Arc<dyn Connector>,
    attempt_timeout: Option<Duration>,
}

impl Default for Dialer {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Dialer {
    pub fn builder() -> DialerBuilder {
        DialerBuilder::default()
    }

    pub fn local_addr(&self) -> Option<&L4Addr> {
        self.local_addr.as_ref()
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    /// 在指定作用域内连接目标。
    ///
    /// `target` 可以是 `host:port` 文本（`"127.0.0.1:80"`、`"[fe80::1%eth0]:80"`、
    /// `"example.com:80"`），也可以是已切分的文本对。连接建立后上下文失效不再影响该连接。
    pub async fn dial(
        &self,
        ctx: &CallContext,
        scope: Scope,
        target: impl IntoNetLoc,
    ) -> Result<Box<dyn Connection>, NetError> {
        let target = target.into_net_loc()?;
        if !scope.is_tcp() {
            return Err(NetError::UnsupportedScope(scope));
        }
        ctx.check(Operation::DIAL)?;

        let candidates = self.candidates(ctx, &target).await?;
        debug!(%target, %scope, candidates = candidates.len(), "dial resolved candidates");

        for candidate in candidates {
            ctx.check(Operation::DIAL)?;
            let remote = L4Addr::resolve(L4Protocol::Tcp, candidate)?;
            if !scope.accepts(&remote.ip()) {
                trace!(%remote, %scope, "dial skipped endpoint outside scope");
                continue;
            }
            match self.attempt(ctx, &remote).await {
                Ok(conn) => {
                    debug!(%target, %remote, "dial connected");
                    return Ok(conn);
                }
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    debug!(%remote, error = %err, "dial attempt failed, trying next endpoint");
                }
            }
        }

        Err(NetError::Dial {
            target: target.to_string(),
        })
    }

    async fn candidates(&self, ctx: &CallContext, target: &NetLoc) -> Result<Vec<NetLoc>, NetError> {
        if codec::validate_ip_addr(target.host()) {
            return Ok(vec![target.clone()]);
        }
        let resolved = self.resolver.lookup_host(ctx, target.host()).await?;
        Ok(resolved
            .addrs
            .into_iter()
            .map(|ip| target.with_host(ip))
            .collect())
    }

    async fn attempt(
        &self,
        ctx: &CallContext,
        remote: &L4Addr,
    ) -> Result<Box<dyn Connection>, NetError> {
        if let Some(local) = &self.local_addr
            && local.ip().is_ipv4() != remote.ip().is_ipv4()
        {
            return Err(NetError::Addr(AddrError::Format {
                what: "local address family",
                input: local.to_string(),
            }));
        }

        let connect = self.connector.connect(remote, self.local_addr.as_ref());
        let connect = async {
            match self.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, connect)
                    .await
                    .unwrap_or_else(|_| {
                        Err(NetError::Io {
                            op: Operation::CONNECT,
                            source: io::Error::from(io::ErrorKind::TimedOut),
                        })
                    }),
                None => connect.await,
            }
        };
        ctx.race_with_cleanup(Operation::CONNECT, connect, |conn| conn.abort())
            .await
    }
}

/// `Dialer` 的建造器。
#[derive(Debug, Default)]
pub struct DialerBuilder {
    local_addr: Option<L4Addr>,
    resolver: Option<Arc<dyn Resolver>>,
    connector: Option<Arc<dyn Connector>>,
    attempt_timeout: Option<Duration>,
    socket_config: TcpSocketConfig,
}

impl DialerBuilder {
    /// 设置本地绑定地址。
    pub fn local_addr(mut self, addr: L4Addr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    /// 替换主机名解析器，默认使用 [`SystemResolver`]。
    pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// 替换建连器，默认使用 [`TcpConnector`]；设置后 `socket_config` 不再生效。
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// 单个端点的建连超时。
    pub fn attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// 默认建连器应用的套接字配置。
    pub fn socket_config(mut self, config: TcpSocketConfig) -> Self {
        self.socket_config = config;
        self
    }

    pub fn build(self) -> Dialer {
        Dialer {
            local_addr: self.local_addr,
            resolver: self
                .resolver
                .unwrap_or_else(|| Arc::new(SystemResolver)),
            connector: self
                .connector
                .unwrap_or_else(|| Arc::new(TcpConnector::new(self.socket_config))),
            attempt_timeout: self.attempt_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ErrorKind,
        context::Cancellation,
        error::map_io_error,
        resolver::StaticResolver,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };
    use tracing_test::traced_test;

    #[derive(Debug)]
    struct MockConn {
        local: L4Addr,
        remote: L4Addr,
        aborted: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connection for MockConn {
        fn local_addr(&self) -> &L4Addr {
            &self.local
        }

        fn remote_addr(&self) -> &L4Addr {
            &self.remote
        }

        async fn read(&self, _ctx: &CallContext, _max: usize) -> Result<Bytes, NetError> {
            Ok(Bytes::new())
        }

        async fn write(&self, _ctx: &CallContext, _data: &[u8]) -> Result<(), NetError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), NetError> {
            Ok(())
        }

        fn abort(&self) {
            self.aborted.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// 只有登记过的 IP 能连通，并记录每次尝试的端点。
    #[derive(Debug, Default)]
    struct ScriptedConnector {
        reachable: Vec<&'static str>,
        attempts: Mutex<Vec<String>>,
        cancel_on_connect: Option<Cancellation>,
        aborted: Arc<AtomicUsize>,
    }

    impl ScriptedConnector {
        fn reaching(reachable: Vec<&'static str>) -> Self {
            Self {
                reachable,
                ..Self::default()
            }
        }

        fn attempts(&self) -> Vec<String> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Connector for ScriptedConnector {
        async fn connect(
            &self,
            remote: &L4Addr,
            _local: Option<&L4Addr>,
        ) -> Result<Box<dyn Connection>, NetError> {
            self.attempts.lock().unwrap().push(remote.to_string());
            if let Some(token) = &self.cancel_on_connect {
                token.cancel();
            }
            if !self.reachable.contains(&remote.ip().to_string().as_str()) {
                return Err(map_io_error(
                    Operation::CONNECT,
                    io::Error::from(io::ErrorKind::ConnectionRefused),
                ));
            }
            Ok(Box::new(MockConn {
                local: L4Addr::tcp("127.0.0.1".parse().unwrap(), 40000, "").unwrap(),
                remote: remote.clone(),
                aborted: Arc::clone(&self.aborted),
            }))
        }
    }

    fn dialer(connector: &Arc<ScriptedConnector>) -> Dialer {
        let table = StaticResolver::new()
            .with_host("db.internal", ["192.0.2.1", "192.0.2.2"])
            .with_host("dual.internal", ["2001:db8::1", "192.0.2.2"]);
        Dialer::builder()
            .resolver(Arc::new(table))
            .connector(connector.clone())
            .build()
    }

    #[tokio::test]
    async fn falls_back_to_next_endpoint_in_resolver_order() {
        let connector = Arc::new(ScriptedConnector::reaching(vec!["192.0.2.2"]));
        let ctx = CallContext::background();
        let conn = dialer(&connector)
            .dial(&ctx, Scope::Tcp, "db.internal:5432")
            .await
            .unwrap();
        assert_eq!(conn.remote_addr().to_string(), "192.0.2.2:5432");
        assert_eq!(
            connector.attempts(),
            vec!["192.0.2.1:5432".to_owned(), "192.0.2.2:5432".to_owned()]
        );
    }

    #[tokio::test]
    async fn exhausted_endpoints_report_dial_error() {
        let connector = Arc::new(ScriptedConnector::reaching(vec![]));
        let ctx = CallContext::background();
        let err = dialer(&connector)
            .dial(&ctx, Scope::Tcp, "db.internal:5432")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dial);
        assert_eq!(
            err.to_string(),
            "could not connect to any endpoint for `db.internal:5432`"
        );
        assert_eq!(connector.attempts().len(), 2);
    }

    #[tokio::test]
    async fn cancelled_context_makes_no_attempt() {
        let connector = Arc::new(ScriptedConnector::reaching(vec!["192.0.2.2"]));
        let ctx = CallContext::background();
        ctx.cancellation().cancel();
        let err = dialer(&connector)
            .dial(&ctx, Scope::Tcp, "db.internal:5432")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(connector.attempts().is_empty());
    }

    #[tokio::test]
    async fn scope_suffix_filters_address_family() {
        let connector = Arc::new(ScriptedConnector::reaching(vec!["192.0.2.2", "2001:db8::1"]));
        let ctx = CallContext::background();

        let err = dialer(&connector)
            .dial(&ctx, Scope::Tcp6, "db.internal:80")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Dial);
        assert!(connector.attempts().is_empty(), "被过滤的端点不应发起建连");

        let conn = dialer(&connector)
            .dial(&ctx, Scope::Tcp4, "dual.internal:80")
            .await
            .unwrap();
        assert_eq!(conn.remote_addr().to_string(), "192.0.2.2:80");
        assert_eq!(connector.attempts(), vec!["192.0.2.2:80".to_owned()]);
    }

    #[tokio::test]
    async fn literal_targets_bypass_resolver() {
        let connector = Arc::new(ScriptedConnector::reaching(vec!["2001:db8::1"]));
        let dialer = Dialer::builder()
            .resolver(Arc::new(StaticResolver::new()))
            .connector(connector.clone())
            .build();
        let ctx = CallContext::background();
        let conn = dialer
            .dial(&ctx, Scope::Tcp, ("2001:db8::1", "443"))
            .await
            .unwrap();
        assert_eq!(conn.remote_addr().to_string(), "[2001:db8::1]:443");
    }

    #[tokio::test]
    async fn reserved_scopes_and_bad_targets_are_rejected() {
        let connector = Arc::new(ScriptedConnector::reaching(vec!["192.0.2.2"]));
        let ctx = CallContext::background();
        let dialer = dialer(&connector);

        let err = dialer.dial(&ctx, Scope::Udp, "192.0.2.2:53").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedScope);

        let err = dialer.dial(&ctx, Scope::Tcp, "192.0.2.2:99999").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);

        let err = dialer.dial(&ctx, Scope::Tcp, "unknown.host:80").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);
        assert!(connector.attempts().is_empty());
    }

    #[tokio::test]
    async fn connection_won_after_cancellation_is_aborted() {
        let ctx = CallContext::background();
        let connector = Arc::new(ScriptedConnector {
            reachable: vec!["192.0.2.2"],
            cancel_on_connect: Some(ctx.cancellation().child()),
            ..ScriptedConnector::default()
        });
        let err = dialer(&connector)
            .dial(&ctx, Scope::Tcp, "192.0.2.2:80")
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(connector.aborted.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn local_address_family_mismatch_skips_endpoint() {
        let connector = Arc::new(ScriptedConnector::reaching(vec!["192.0.2.2", "2001:db8::1"]));
        let dialer = Dialer::builder()
            .local_addr(L4Addr::tcp("2001:db8::9".parse().unwrap(), 0, "").unwrap())
            .resolver(Arc::new(StaticResolver::new().with_host("dual", ["192.0.2.2", "2001:db8::1"])))
            .connector(connector.clone())
            .build();
        let ctx = CallContext::background();
        let conn = dialer.dial(&ctx, Scope::Tcp, "dual:80").await.unwrap();
        assert_eq!(conn.remote_addr().to_string(), "[2001:db8::1]:80");
        assert_eq!(connector.attempts(), vec!["[2001:db8::1]:80".to_owned()]);
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_attempts_are_logged() {
        let connector = Arc::new(ScriptedConnector::reaching(vec!["192.0.2.2"]));
        let ctx = CallContext::background();
        dialer(&connector)
            .dial(&ctx, Scope::Tcp, "db.internal:5432")
            .await
            .unwrap();
        assert!(logs_contain("dial attempt failed"));
        assert!(logs_contain("192.0.2.1:5432"));
    }
}
