use crate::{
    config::NetConfig,
    conn::Connection,
    context::CallContext,
    dialer::Dialer,
    error::NetError,
    listener::{ListenerConfig, TcpListener},
    resolver::{LayeredResolver, LookupHostResult, Resolver, SystemResolver},
};
use spark_netaddr::{IntoNetLoc, Scope};
use std::sync::{Arc, OnceLock};

/// 拨号器、解析器与监听参数的组合，是自由函数背后的默认实例。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 入口函数需要一个“默认”的拨号器与解析器；以显式构造、构造后不可变的值承载，
///   调用方可以自行持有多个实例，互不影响；
/// - [`Network::system`] 提供惰性初始化的进程级实例，只读共享。
///
/// ## 契约（What）
/// - `dial`/`lookup_host` 使用同一个解析器，静态主机表对两者同时生效；
/// - `listen` 返回的监听器使用本实例的 [`ListenerConfig`]。
#[derive(Clone, Debug)]
pub struct Network {
    dialer: Dialer,
    resolver: Arc<dyn Resolver>,
    listener_config: ListenerConfig,
}

impl Default for Network {
    fn default() -> Self {
        let resolver: Arc<dyn Resolver> = Arc::new(SystemResolver);
        Self::new(
            Dialer::builder().resolver(Arc::clone(&resolver)).build(),
            resolver,
            ListenerConfig::default(),
        )
    }
}

impl Network {
    pub fn new(dialer: Dialer, resolver: Arc<dyn Resolver>, listener_config: ListenerConfig) -> Self {
        Self {
            dialer,
            resolver,
            listener_config,
        }
    }

    /// 依据配置装配实例；`resolver.hosts` 非空时在系统解析器前叠加静态主机表。
    pub fn from_config(config: &NetConfig) -> Result<Self, NetError> {
        let table = config.static_hosts()?;
        let resolver: Arc<dyn Resolver> = if table.is_empty() {
            Arc::new(SystemResolver)
        } else {
            Arc::new(LayeredResolver::new(table, Arc::new(SystemResolver)))
        };

        let mut dialer = Dialer::builder()
            .resolver(Arc::clone(&resolver))
            .socket_config(config.dial.socket.to_socket_config());
        if let Some(local) = config.local_addr()? {
            dialer = dialer.local_addr(local);
        }
        if let Some(timeout) = config.attempt_timeout() {
            dialer = dialer.attempt_timeout(timeout);
        }

        Ok(Self::new(dialer.build(), resolver, config.listener_config()))
    }

    /// 进程级默认实例，首次访问时以默认配置构造。
    pub fn system() -> &'static Network {
        static SYSTEM: OnceLock<Network> = OnceLock::new();
        SYSTEM.get_or_init(Network::default)
    }

    pub fn dialer(&self) -> &Dialer {
        &self.dialer
    }

    pub fn resolver(&self) -> &Arc<dyn Resolver> {
        &self.resolver
    }

    pub fn listener_config(&self) -> &ListenerConfig {
        &self.listener_config
    }

    pub async fn dial(
        &self,
        ctx: &CallContext,
        scope: Scope,
        target: impl IntoNetLoc,
    ) -> Result<Box<dyn Connection>, NetError> {
        self.dialer.dial(ctx, scope, target).await
    }

    pub async fn listen(&self, scope: Scope, addr: impl IntoNetLoc) -> Result<TcpListener, NetError> {
        TcpListener::bind(scope, addr, self.listener_config.clone()).await
    }

    pub async fn lookup_host(
        &self,
        ctx: &CallContext,
        host: &str,
    ) -> Result<LookupHostResult, NetError> {
        self.resolver.lookup_host(ctx, host).await
    }
}

/// 使用进程级默认实例拨号。
pub async fn dial(
    ctx: &CallContext,
    scope: Scope,
    target: impl IntoNetLoc,
) -> Result<Box<dyn Connection>, NetError> {
    Network::system().dial(ctx, scope, target).await
}

/// 使用进程级默认实例监听。
pub async fn listen(scope: Scope, addr: impl IntoNetLoc) -> Result<TcpListener, NetError> {
    Network::system().listen(scope, addr).await
}

/// 使用进程级默认实例解析主机名。
pub async fn lookup_host(ctx: &CallContext, host: &str) -> Result<LookupHostResult, NetError> {
    Network::system().lookup_host(ctx, host).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[tokio::test]
    async fn configured_hosts_feed_dial_and_lookup() {
        let config = NetConfig::from_toml_str(
            r#"
            [resolver.hosts]
            "svc.test" = ["192.0.2.10"]
            "#,
        )
        .unwrap();
        let network = Network::from_config(&config).unwrap();
        let ctx = CallContext::background();
        let result = network.lookup_host(&ctx, "svc.test").await.unwrap();
        assert_eq!(result.addrs, vec!["192.0.2.10"]);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_at_construction() {
        let config = NetConfig::from_toml_str("[dial]\nlocal_addr = \"1.2.3.4:x\"").unwrap();
        let err = Network::from_config(&config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn system_instance_is_shared() {
        assert!(std::ptr::eq(Network::system(), Network::system()));
        assert_eq!(Network::system().listener_config().backlog(), 1024);
    }
}
