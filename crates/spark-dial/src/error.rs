//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为拨号、监听、读写暴露的错误语义提供集中定义，地址层的 [`AddrError`] 透明并入；
//! - 每种错误都带有稳定错误码，便于日志聚合与告警规则按码匹配。
//!
//! ## 设计要求（What）
//! - 所有错误实现 `thiserror::Error`，可直接以 `?` 传播；
//! - [`NetError::kind`] 提供扁平分类，调用方据此分支而无需匹配变体细节；
//! - 挂起点的取消与超时统一为 [`NetError::Cancelled`]，以 [`CancelReason`] 区分来源。

use core::fmt;
use spark_netaddr::{AddrError, Scope};
use std::io;
use thiserror::Error;

/// 描述一次可挂起操作对应的稳定错误码与默认文案。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Operation {
    code: &'static str,
    label: &'static str,
}

impl Operation {
    pub const RESOLVE: Operation = Operation {
        code: "spark.net.resolve_failed",
        label: "resolve",
    };
    pub const DIAL: Operation = Operation {
        code: "spark.net.dial_failed",
        label: "dial",
    };
    pub const CONNECT: Operation = Operation {
        code: "spark.net.tcp.connect_failed",
        label: "tcp connect",
    };
    pub const BIND: Operation = Operation {
        code: "spark.net.tcp.bind_failed",
        label: "tcp bind",
    };
    pub const ACCEPT: Operation = Operation {
        code: "spark.net.tcp.accept_failed",
        label: "tcp accept",
    };
    pub const READ: Operation = Operation {
        code: "spark.net.tcp.read_failed",
        label: "tcp read",
    };
    pub const WRITE: Operation = Operation {
        code: "spark.net.tcp.write_failed",
        label: "tcp write",
    };
    pub const SHUTDOWN: Operation = Operation {
        code: "spark.net.tcp.shutdown_failed",
        label: "tcp shutdown",
    };
    pub const CONFIGURE: Operation = Operation {
        code: "spark.net.tcp.configure_failed",
        label: "tcp configure",
    };

    /// 该操作发生 IO 失败时使用的错误码。
    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label)
    }
}

/// 挂起点放弃等待的原因。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelReason {
    /// 取消令牌被触发。
    Cancelled,
    /// 截止时间已过。
    DeadlineExceeded,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::Cancelled => f.write_str("context cancelled"),
            CancelReason::DeadlineExceeded => f.write_str("deadline exceeded"),
        }
    }
}

/// [`NetError`] 的扁平分类。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Format,
    Range,
    Resolution,
    Dial,
    Cancelled,
    Closed,
    UnsupportedScope,
    Io,
    ReadInProgress,
    Config,
}

const CANCEL_CODE: &str = "spark.net.cancelled";
const TIMEOUT_CODE: &str = "spark.net.timeout";

/// 网络层错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：把“文本写错”“解析失败”“全部端点不可达”“调用方放弃”“对象已关闭”
///   等语义拆成独立变体，调用方可据此决定是否重试。
/// - **契约 (What)**：
///   - `Addr`：地址/端口/zone/netloc 文本不合法，或数值越界，透明包装 [`AddrError`]；
///   - `Dial`：只汇总“没有任何端点连通”，不逐个列出每次尝试的失败；
///   - `Cancelled`：上下文在操作完成前失效，优先级高于任何进行中的尝试结果；
///   - `Closed`：对已关闭的监听器或连接发起操作，或读过程中连接被关闭；
///   - `Io`：拨号迭代之外的套接字失败，例如绑定端口被占用。
/// - **设计权衡 (Trade-offs)**：`Io` 保留原始 [`io::Error`]，因此整体不实现 `Clone`。
#[derive(Debug, Error)]
pub enum NetError {
    /// 地址文本或数值不合法。
    #[error(transparent)]
    Addr(#[from] AddrError),

    /// 主机名解析失败。
    #[error("could not resolve host `{host}`: {detail}")]
    Resolution { host: String, detail: String },

    /// 所有候选端点均未连通。
    #[error("could not connect to any endpoint for `{target}`")]
    Dial { target: String },

    /// 上下文在操作完成前失效。
    #[error("{op} aborted: {reason}")]
    Cancelled { op: Operation, reason: CancelReason },

    /// 目标对象已关闭。
    #[error("{op} failed: the {resource} was closed")]
    Closed {
        op: Operation,
        resource: &'static str,
    },

    /// 作用域为保留值，尚无拨号/监听实现。
    #[error("unsupported scope `{0}`")]
    UnsupportedScope(Scope),

    /// 底层套接字失败。
    #[error("{op}: {source}")]
    Io {
        op: Operation,
        #[source]
        source: io::Error,
    },

    /// 同一连接上已有一个未完成的读操作。
    #[error("a read is already in progress on this connection")]
    ReadInProgress,

    /// 配置文本无法解析或取值不合法。
    #[error("invalid network configuration: {0}")]
    Config(String),
}

impl NetError {
    pub(crate) fn cancelled(op: Operation, reason: CancelReason) -> Self {
        Self::Cancelled { op, reason }
    }

    pub(crate) fn closed(op: Operation, resource: &'static str) -> Self {
        Self::Closed { op, resource }
    }

    /// 扁平分类。
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetError::Addr(AddrError::Format { .. }) => ErrorKind::Format,
            NetError::Addr(AddrError::Range { .. }) => ErrorKind::Range,
            NetError::Resolution { .. } => ErrorKind::Resolution,
            NetError::Dial { .. } => ErrorKind::Dial,
            NetError::Cancelled { .. } => ErrorKind::Cancelled,
            NetError::Closed { .. } => ErrorKind::Closed,
            NetError::UnsupportedScope(_) => ErrorKind::UnsupportedScope,
            NetError::Io { .. } => ErrorKind::Io,
            NetError::ReadInProgress => ErrorKind::ReadInProgress,
            NetError::Config(_) => ErrorKind::Config,
        }
    }

    /// 稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            NetError::Addr(AddrError::Format { .. }) => "spark.net.addr.invalid_format",
            NetError::Addr(AddrError::Range { .. }) => "spark.net.addr.out_of_range",
            NetError::Resolution { .. } => Operation::RESOLVE.code,
            NetError::Dial { .. } => Operation::DIAL.code,
            NetError::Cancelled {
                reason: CancelReason::Cancelled,
                ..
            } => CANCEL_CODE,
            NetError::Cancelled {
                reason: CancelReason::DeadlineExceeded,
                ..
            } => TIMEOUT_CODE,
            NetError::Closed { .. } => "spark.net.closed",
            NetError::UnsupportedScope(_) => "spark.net.unsupported_scope",
            NetError::Io { op, .. } => op.code,
            NetError::ReadInProgress => "spark.net.tcp.read_in_progress",
            NetError::Config(_) => "spark.net.config_invalid",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, NetError::Cancelled { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, NetError::Closed { .. })
    }
}

/// 将 IO 错误映射为网络层错误，并附带操作错误码。
pub(crate) fn map_io_error(op: Operation, error: io::Error) -> NetError {
    NetError::Io { op, source: error }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_codes_are_stable() {
        let format = NetError::from(AddrError::Format {
            what: "port",
            input: "x".into(),
        });
        assert_eq!(format.kind(), ErrorKind::Format);
        assert_eq!(format.to_string(), "invalid port: `x`");

        let timeout = NetError::cancelled(Operation::ACCEPT, CancelReason::DeadlineExceeded);
        assert_eq!(timeout.code(), "spark.net.timeout");
        assert_eq!(timeout.to_string(), "tcp accept aborted: deadline exceeded");
        assert!(timeout.is_cancelled());

        let io = map_io_error(Operation::BIND, io::Error::from(io::ErrorKind::AddrInUse));
        assert_eq!(io.code(), "spark.net.tcp.bind_failed");
        assert_eq!(io.kind(), ErrorKind::Io);

        let dial = NetError::Dial {
            target: "example.com:80".into(),
        };
        assert_eq!(
            dial.to_string(),
            "could not connect to any endpoint for `example.com:80`"
        );
    }
}
