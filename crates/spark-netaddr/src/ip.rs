use crate::{AddrError, codec};
use core::{fmt, str::FromStr};
use std::net::{IpAddr as StdIpAddr, Ipv4Addr, Ipv6Addr};

/// 网络层原始地址：4 字节 IPv4 或 16 字节 IPv6。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 以定长数组承载地址字节，使“长度只能是 4 或 16”在类型层面成立，无需运行期再次检查；
/// - 与标准库 [`std::net::IpAddr`] 可无损互转，便于接入 Tokio 套接字。
///
/// ## 契约（What）
/// - `from_bytes`：仅接受长度 4 或 16 的切片，其余长度返回 [`AddrError::Format`]；
/// - `FromStr`：委托 [`codec::parse_ip`]，不接受 zone；
/// - `Display`：IPv4 输出点分十进制，IPv6 输出规范压缩形式，因此 `parse(display(x)) == x`。
///
/// ## 注意事项（Trade-offs）
/// - 不区分 IPv4 映射地址（`::ffff:a.b.c.d`）与纯 IPv4，二者被视为不同的值。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ip {
    /// IPv4 地址。
    V4([u8; 4]),
    /// IPv6 地址。
    V6([u8; 16]),
}

impl Ip {
    /// IPv4 未指定地址 `0.0.0.0`。
    pub const UNSPECIFIED_V4: Ip = Ip::V4([0; 4]);
    /// IPv6 未指定地址 `::`。
    pub const UNSPECIFIED_V6: Ip = Ip::V6([0; 16]);

    /// 从原始字节构造地址，字节长度决定地址族。
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddrError> {
        if let Ok(octets) = <[u8; 4]>::try_from(bytes) {
            return Ok(Ip::V4(octets));
        }
        if let Ok(octets) = <[u8; 16]>::try_from(bytes) {
            return Ok(Ip::V6(octets));
        }
        Err(AddrError::format(
            "IP byte length",
            format!("{} bytes", bytes.len()),
        ))
    }

    /// 地址字节（网络序）。
    pub fn octets(&self) -> &[u8] {
        match self {
            Ip::V4(octets) => octets,
            Ip::V6(octets) => octets,
        }
    }

    pub fn is_ipv4(&self) -> bool {
        matches!(self, Ip::V4(_))
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self, Ip::V6(_))
    }

    /// 地址族的位宽，即前缀长度上限。
    pub fn bit_len(&self) -> u8 {
        match self {
            Ip::V4(_) => 32,
            Ip::V6(_) => 128,
        }
    }

    /// 同地址族的未指定地址。
    pub fn unspecified_like(&self) -> Ip {
        match self {
            Ip::V4(_) => Ip::UNSPECIFIED_V4,
            Ip::V6(_) => Ip::UNSPECIFIED_V6,
        }
    }
}

impl FromStr for Ip {
    type Err = AddrError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        codec::parse_ip(text)
    }
}

impl fmt::Display for Ip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ip::V4(octets) => f.write_str(&codec::format_ipv4(octets)),
            Ip::V6(octets) => f.write_str(&codec::format_ipv6(octets)),
        }
    }
}

impl From<Ipv4Addr> for Ip {
    fn from(addr: Ipv4Addr) -> Self {
        Ip::V4(addr.octets())
    }
}

impl From<Ipv6Addr> for Ip {
    fn from(addr: Ipv6Addr) -> Self {
        Ip::V6(addr.octets())
    }
}

impl From<StdIpAddr> for Ip {
    fn from(addr: StdIpAddr) -> Self {
        match addr {
            StdIpAddr::V4(v4) => v4.into(),
            StdIpAddr::V6(v6) => v6.into(),
        }
    }
}

impl From<Ip> for StdIpAddr {
    fn from(ip: Ip) -> Self {
        match ip {
            Ip::V4(octets) => StdIpAddr::V4(Ipv4Addr::from(octets)),
            Ip::V6(octets) => StdIpAddr::V6(Ipv6Addr::from(octets)),
        }
    }
}
