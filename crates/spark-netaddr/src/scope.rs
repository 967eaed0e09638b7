use crate::{AddrError, Ip};
use core::{fmt, str::FromStr};

/// 请求的传输/地址族组合。
///
/// # 教案式说明
/// - **意图 (Why)**：拨号与监听需要同时知道“用哪种传输”和“允许哪种地址族”，
///   用一个枚举承载两者，避免两个参数之间出现矛盾组合。
/// - **契约 (What)**：
///   - 名称后缀 `4` 只接受 IPv4 端点，`6` 只接受 IPv6 端点，无后缀两者皆可；
///   - 目前只有 `tcp`、`tcp4`、`tcp6` 具备拨号与监听实现，其余为保留值。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Tcp,
    Tcp4,
    Tcp6,
    Udp,
    Udp4,
    Udp6,
    Ip,
    Ip4,
    Ip6,
    Unix,
    Unixgram,
    Unixpacket,
}

impl Scope {
    /// 全部作用域，按名称表顺序排列。
    pub const ALL: [Scope; 12] = [
        Scope::Tcp,
        Scope::Tcp4,
        Scope::Tcp6,
        Scope::Udp,
        Scope::Udp4,
        Scope::Udp6,
        Scope::Ip,
        Scope::Ip4,
        Scope::Ip6,
        Scope::Unix,
        Scope::Unixgram,
        Scope::Unixpacket,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Tcp => "tcp",
            Scope::Tcp4 => "tcp4",
            Scope::Tcp6 => "tcp6",
            Scope::Udp => "udp",
            Scope::Udp4 => "udp4",
            Scope::Udp6 => "udp6",
            Scope::Ip => "ip",
            Scope::Ip4 => "ip4",
            Scope::Ip6 => "ip6",
            Scope::Unix => "unix",
            Scope::Unixgram => "unixgram",
            Scope::Unixpacket => "unixpacket",
        }
    }

    /// 是否属于 TCP 作用域族。
    pub fn is_tcp(&self) -> bool {
        matches!(self, Scope::Tcp | Scope::Tcp4 | Scope::Tcp6)
    }

    /// 按名称后缀判断端点地址族是否被允许。
    pub fn accepts(&self, ip: &Ip) -> bool {
        match self.as_str().as_bytes().last() {
            Some(b'4') => ip.is_ipv4(),
            Some(b'6') => ip.is_ipv6(),
            _ => true,
        }
    }
}

impl FromStr for Scope {
    type Err = AddrError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Scope::ALL
            .into_iter()
            .find(|scope| scope.as_str() == text)
            .ok_or_else(|| AddrError::format("scope", text))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
