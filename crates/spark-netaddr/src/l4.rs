use crate::{
    AddrError, Ip, IpAddr, NetAddr, NetLoc, Scope,
    addr::{check_zone, write_ip_zone},
    codec,
    netloc::IntoNetLoc,
};
use core::fmt;
use std::net::{SocketAddr, SocketAddrV4, SocketAddrV6};

const PORT_MIN: i64 = 0;
const PORT_MAX: i64 = u16::MAX as i64;

/// 四层协议标签。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum L4Protocol {
    Tcp,
    Udp,
}

impl L4Protocol {
    /// 网络名，与 [`NetAddr::network`] 一致。
    pub fn network(&self) -> &'static str {
        match self {
            L4Protocol::Tcp => "tcp",
            L4Protocol::Udp => "udp",
        }
    }

    /// 根据作用域推导协议；非 TCP/UDP 作用域返回 `None`。
    pub fn for_scope(scope: Scope) -> Option<Self> {
        match scope {
            Scope::Tcp | Scope::Tcp4 | Scope::Tcp6 => Some(L4Protocol::Tcp),
            Scope::Udp | Scope::Udp4 | Scope::Udp6 => Some(L4Protocol::Udp),
            _ => None,
        }
    }
}

/// 校验端口号位于 `[0, 65535]`。
pub fn validate_port(port: i64) -> Result<u16, AddrError> {
    u16::try_from(port).map_err(|_| AddrError::range("port", port, PORT_MIN, PORT_MAX))
}

/// 严格解析十进制端口文本。
///
/// 只接受 `-?[0-9]+`：空串、小数、前后空白与服务名均为 [`AddrError::Format`]，
/// 整数越界为 [`AddrError::Range`]。
pub fn parse_port(text: &str) -> Result<u16, AddrError> {
    validate_port(codec::parse_decimal("port", text)?)
}

/// 传输层端点：协议标签 + IP + 端口 + zone。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - TCP 与 UDP 端点的数据形态完全相同，以带标签的单一结构表达，按标签分派而非依赖继承；
/// - 构造即校验，拨号器与监听器拿到的端点一定合法。
///
/// ## 契约（What）
/// - 端口位于 `[0, 65535]`，越界返回 [`AddrError::Range`]；
/// - zone 规则与 [`IpAddr`] 相同：IPv4 不得携带，IPv6 须满足 zone 语法；
/// - `Display`：IPv6 输出 `[ip%zone]:port`（zone 为空时省略 `%zone`），IPv4 输出 `ip:port`；
/// - [`L4Addr::resolve`] 只接受 IP 字面量主机，主机名解析由拨号器负责。
///
/// ## 注意事项（Trade-offs）
/// - 命名 zone 到接口索引的转换依赖操作系统，放在 `spark-dial` 中完成，本类型仅提供
///   [`L4Addr::socket_addr`] 接收已解析的索引。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct L4Addr {
    protocol: L4Protocol,
    ip: Ip,
    port: u16,
    zone: String,
}

impl L4Addr {
    /// 校验并构造端点。
    pub fn new(
        protocol: L4Protocol,
        ip: Ip,
        port: i64,
        zone: impl Into<String>,
    ) -> Result<Self, AddrError> {
        let port = validate_port(port)?;
        let zone = zone.into();
        check_zone(&ip, &zone)?;
        Ok(Self {
            protocol,
            ip,
            port,
            zone,
        })
    }

    /// 构造 TCP 端点。
    pub fn tcp(ip: Ip, port: i64, zone: impl Into<String>) -> Result<Self, AddrError> {
        Self::new(L4Protocol::Tcp, ip, port, zone)
    }

    /// 构造 UDP 端点。
    pub fn udp(ip: Ip, port: i64, zone: impl Into<String>) -> Result<Self, AddrError> {
        Self::new(L4Protocol::Udp, ip, port, zone)
    }

    /// 从 `host:port` 文本或文本对解析端点。
    ///
    /// # 契约（What）
    /// - 主机必须是 IP 字面量，IPv6 可带 `%zone`；主机名返回 [`AddrError::Format`]；
    /// - 端口按 [`parse_port`] 严格解析。
    pub fn resolve(protocol: L4Protocol, value: impl IntoNetLoc) -> Result<Self, AddrError> {
        let loc = value.into_net_loc()?;
        let (ip, zone) = codec::parse_ip_addr(loc.host())?;
        let port = parse_port(loc.port())?;
        Ok(Self {
            protocol,
            ip,
            port,
            zone: zone.unwrap_or_default().to_owned(),
        })
    }

    /// 按作用域推导协议后解析端点；作用域的地址族后缀不参与校验，由调用方自行过滤。
    pub fn resolve_in(scope: Scope, value: impl IntoNetLoc) -> Result<Self, AddrError> {
        let protocol = L4Protocol::for_scope(scope)
            .ok_or_else(|| AddrError::format("L4 scope", scope.as_str()))?;
        Self::resolve(protocol, value)
    }

    /// 由标准库地址构造；IPv6 的非零 scope id 记为数字 zone。
    pub fn from_socket_addr(protocol: L4Protocol, addr: SocketAddr) -> Self {
        let zone = match addr {
            SocketAddr::V6(v6) if v6.scope_id() != 0 => v6.scope_id().to_string(),
            _ => String::new(),
        };
        Self {
            protocol,
            ip: Ip::from(addr.ip()),
            port: addr.port(),
            zone,
        }
    }

    /// 转为标准库地址，`scope_id` 仅对 IPv6 生效。
    pub fn socket_addr(&self, scope_id: u32) -> SocketAddr {
        match self.ip {
            Ip::V4(octets) => SocketAddr::V4(SocketAddrV4::new(octets.into(), self.port)),
            Ip::V6(octets) => {
                SocketAddr::V6(SocketAddrV6::new(octets.into(), self.port, 0, scope_id))
            }
        }
    }

    pub fn protocol(&self) -> L4Protocol {
        self.protocol
    }

    pub fn ip(&self) -> Ip {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// IP 与 zone 组成的逻辑地址。
    pub fn ip_zone(&self) -> IpAddr {
        IpAddr::from_checked(self.ip, self.zone.clone())
    }

    /// 以 `(ip%zone, port)` 文本对表示端点，可再次交给 [`L4Addr::resolve`]。
    pub fn net_loc(&self) -> NetLoc {
        NetLoc::new(self.ip_zone().to_string(), self.port.to_string())
    }
}

impl IntoNetLoc for &L4Addr {
    fn into_net_loc(self) -> Result<NetLoc, AddrError> {
        Ok(self.net_loc())
    }
}

impl NetAddr for L4Addr {
    fn network(&self) -> &'static str {
        self.protocol.network()
    }
}

impl fmt::Display for L4Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ip.is_ipv6() {
            f.write_str("[")?;
            write_ip_zone(f, &self.ip, &self.zone)?;
            write!(f, "]:{}", self.port)
        } else {
            write!(f, "{}:{}", self.ip, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructs_and_formats() {
        let cases = [
            ("127.0.0.1", 8080, "", "127.0.0.1:8080"),
            ("::1", 8080, "", "[::1]:8080"),
            ("fe80::1", 8080, "eth0", "[fe80::1%eth0]:8080"),
        ];
        for protocol in [L4Protocol::Tcp, L4Protocol::Udp] {
            for (ip, port, zone, display) in cases {
                let addr = L4Addr::new(protocol, ip.parse().unwrap(), port, zone).unwrap();
                assert_eq!(addr.network(), protocol.network());
                assert_eq!(addr.to_string(), display);
                assert_eq!(addr.ip().to_string(), ip);
                assert_eq!(i64::from(addr.port()), port);
                assert_eq!(addr.zone(), zone);
            }
        }
    }

    #[test]
    fn port_bounds_are_enforced() {
        let ip = Ip::V4([127, 0, 0, 1]);
        assert!(L4Addr::tcp(ip, 65536, "").unwrap_err().is_range());
        assert!(L4Addr::tcp(ip, -1, "").unwrap_err().is_range());
        assert_eq!(L4Addr::tcp(ip, 0, "").unwrap().port(), 0);
        assert_eq!(L4Addr::tcp(ip, 65535, "").unwrap().port(), 65535);
        assert!(L4Addr::resolve(L4Protocol::Tcp, "127.0.0.1:8080.5").unwrap_err().is_format());
        assert!(L4Addr::resolve(L4Protocol::Tcp, ("127.0.0.1", "8080.5")).unwrap_err().is_format());
        assert!(L4Addr::resolve(L4Protocol::Tcp, ("127.0.0.1", "65536")).unwrap_err().is_range());
        assert!(L4Addr::resolve(L4Protocol::Tcp, "127.0.0.1").unwrap_err().is_format());
    }

    #[test]
    fn resolves_pairs_and_strings() {
        let cases: [(&str, &str, &str, u16, &str); 3] = [
            ("127.0.0.1:8080", "127.0.0.1:8080", "127.0.0.1", 8080, ""),
            ("[::1]:8080", "[::1]:8080", "::1", 8080, ""),
            ("[fe80::1%eth0]:8080", "[fe80::1%eth0]:8080", "fe80::1", 8080, "eth0"),
        ];
        for (text, display, ip, port, zone) in cases {
            for protocol in [L4Protocol::Tcp, L4Protocol::Udp] {
                let addr = L4Addr::resolve(protocol, text).unwrap();
                assert_eq!(addr.to_string(), display);
                assert_eq!(addr.ip().to_string(), ip);
                assert_eq!(addr.port(), port);
                assert_eq!(addr.zone(), zone);

                let pair = L4Addr::resolve(protocol, addr.net_loc()).unwrap();
                assert_eq!(pair, addr, "net_loc 必须可以无损还原端点");
            }
        }
        let split = L4Addr::resolve(L4Protocol::Tcp, ("fe80::1%eth0", "8080")).unwrap();
        assert_eq!(L4Addr::resolve(L4Protocol::Udp, &split).unwrap().port(), 8080);
        assert_eq!(split.to_string(), "[fe80::1%eth0]:8080");
    }

    #[test]
    fn resolve_rejects_hostnames_and_v4_zone() {
        assert!(L4Addr::resolve(L4Protocol::Tcp, "localhost:80").unwrap_err().is_format());
        assert!(L4Addr::tcp(Ip::V4([10, 0, 0, 1]), 80, "eth0").unwrap_err().is_format());
    }

    #[test]
    fn resolve_in_derives_protocol_from_scope() {
        let addr = L4Addr::resolve_in(Scope::Udp6, "[::1]:53").unwrap();
        assert_eq!(addr.protocol(), L4Protocol::Udp);
        assert!(L4Addr::resolve_in(Scope::Unix, "[::1]:53").unwrap_err().is_format());
    }

    #[test]
    fn socket_addr_conversion_keeps_scope_id() {
        let std_addr: SocketAddr = "[fe80::1%3]:443".parse().unwrap();
        let addr = L4Addr::from_socket_addr(L4Protocol::Tcp, std_addr);
        assert_eq!(addr.zone(), "3");
        assert_eq!(addr.to_string(), "[fe80::1%3]:443");
        assert_eq!(addr.socket_addr(3), std_addr);

        let v4 = L4Addr::from_socket_addr(L4Protocol::Tcp, "10.0.0.1:80".parse().unwrap());
        assert_eq!(v4.zone(), "");
        assert_eq!(v4.socket_addr(7).to_string(), "10.0.0.1:80");
    }
}
