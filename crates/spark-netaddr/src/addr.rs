use crate::{AddrError, Ip, codec};
use core::{fmt, str::FromStr};

/// 所有可寻址值的公共接口。
///
/// `network` 返回网络名（`"ip"`、`"tcp"`、`"udp"`），`Display` 给出可再次解析的文本形式。
pub trait NetAddr: fmt::Display + fmt::Debug + Send + Sync {
    /// 网络名。
    fn network(&self) -> &'static str;
}

/// 带可选 zone 的逻辑 IP 地址。
///
/// # 教案级注释
///
/// ## 意图（Why）
/// - 链路本地 IPv6 地址只有与接口（zone）组合才有意义，单独的 [`Ip`] 不足以表达；
/// - 作为 `ip` 网络的地址值，供日志与配置使用。
///
/// ## 契约（What）
/// - `zone` 为空串表示未指定；非空时必须满足 `[A-Za-z0-9:_-]+`；
/// - IPv4 地址不允许携带 zone，构造时即返回 [`AddrError::Format`]；
/// - `Display` 输出 `ip` 或 `ip%zone`，与 [`IpAddr::resolve`] 互逆。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IpAddr {
    ip: Ip,
    zone: String,
}

impl IpAddr {
    /// 校验并构造逻辑地址。
    pub fn new(ip: Ip, zone: impl Into<String>) -> Result<Self, AddrError> {
        let zone = zone.into();
        check_zone(&ip, &zone)?;
        Ok(Self { ip, zone })
    }

    /// 从 `ip` 或 `ip%zone` 文本解析。
    pub fn resolve(text: &str) -> Result<Self, AddrError> {
        let (ip, zone) = codec::parse_ip_addr(text)?;
        Ok(Self {
            ip,
            zone: zone.unwrap_or_default().to_owned(),
        })
    }

    /// 以已通过 [`check_zone`] 的字段构造。
    pub(crate) fn from_checked(ip: Ip, zone: String) -> Self {
        Self { ip, zone }
    }

    pub fn ip(&self) -> Ip {
        self.ip
    }

    /// zone 名称，未指定时为空串。
    pub fn zone(&self) -> &str {
        &self.zone
    }
}

/// 构造期的 zone 校验，供 [`IpAddr`] 与 [`L4Addr`](crate::L4Addr) 共享。
pub(crate) fn check_zone(ip: &Ip, zone: &str) -> Result<(), AddrError> {
    if zone.is_empty() {
        return Ok(());
    }
    if ip.is_ipv4() {
        return Err(AddrError::format("IPv4 zone", zone));
    }
    if !codec::validate_zone_name(zone) {
        return Err(AddrError::format("zone name", zone));
    }
    Ok(())
}

/// 按 `ip%zone` 约定拼接文本，zone 为空时省略。
pub(crate) fn write_ip_zone(f: &mut fmt::Formatter<'_>, ip: &Ip, zone: &str) -> fmt::Result {
    if zone.is_empty() {
        write!(f, "{ip}")
    } else {
        write!(f, "{ip}%{zone}")
    }
}

impl NetAddr for IpAddr {
    fn network(&self) -> &'static str {
        "ip"
    }
}

impl FromStr for IpAddr {
    type Err = AddrError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::resolve(text)
    }
}

impl fmt::Display for IpAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_ip_zone(f, &self.ip, &self.zone)
    }
}

impl From<Ip> for IpAddr {
    fn from(ip: Ip) -> Self {
        Self {
            ip,
            zone: String::new(),
        }
    }
}
