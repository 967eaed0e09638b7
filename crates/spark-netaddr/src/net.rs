use crate::{AddrError, Ip, codec};
use core::{fmt, str::FromStr};

/// 地址与前缀长度的组合，仅作存储，不提供路由匹配。
///
/// # 契约（What）
/// - `prefix_len` 超过地址族上限（IPv4 为 32，IPv6 为 128）时被截断到上限；
/// - 负数前缀返回 [`AddrError::Range`]，非整数前缀文本返回 [`AddrError::Format`]；
/// - 文本形式为 `ip/prefix`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IpNet {
    ip: Ip,
    prefix_len: u8,
}

impl IpNet {
    pub fn new(ip: Ip, prefix_len: i64) -> Result<Self, AddrError> {
        let max = ip.bit_len();
        if prefix_len < 0 {
            return Err(AddrError::range(
                "prefix length",
                prefix_len,
                0,
                i64::from(max),
            ));
        }
        let prefix_len = u8::try_from(prefix_len).map_or(max, |len| len.min(max));
        Ok(Self { ip, prefix_len })
    }

    pub fn ip(&self) -> Ip {
        self.ip
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// 当前地址族允许的最大前缀长度。
    pub fn max_prefix_len(&self) -> u8 {
        self.ip.bit_len()
    }
}

impl FromStr for IpNet {
    type Err = AddrError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (ip, prefix) = text
            .split_once('/')
            .ok_or_else(|| AddrError::format("IP network", text))?;
        let ip = codec::parse_ip(ip)?;
        let prefix = codec::parse_decimal("prefix length", prefix)?;
        Self::new(ip, prefix)
    }
}

impl fmt::Display for IpNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_is_clamped_to_family_maximum() {
        let v4: Ip = "10.0.0.0".parse().unwrap();
        let v6: Ip = "2001:db8::".parse().unwrap();
        assert_eq!(IpNet::new(v4, 33).unwrap().prefix_len(), 32);
        assert_eq!(IpNet::new(v4, i64::MAX).unwrap().prefix_len(), 32);
        assert_eq!(IpNet::new(v6, 200).unwrap().prefix_len(), 128);
        assert_eq!(IpNet::new(v6, 48).unwrap().prefix_len(), 48);
        assert_eq!(IpNet::new(v4, 0).unwrap().prefix_len(), 0);
    }

    #[test]
    fn negative_prefix_is_rejected() {
        let err = IpNet::new(Ip::UNSPECIFIED_V4, -1).unwrap_err();
        assert_eq!(
            err,
            AddrError::Range {
                what: "prefix length",
                value: -1,
                min: 0,
                max: 32
            }
        );
    }

    #[test]
    fn parses_and_formats_cidr_text() {
        let net: IpNet = "2001:0db8::/32".parse().unwrap();
        assert_eq!(net.to_string(), "2001:db8::/32");
        assert_eq!(net.max_prefix_len(), 128);
        assert_eq!("10.0.0.0/40".parse::<IpNet>().unwrap().to_string(), "10.0.0.0/32");
        assert!("10.0.0.0/8.5".parse::<IpNet>().unwrap_err().is_format());
        assert!("10.0.0.0".parse::<IpNet>().unwrap_err().is_format());
        assert!("10.0.0.0/-3".parse::<IpNet>().unwrap_err().is_range());
    }
}
