//! # netloc 模块说明
//!
//! ## 角色定位（Why）
//! - 处理尚未解析的 `host:port` 文本对：主机可能是主机名，也可能是 IP 字面量；
//! - 只负责切分与拼接，地址族判定留给 [`L4Addr`](crate::L4Addr) 与拨号器。
//!
//! ## 文法（What）
//! - `host? (':' port?)?`，其中 `host` 为不含 `:`、`[`、`]` 的记号，或以方括号包裹的字面量；
//! - 含 `:` 的主机（IPv6）必须加方括号，切分结果去掉方括号；
//! - `port` 由小写字母与数字组成，允许服务名，本层不做数值校验；
//! - 缺失的主机或端口以空串表示；
//! - 不满足文法但本身是裸 IPv6 字面量（可带 zone）的文本，视为只有主机、没有端口。
//!
//! ## 注意事项（Trade-offs）
//! - 端口为空时 [`join`] 不输出 `:`，因此 `"host:"` 与 `"host"` 切分结果相同，拼接后统一为 `"host"`；
//!   同理 `"[::1]"` 拼接后为裸 `"::1"`。

use crate::{AddrError, codec};
use core::{fmt, str::FromStr};

/// 未解析的 `(host, port)` 文本对，二者均可为空串。
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NetLoc {
    host: String,
    port: String,
}

impl NetLoc {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    /// 以新的主机替换当前主机，端口保持不变。
    pub fn with_host(&self, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: self.port.clone(),
        }
    }

    pub fn into_parts(self) -> (String, String) {
        (self.host, self.port)
    }
}

/// 切分 `host:port` 文本。
///
/// # 教案级注释
///
/// ## 契约（What）
/// - 成功时返回 [`NetLoc`]，缺失部分为空串；
/// - 空串以及既不满足文法、也不是裸 IPv6 字面量的文本返回 [`AddrError::Format`]。
///
/// ## 逻辑（How）
/// 1. 若以 `[` 开头，取到首个 `]` 为止作为主机，方括号内不得为空；
/// 2. 否则取到首个 `:`、`[` 或 `]` 之前的部分作为主机；
/// 3. 剩余部分必须为空，或是 `:` 加端口；
/// 4. 以上失败时尝试把整串当作裸 IPv6 字面量。
pub fn split(text: &str) -> Result<NetLoc, AddrError> {
    if text.is_empty() {
        return Err(AddrError::format("net location", text));
    }
    match split_grammar(text) {
        Some((host, port)) => Ok(NetLoc::new(host, port)),
        None if codec::validate_ipv6_addr(text) => Ok(NetLoc::new(text, "")),
        None => Err(AddrError::format("net location", text)),
    }
}

/// 拼接 `host:port`，是 [`split`] 的逆操作。
///
/// 端口为空时原样返回主机；否则主机含 `:` 时加方括号。
pub fn join(host: &str, port: &str) -> String {
    if port.is_empty() {
        host.to_owned()
    } else if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

fn split_grammar(text: &str) -> Option<(&str, &str)> {
    let (host, rest) = match text.strip_prefix('[') {
        Some(inner) => {
            let end = inner.find(']')?;
            if end == 0 {
                return None;
            }
            (&inner[..end], &inner[end + 1..])
        }
        None => {
            let end = text
                .find([':', '[', ']'])
                .unwrap_or(text.len());
            (&text[..end], &text[end..])
        }
    };
    let port = if rest.is_empty() {
        ""
    } else {
        rest.strip_prefix(':')?
    };
    if !port
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
    {
        return None;
    }
    Some((host, port))
}

/// 可被规整为 [`NetLoc`] 的输入：已切分的文本对或待切分的字符串。
pub trait IntoNetLoc {
    fn into_net_loc(self) -> Result<NetLoc, AddrError>;
}

/// 将任意 [`IntoNetLoc`] 输入规整为 [`NetLoc`]。
pub fn as_net_loc(value: impl IntoNetLoc) -> Result<NetLoc, AddrError> {
    value.into_net_loc()
}

impl IntoNetLoc for NetLoc {
    fn into_net_loc(self) -> Result<NetLoc, AddrError> {
        Ok(self)
    }
}

impl IntoNetLoc for &NetLoc {
    fn into_net_loc(self) -> Result<NetLoc, AddrError> {
        Ok(self.clone())
    }
}

impl IntoNetLoc for &str {
    fn into_net_loc(self) -> Result<NetLoc, AddrError> {
        split(self)
    }
}

impl IntoNetLoc for String {
    fn into_net_loc(self) -> Result<NetLoc, AddrError> {
        split(&self)
    }
}

impl IntoNetLoc for &String {
    fn into_net_loc(self) -> Result<NetLoc, AddrError> {
        split(self)
    }
}

impl<H, P> IntoNetLoc for (H, P)
where
    H: Into<String>,
    P: Into<String>,
{
    fn into_net_loc(self) -> Result<NetLoc, AddrError> {
        Ok(NetLoc::new(self.0, self.1))
    }
}

impl FromStr for NetLoc {
    type Err = AddrError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        split(text)
    }
}

impl fmt::Display for NetLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join(&self.host, &self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_documented_forms() {
        let cases = [
            ("host:port", "host", "port"),
            ("127.0.0.1:8080", "127.0.0.1", "8080"),
            ("[127.0.0.1]:80", "127.0.0.1", "80"),
            ("[::1]:8080", "::1", "8080"),
            ("[fe80::1%eth0]:8080", "fe80::1%eth0", "8080"),
            ("host:", "host", ""),
            (":8080", "", "8080"),
            ("host", "host", ""),
            ("127.0.0.1", "127.0.0.1", ""),
            ("::1", "::1", ""),
            ("fe80::1%eth0", "fe80::1%eth0", ""),
            ("[::1]", "::1", ""),
            (":", "", ""),
        ];
        for (text, host, port) in cases {
            let loc = split(text).unwrap_or_else(|err| panic!("`{text}` 切分失败：{err}"));
            assert_eq!((loc.host(), loc.port()), (host, port), "`{text}` 切分结果不符");
        }
    }

    #[test]
    fn join_inverts_split() {
        for text in [
            "127.0.0.1:8080",
            "[::1]:8080",
            "[fe80::1%eth0]:8080",
            ":8080",
            "host",
            "example.com:http",
            "::1",
            "fe80::1%eth0",
        ] {
            assert_eq!(split(text).unwrap().to_string(), text, "`{text}` 往返失败");
        }
    }

    #[test]
    fn empty_port_is_dropped_on_join() {
        assert_eq!(split("host:").unwrap(), split("host").unwrap());
        assert_eq!(join("host", ""), "host");
        assert_eq!(join("::1", ""), "::1");
        assert_eq!(join("::1", "80"), "[::1]:80");
    }

    #[test]
    fn rejects_malformed_text() {
        for text in [
            "",
            "[]:80",
            "[::1",
            "a[b]:1",
            "host:port:extra",
            "host:PORT",
            "host:80x!",
            "[::1]x",
            "fe80::1%",
        ] {
            assert!(split(text).unwrap_err().is_format(), "`{text}` 不应被接受");
        }
    }

    #[test]
    fn as_net_loc_accepts_pairs_and_strings() {
        assert_eq!(
            as_net_loc(("::1", "8080")).unwrap(),
            NetLoc::new("::1", "8080")
        );
        assert_eq!(
            as_net_loc(String::from("[::1]:8080")).unwrap(),
            NetLoc::new("::1", "8080")
        );
        let loc = NetLoc::new("example.com", "443");
        assert_eq!(as_net_loc(&loc).unwrap(), loc);
        assert!(as_net_loc("a]b").is_err());
    }
}
