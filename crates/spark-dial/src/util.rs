use crate::error::NetError;
use spark_netaddr::{AddrError, L4Addr};
use std::net::SocketAddr;

/// 将端点转换为标准库地址，zone 解析为 IPv6 scope id。
///
/// 数字 zone 直接作为索引；命名 zone 经接口表查询，查不到时返回格式错误。
pub(crate) fn to_socket_addr(addr: &L4Addr) -> Result<SocketAddr, NetError> {
    Ok(addr.socket_addr(zone_index(addr.zone())?))
}

fn zone_index(zone: &str) -> Result<u32, NetError> {
    if zone.is_empty() {
        return Ok(0);
    }
    if let Ok(index) = zone.parse::<u32>() {
        return Ok(index);
    }
    interface_index(zone).ok_or_else(|| {
        NetError::Addr(AddrError::Format {
            what: "zone interface",
            input: zone.to_owned(),
        })
    })
}

#[cfg(unix)]
fn interface_index(name: &str) -> Option<u32> {
    nix::net::if_::if_nametoindex(name).ok()
}

#[cfg(not(unix))]
fn interface_index(_name: &str) -> Option<u32> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use spark_netaddr::L4Protocol;

    #[test]
    fn numeric_zone_becomes_scope_id() {
        let addr = L4Addr::resolve(L4Protocol::Tcp, "[fe80::1%7]:80").unwrap();
        match to_socket_addr(&addr).unwrap() {
            SocketAddr::V6(v6) => assert_eq!(v6.scope_id(), 7),
            other => panic!("期望 IPv6 地址，得到 {other}"),
        }
    }

    #[test]
    fn unknown_interface_is_a_format_error() {
        let addr = L4Addr::resolve(L4Protocol::Tcp, "[fe80::1%no-such-if0]:80").unwrap();
        let err = to_socket_addr(&addr).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Format);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn loopback_interface_name_resolves() {
        let addr = L4Addr::resolve(L4Protocol::Tcp, "[fe80::1%lo]:80").unwrap();
        let SocketAddr::V6(v6) = to_socket_addr(&addr).unwrap() else {
            panic!("期望 IPv6 地址");
        };
        assert_ne!(v6.scope_id(), 0);
    }
}
