//! IPv6 规范化输出的性质测试：任意 16 字节往返不变，规范文本再次格式化保持一致。

use proptest::prelude::*;
use spark_netaddr::{Ip, codec};

/// 偏向生成大量零分组的字节，覆盖多段零串并列的压缩分支。
fn sparse_groups() -> impl Strategy<Value = [u8; 16]> {
    prop::array::uniform8(prop_oneof![3 => Just(0u16), 1 => any::<u16>()]).prop_map(|groups| {
        let mut bytes = [0u8; 16];
        for (chunk, group) in bytes.chunks_exact_mut(2).zip(groups) {
            chunk.copy_from_slice(&group.to_be_bytes());
        }
        bytes
    })
}

proptest! {
    #[test]
    fn prop_stringify_then_parse_is_identity(bytes in any::<[u8; 16]>()) {
        let text = codec::stringify_ipv6(&bytes).unwrap();
        prop_assert_eq!(codec::parse_ipv6(&text).unwrap(), bytes);
    }

    #[test]
    fn prop_canonical_form_is_idempotent(bytes in sparse_groups()) {
        let text = codec::stringify_ipv6(&bytes).unwrap();
        let reparsed = codec::parse_ipv6(&text).unwrap();
        prop_assert_eq!(codec::stringify_ipv6(&reparsed).unwrap(), text.clone());
        prop_assert!(text.matches("::").count() <= 1);
        prop_assert_eq!(text.to_lowercase(), text);
    }

    #[test]
    fn prop_canonical_form_is_accepted_by_std(bytes in sparse_groups()) {
        let ours = Ip::V6(bytes).to_string();
        prop_assert_eq!(
            ours.parse::<std::net::Ipv6Addr>().unwrap(),
            std::net::Ipv6Addr::from(bytes)
        );
    }

    #[test]
    fn prop_ipv4_text_round_trips(bytes in any::<[u8; 4]>()) {
        let text = codec::stringify_ipv4(&bytes).unwrap();
        prop_assert_eq!(codec::parse_ipv4(&text).unwrap(), bytes);
    }
}

#[test]
fn compression_examples() {
    assert_eq!(codec::stringify_ipv6(&[0; 16]).unwrap(), "::");
    let mut bytes = [0u8; 16];
    bytes[0] = 0xfe;
    bytes[1] = 0x80;
    bytes[15] = 1;
    assert_eq!(codec::stringify_ipv6(&bytes).unwrap(), "fe80::1");
}
