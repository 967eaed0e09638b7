//! # codec 模块说明
//!
//! ## 角色定位（Why）
//! - 提供 IPv4/IPv6 文本与定长字节序列之间的底层互转，是所有地址值类型的唯一解析入口；
//! - 与值类型分离，方便配置加载、日志清洗等场景只做校验而不构造对象。
//!
//! ## 设计要求（What）
//! - `parse_*` 只接受完整合法的文本，失败统一返回 [`AddrError::Format`]；
//! - `stringify_*` 只接受长度恰好匹配地址族的字节序列（IPv4 为 4，IPv6 为 16）；
//! - `validate_*` 永不失败，仅返回布尔结果；
//! - 带 `_addr` 后缀的变体额外处理 `%zone` 后缀，且只有 IPv6 允许携带 zone。
//!
//! ## 实现说明（How）
//! - IPv4 每个八位组只允许 `0` 或不以 `0` 开头的十进制数，避免八进制歧义；
//! - IPv6 以 `::` 为界拆成头尾两段分别解析，嵌入式 IPv4 只允许出现在最后一段末尾并计为两个分组；
//! - 输出时压缩最长的连续零分组，长度相同取最靠前者，长度为 1 的零段同样压缩。

use crate::{AddrError, Ip};

const IPV4_LEN: usize = 4;
const IPV6_LEN: usize = 16;
const IPV6_GROUPS: usize = 8;

/// 校验 IPv4 文本。
pub fn validate_ipv4(text: &str) -> bool {
    parse_ipv4_octets(text).is_some()
}

/// 校验不带 zone 的 IPv6 文本。
pub fn validate_ipv6(text: &str) -> bool {
    parse_ipv6_octets(text).is_some()
}

/// 校验任一地址族的 IP 文本，不接受 zone。
pub fn validate_ip(text: &str) -> bool {
    validate_ipv4(text) || validate_ipv6(text)
}

/// 校验 IPv4 逻辑地址文本；IPv4 不携带 zone，因此与 [`validate_ipv4`] 等价。
pub fn validate_ipv4_addr(text: &str) -> bool {
    validate_ipv4(text)
}

/// 校验可带 `%zone` 后缀的 IPv6 文本。
pub fn validate_ipv6_addr(text: &str) -> bool {
    parse_ipv6_addr(text).is_ok()
}

/// 校验 IPv4 文本或可带 zone 的 IPv6 文本。
pub fn validate_ip_addr(text: &str) -> bool {
    validate_ipv4(text) || validate_ipv6_addr(text)
}

/// 校验 zone 名称，语法为 `[A-Za-z0-9:_-]+`。
pub fn validate_zone_name(zone: &str) -> bool {
    !zone.is_empty()
        && zone
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b':' | b'_' | b'-'))
}

/// 解析点分十进制 IPv4 文本。
pub fn parse_ipv4(text: &str) -> Result<[u8; IPV4_LEN], AddrError> {
    parse_ipv4_octets(text).ok_or_else(|| AddrError::format("IPv4 address", text))
}

/// 解析不带 zone 的 IPv6 文本。
///
/// # 教案级注释
///
/// ## 契约（What）
/// - 支持 `::` 零段省略（至多一次）、末尾嵌入式 IPv4（`x:x:x:x:x:x:d.d.d.d`）与完整八分组写法；
/// - 存在 `::` 时显式分组总数不得超过 7，否则必须恰好为 8；
/// - 十六进制分组为 1~4 位，大小写均可。
///
/// ## 逻辑（How）
/// - 以首个 `::` 拆分头尾两段，尾段若再次出现 `::` 即判定非法；
/// - 头段不允许嵌入 IPv4，尾段（或无 `::` 时的整体）仅最后一个分组可以是 IPv4；
/// - 头段写入前部，尾段写入后部，中间由零填充。
pub fn parse_ipv6(text: &str) -> Result<[u8; IPV6_LEN], AddrError> {
    parse_ipv6_octets(text).ok_or_else(|| AddrError::format("IPv6 address", text))
}

/// 按地址族解析 IP 文本：包含 `:` 的按 IPv6 处理，否则按 IPv4 处理。
pub fn parse_ip(text: &str) -> Result<Ip, AddrError> {
    if text.contains(':') {
        parse_ipv6(text).map(Ip::V6)
    } else {
        parse_ipv4(text).map(Ip::V4)
    }
}

/// 解析 IPv4 逻辑地址；IPv4 不携带 zone，任何 `%` 后缀都会导致格式错误。
pub fn parse_ipv4_addr(text: &str) -> Result<[u8; IPV4_LEN], AddrError> {
    parse_ipv4(text)
}

/// 解析可带 `%zone` 后缀的 IPv6 文本，返回字节与 zone（未指定时为 `None`）。
pub fn parse_ipv6_addr(text: &str) -> Result<([u8; IPV6_LEN], Option<&str>), AddrError> {
    let (ip, zone) = split_zone(text);
    let bytes = parse_ipv6(ip)?;
    match zone {
        Some(zone) if !validate_zone_name(zone) => Err(AddrError::format("zone name", zone)),
        zone => Ok((bytes, zone)),
    }
}

/// 按地址族解析可带 zone 的 IP 文本。
pub fn parse_ip_addr(text: &str) -> Result<(Ip, Option<&str>), AddrError> {
    if text.contains(':') {
        parse_ipv6_addr(text).map(|(bytes, zone)| (Ip::V6(bytes), zone))
    } else {
        parse_ipv4_addr(text).map(|bytes| (Ip::V4(bytes), None))
    }
}

/// 将 4 字节序列格式化为点分十进制。
pub fn stringify_ipv4(bytes: &[u8]) -> Result<String, AddrError> {
    let octets: [u8; IPV4_LEN] = bytes
        .try_into()
        .map_err(|_| byte_length_error("IPv4 byte length", bytes))?;
    Ok(format_ipv4(&octets))
}

/// 将 16 字节序列格式化为规范压缩的 IPv6 文本。
pub fn stringify_ipv6(bytes: &[u8]) -> Result<String, AddrError> {
    let octets: [u8; IPV6_LEN] = bytes
        .try_into()
        .map_err(|_| byte_length_error("IPv6 byte length", bytes))?;
    Ok(format_ipv6(&octets))
}

/// 按字节长度选择地址族进行格式化。
pub fn stringify_ip(bytes: &[u8]) -> Result<String, AddrError> {
    match bytes.len() {
        IPV4_LEN => stringify_ipv4(bytes),
        IPV6_LEN => stringify_ipv6(bytes),
        _ => Err(byte_length_error("IP byte length", bytes)),
    }
}

/// 格式化 IPv6 地址并附加可选的 zone。
pub fn stringify_ipv6_addr(bytes: &[u8], zone: Option<&str>) -> Result<String, AddrError> {
    let ip = stringify_ipv6(bytes)?;
    match zone {
        None => Ok(ip),
        Some(zone) if validate_zone_name(zone) => Ok(format!("{ip}%{zone}")),
        Some(zone) => Err(AddrError::format("zone name", zone)),
    }
}

/// 按字节长度格式化逻辑地址；IPv4 携带 zone 视为格式错误。
pub fn stringify_ip_addr(bytes: &[u8], zone: Option<&str>) -> Result<String, AddrError> {
    match (bytes.len(), zone) {
        (IPV4_LEN, None) => stringify_ipv4(bytes),
        (IPV4_LEN, Some(zone)) => Err(AddrError::format("IPv4 zone", zone)),
        (IPV6_LEN, zone) => stringify_ipv6_addr(bytes, zone),
        _ => Err(byte_length_error("IP byte length", bytes)),
    }
}

/// 在首个 `%` 处拆分地址与 zone。
pub(crate) fn split_zone(text: &str) -> (&str, Option<&str>) {
    match text.split_once('%') {
        Some((ip, zone)) => (ip, Some(zone)),
        None => (text, None),
    }
}

pub(crate) fn format_ipv4(octets: &[u8; IPV4_LEN]) -> String {
    let [a, b, c, d] = *octets;
    format!("{a}.{b}.{c}.{d}")
}

pub(crate) fn format_ipv6(octets: &[u8; IPV6_LEN]) -> String {
    let groups: [u16; IPV6_GROUPS] =
        core::array::from_fn(|i| u16::from_be_bytes([octets[2 * i], octets[2 * i + 1]]));
    match longest_zero_run(&groups) {
        Some((start, len)) => format!(
            "{}::{}",
            join_groups(&groups[..start]),
            join_groups(&groups[start + len..])
        ),
        None => join_groups(&groups),
    }
}

/// 严格解析十进制整数：只接受 `-?[0-9]+`，溢出时饱和到 `i64` 边界交由调用方做区间检查。
pub(crate) fn parse_decimal(what: &'static str, text: &str) -> Result<i64, AddrError> {
    let negative = text.starts_with('-');
    let digits = if negative { &text[1..] } else { text };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddrError::format(what, text));
    }
    Ok(text
        .parse::<i64>()
        .unwrap_or(if negative { i64::MIN } else { i64::MAX }))
}

fn byte_length_error(what: &'static str, bytes: &[u8]) -> AddrError {
    AddrError::format(what, format!("{} bytes", bytes.len()))
}

fn parse_ipv4_octets(text: &str) -> Option<[u8; IPV4_LEN]> {
    let mut octets = [0u8; IPV4_LEN];
    let mut parts = text.split('.');
    for slot in octets.iter_mut() {
        *slot = parse_octet(parts.next()?)?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(octets)
}

fn parse_octet(part: &str) -> Option<u8> {
    let bytes = part.as_bytes();
    if bytes.is_empty() || bytes.len() > 3 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    part.parse::<u16>().ok().and_then(|v| u8::try_from(v).ok())
}

fn parse_ipv6_octets(text: &str) -> Option<[u8; IPV6_LEN]> {
    let mut groups = [0u16; IPV6_GROUPS];
    match text.split_once("::") {
        None => {
            if parse_groups(text, &mut groups, true)? != IPV6_GROUPS {
                return None;
            }
        }
        Some((head, tail)) => {
            if tail.contains("::") {
                return None;
            }
            let mut head_groups = [0u16; IPV6_GROUPS];
            let mut tail_groups = [0u16; IPV6_GROUPS];
            let head_len = parse_groups(head, &mut head_groups, false)?;
            let tail_len = parse_groups(tail, &mut tail_groups, true)?;
            // `::` 至少代表一个零分组。
            if head_len + tail_len >= IPV6_GROUPS {
                return None;
            }
            groups[..head_len].copy_from_slice(&head_groups[..head_len]);
            groups[IPV6_GROUPS - tail_len..].copy_from_slice(&tail_groups[..tail_len]);
        }
    }

    let mut octets = [0u8; IPV6_LEN];
    for (chunk, group) in octets.chunks_exact_mut(2).zip(groups) {
        chunk.copy_from_slice(&group.to_be_bytes());
    }
    Some(octets)
}

/// 解析以 `:` 分隔的分组序列，返回写入的分组数；空串代表零个分组。
fn parse_groups(text: &str, out: &mut [u16; IPV6_GROUPS], allow_ipv4_tail: bool) -> Option<usize> {
    if text.is_empty() {
        return Some(0);
    }
    let mut len = 0;
    let mut pieces = text.split(':').peekable();
    while let Some(piece) = pieces.next() {
        let is_last = pieces.peek().is_none();
        if is_last && allow_ipv4_tail && piece.contains('.') {
            let [a, b, c, d] = parse_ipv4_octets(piece)?;
            if len + 2 > IPV6_GROUPS {
                return None;
            }
            out[len] = u16::from_be_bytes([a, b]);
            out[len + 1] = u16::from_be_bytes([c, d]);
            len += 2;
            continue;
        }
        if len == IPV6_GROUPS {
            return None;
        }
        out[len] = parse_hextet(piece)?;
        len += 1;
    }
    Some(len)
}

fn parse_hextet(piece: &str) -> Option<u16> {
    if piece.is_empty() || piece.len() > 4 || !piece.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(piece, 16).ok()
}

fn longest_zero_run(groups: &[u16; IPV6_GROUPS]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut current: Option<(usize, usize)> = None;
    for (idx, &group) in groups.iter().enumerate() {
        if group != 0 {
            current = None;
            continue;
        }
        let run = current.map_or((idx, 1), |(start, len)| (start, len + 1));
        current = Some(run);
        if best.is_none_or(|(_, best_len)| run.1 > best_len) {
            best = Some(run);
        }
    }
    best
}

fn join_groups(groups: &[u16]) -> String {
    groups
        .iter()
        .map(|group| format!("{group:x}"))
        .collect::<Vec<_>>()
        .join(":")
}
