#![deny(unsafe_code)]
#![doc = r#"
# spark-netaddr

## 设计动机（Why）
- **定位**：提供 Spark 网络层的类型化地址模型：IPv4/IPv6 文本与字节之间的
  转换、带 zone 的逻辑地址、前缀网络、四层端点以及 `host:port` 文本对。
- **架构角色**：位于 `spark-dial` 之下，既不依赖运行时也不执行任何 IO，
  拨号、监听与解析器均以本 crate 的值类型交换地址。

## 核心契约（What）
- 所有值类型在构造时一次性完成校验，构造成功后不可变；
- 失败只会以 [`AddrError::Format`] 或 [`AddrError::Range`] 两种形式出现；
- IPv6 文本输出遵循规范压缩形式：小写、去前导零、最长零段（并列取首段）压缩为 `::`。

## 实现策略（How）
- [`codec`] 负责逐字符解析与格式化，不依赖正则；
- [`Ip`]、[`IpAddr`]、[`IpNet`]、[`L4Addr`] 在其上构建不可变值；
- [`netloc`] 只处理文本切分，与 IP 语义解耦，主机名可原样透传。
"#]

mod addr;
pub mod codec;
mod error;
mod ip;
mod l4;
mod net;
pub mod netloc;
mod scope;

pub use addr::{IpAddr, NetAddr};
pub use error::AddrError;
pub use ip::Ip;
pub use l4::{L4Addr, L4Protocol, parse_port, validate_port};
pub use net::IpNet;
pub use netloc::{IntoNetLoc, NetLoc, as_net_loc};
pub use scope::Scope;

/// 便于调用方一次性引入常用类型。
pub mod prelude {
    pub use crate::{
        AddrError, Ip, IpAddr, IpNet, IntoNetLoc, L4Addr, L4Protocol, NetAddr, NetLoc, Scope,
    };
}
