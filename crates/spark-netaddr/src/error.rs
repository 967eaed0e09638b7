use thiserror::Error;

/// 地址模型的错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：地址文本在进入网络栈之前就必须判定合法与否，统一为两类错误，
///   让调用方可以区分“文本写错了”和“数值越界了”。
/// - **契约 (What)**：
///   - `Format`：文本、字节长度或组合形态不合法；`what` 描述期望的形态，`input` 保存原始输入；
///   - `Range`：数值本身是整数但超出允许区间 `[min, max]`；
///   - 两类错误均为本地错误，重试没有意义。
/// - **设计权衡 (Trade-offs)**：`input` 以 `String` 保存，便于日志直接输出原文，代价是一次堆分配。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AddrError {
    /// 文本或字节形态不合法。
    #[error("invalid {what}: `{input}`")]
    Format { what: &'static str, input: String },

    /// 数值超出允许区间。
    #[error("{what} must be in range [{min}, {max}], got {value}")]
    Range {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
}

impl AddrError {
    pub(crate) fn format(what: &'static str, input: impl Into<String>) -> Self {
        Self::Format {
            what,
            input: input.into(),
        }
    }

    pub(crate) fn range(what: &'static str, value: i64, min: i64, max: i64) -> Self {
        Self::Range {
            what,
            value,
            min,
            max,
        }
    }

    /// 是否为格式错误。
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }

    /// 是否为越界错误。
    pub fn is_range(&self) -> bool {
        matches!(self, Self::Range { .. })
    }
}
