//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载对比链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。

/// 图像对比统一错误类型。
///
/// 该类型会在应用边界被上转为 `AppError`，最终透传给前端。
#[derive(Debug, thiserror::Error)]
pub enum CompareError {
    #[error("网络错误：{0}")]
    Network(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("格式错误：{0}")]
    InvalidFormat(String),

    #[error("元数据错误：{0}")]
    InvalidMetadata(String),

    #[error("文件错误：{0}")]
    FileSystem(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("已取消：{0}")]
    Cancelled(String),
}

impl CompareError {
    /// 稳定错误码，供前端按类别展示与统计。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "E_NETWORK",
            Self::Decode(_) => "E_DECODE",
            Self::InvalidFormat(_) => "E_INVALID_FORMAT",
            Self::InvalidMetadata(_) => "E_INVALID_METADATA",
            Self::FileSystem(_) => "E_FILESYSTEM",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::Cancelled(_) => "E_CANCELLED",
        }
    }

    /// 错误发生的流水线阶段标识。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::FileSystem(_) => "load",
            Self::Decode(_) | Self::InvalidFormat(_) | Self::ResourceLimit(_) => "decode",
            Self::InvalidMetadata(_) => "align",
            Self::Cancelled(_) => "analyze",
        }
    }
}

impl From<CompareError> for String {
    /// 兼容部分仍使用字符串错误的调用点。
    fn from(error: CompareError) -> Self {
        error.to_string()
    }
}
