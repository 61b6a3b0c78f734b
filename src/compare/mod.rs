//! # 图像对比子系统（compare）
//!
//! ## 设计思路
//!
//! 该模块将“来源加载 → 解码校验 → 对齐变换 → 模式分析 → 结果发布”
//! 按职责拆分为多个子模块，避免单文件膨胀与耦合。
//!
//! - `service`：承载可注入状态与过期结果防护（`CompareServiceState`）
//! - `handler`：编排整条处理流水线
//! - `loader`：负责 URL/Base64/文件/字节加载与安全校验
//! - `pipeline`：负责解码、像素限制、重采样落位
//! - `alignment`：contain-fit + 居中对齐变换与覆盖区域
//! - `wipe`：擦除对比几何（纯渲染，无像素分析）
//! - `crop`：覆盖区之外的缺失区域检测
//! - `intensity`：分块强度热力分析
//! - `differential`：全分辨率逐像素差分
//! - `config/error/source`：配置、错误、数据模型
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! 宿主应用（模式选择 + 指针事件）
//!    ↓
//! service.rs（代号防护、服务入口）
//!    ↓
//! handler.rs（统一编排 + 阶段耗时日志）
//!    ├─ loader.rs（并发加载两张图 + 体积/签名校验）
//!    ├─ pipeline.rs（解码 + 像素限制 + 重采样落位）
//!    ├─ alignment.rs（对齐变换 + 覆盖区域）
//!    └─ wipe / crop / intensity / differential（按模式三选一）
//!    ↓
//! CompareOutcome（带标签的单一分析产物）
//! ```
//!
//! ## 分层职责建议
//!
//! - 配置与策略变更优先改 `config.rs`
//! - 业务流程顺序变更优先改 `handler.rs`
//! - 单阶段行为优化分别改 `loader/pipeline` 与各分析子模块
//! - 前端“旧结果闪回”问题优先看 `service.rs` 的代号逻辑

mod alignment;
mod config;
mod crop;
mod differential;
mod error;
mod handler;
mod intensity;
mod loader;
mod pipeline;
mod service;
mod source;
mod wipe;

pub use alignment::{AlignmentTransform, Rect};
pub use config::{CompareConfig, ComparePerformanceProfile};
pub use crop::{detect as detect_crop_regions, CropReport, MISSING_AREA_LABEL};
pub use differential::PixelDeltaBuffer;
pub use error::CompareError;
pub use handler::{AnalysisMode, AnalysisOutput, CompareHandler, CompareOutcome};
pub use intensity::{DiffBlock, SEVERITY_PALETTE};
pub use service::CompareServiceState;
pub use source::{format_byte_size, FrameBuffer, ImageDescriptor, ImageSource};
pub use wipe::{WipeLayout, WipeState, INITIAL_POSITION};
