//! # 图像对比与差异可视化引擎 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │              宿主应用（上传 / 生成 / 预览导航）             │
//! │                                                          │
//! │  模式选择器 ── 指针事件 ── 结果渲染层                      │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ Result<T, AppError>
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            引擎 (Rust)                            │
//! │                                                          │
//! │  ┌─ error ───── AppError (统一错误类型)                    │
//! │  │                                                       │
//! │  └─ compare ─── 对齐·擦除·裁切·强度·差分                   │
//! │      ├─ service     代号防护 + 结果槽                      │
//! │      ├─ handler     并发加载汇合 + 阻塞池分析               │
//! │      ├─ loader      URL/Base64/文件/字节 + 安全校验        │
//! │      ├─ pipeline    解码 + 像素限制 + 重采样落位            │
//! │      └─ alignment / wipe / crop / intensity / differential│
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，应用边界的返回类型 |
//! | [`compare`] | 原图/编辑图的对齐、擦除对比、裁切检测、强度热力与逐像素差分 |

pub mod compare;
pub mod error;
