//! # 裁切区域检测模块
//!
//! ## 设计思路
//!
//! 当编辑图的落位足迹没有铺满原图时，边缘出现“原图有、编辑图无”的
//! 区域。本模块仅依据尺寸与对齐变换输出覆盖区之外的条带矩形与
//! 覆盖区描边，供前端以半透明高亮 + 边框 + 提示文案渲染。
//!
//! ## 实现思路
//!
//! - 缺失判定：`offset_x > ε 或 offset_y > ε`。
//! - 条带最多四条（上/下/左/右），零面积条带直接省略；
//!   左右条带的纵向范围限定在覆盖区高度内，避免与上下条带重叠。
//! - 输出是建议性覆盖几何，不是图像内容；强度分析只处理覆盖区内
//!   的分块，两种可视化互补，同一片像素不会被重复标注。

use super::alignment::{AlignmentTransform, Rect};
use super::source::ImageDescriptor;

/// 前端渲染缺失区域时使用的提示文案。
pub const MISSING_AREA_LABEL: &str = "CROP AREA DETECTED";

/// 裁切检测结果。
#[derive(Debug, Clone, serde::Serialize)]
pub struct CropReport {
    /// 原图中是否存在未被编辑图覆盖的区域。
    pub has_missing_area: bool,
    /// 覆盖区之外的条带矩形（原图像素坐标，最多四条）。
    pub bands: Vec<Rect>,
    /// 覆盖区描边矩形，仅在存在缺失区域时给出。
    pub outline: Option<Rect>,
}

impl CropReport {
    /// 无缺失区域的空结果。
    fn full_coverage() -> Self {
        Self {
            has_missing_area: false,
            bands: Vec::new(),
            outline: None,
        }
    }
}

/// 比较落位足迹与原图帧，给出缺失区域几何。
pub fn detect(
    original: ImageDescriptor,
    edited: ImageDescriptor,
    transform: &AlignmentTransform,
    epsilon: f64,
) -> CropReport {
    let ow = original.width as f64;
    let oh = original.height as f64;
    let (disp_w, disp_h) = transform.footprint(edited);

    let offset_x = transform.offset_x.max(0.0);
    let offset_y = transform.offset_y.max(0.0);

    if offset_x <= epsilon && offset_y <= epsilon {
        return CropReport::full_coverage();
    }

    let overlap = transform.overlap_region(original, edited);
    let mut bands = Vec::with_capacity(4);

    // 上下条带横跨整个原图宽度。
    if offset_y > epsilon {
        bands.push(Rect::new(0.0, 0.0, ow, offset_y));
        bands.push(Rect::new(0.0, oh - offset_y, ow, offset_y));
    }

    // 左右条带只覆盖落位足迹的纵向范围。
    if offset_x > epsilon {
        bands.push(Rect::new(0.0, offset_y, offset_x, disp_h.min(oh)));
        bands.push(Rect::new(ow - offset_x, offset_y, offset_x, disp_h.min(oh)));
    }

    log::debug!(
        "✂️ 检测到缺失区域 - offset=({:.2}, {:.2}) footprint={:.0}x{:.0} bands={}",
        offset_x,
        offset_y,
        disp_w,
        disp_h,
        bands.len()
    );

    CropReport {
        has_missing_area: true,
        bands,
        outline: Some(overlap),
    }
}
