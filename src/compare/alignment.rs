//! # 对齐变换模块
//!
//! ## 设计思路
//!
//! 所有分析模式共享同一个几何事实：编辑图内容以 contain-fit 方式
//! 等比缩放后居中放入原图坐标系。本模块只负责从两张图的尺寸推导
//! 这个变换与覆盖区域，不触碰任何像素。
//!
//! ## 实现思路
//!
//! - `scale = min(ow/ew, oh/eh)`，保证落位后不超出原图任一边。
//! - 落位矩形居中；尺寸完全相同时必须精确得到
//!   `scale = 1, offset = (0, 0)`，否则擦除对比会出现可见抖动。
//! - 旋转与非等比缩放明确不支持，变换类型本身没有对应字段。

use super::source::ImageDescriptor;

/// 原图坐标系下的轴对齐矩形。
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub(crate) fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// 编辑图原生像素空间 → 原图像素空间的映射。
///
/// `original_x = offset_x + edited_x * scale`（y 同理）。
/// 每个图像对只推导一次，之后视为不可变。
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct AlignmentTransform {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

impl AlignmentTransform {
    /// 由两张图的尺寸推导 contain-fit + 居中变换。
    ///
    /// 前置条件：两侧尺寸均已通过 [`ImageDescriptor::validate`]，
    /// 本函数不再处理 0 宽高。编辑图大于原图时按比例缩小，offset 恒非负。
    pub fn resolve(original: ImageDescriptor, edited: ImageDescriptor) -> Self {
        let scale = (original.width as f64 / edited.width as f64)
            .min(original.height as f64 / edited.height as f64);

        let disp_w = edited.width as f64 * scale;
        let disp_h = edited.height as f64 * scale;

        Self {
            offset_x: (original.width as f64 - disp_w) / 2.0,
            offset_y: (original.height as f64 - disp_h) / 2.0,
            scale,
        }
    }

    /// 编辑图落位后的足迹尺寸（原图坐标系）。
    pub fn footprint(&self, edited: ImageDescriptor) -> (f64, f64) {
        (
            edited.width as f64 * self.scale,
            edited.height as f64 * self.scale,
        )
    }

    /// 计算覆盖区域：落位足迹裁剪到原图边界内。
    pub fn overlap_region(&self, original: ImageDescriptor, edited: ImageDescriptor) -> Rect {
        let (disp_w, disp_h) = self.footprint(edited);

        let x0 = self.offset_x.max(0.0);
        let y0 = self.offset_y.max(0.0);
        let x1 = (self.offset_x + disp_w).min(original.width as f64);
        let y1 = (self.offset_y + disp_h).min(original.height as f64);

        Rect::new(x0, y0, (x1 - x0).max(0.0), (y1 - y0).max(0.0))
    }
}

/// 覆盖区域在帧内的整数像素范围（半开区间）。
///
/// 采样帧可能是缩小后的分辨率，调用方传入采样比例即可获得
/// 对应帧坐标系下的遍历边界。
pub(crate) fn overlap_pixel_bounds(
    overlap: &Rect,
    frame_width: u32,
    frame_height: u32,
    sampling_scale: f64,
) -> (u32, u32, u32, u32) {
    let x0 = (overlap.x * sampling_scale).floor().max(0.0) as u32;
    let y0 = (overlap.y * sampling_scale).floor().max(0.0) as u32;
    let x1 = ((overlap.x + overlap.width) * sampling_scale)
        .ceil()
        .min(frame_width as f64) as u32;
    let y1 = ((overlap.y + overlap.height) * sampling_scale)
        .ceil()
        .min(frame_height as f64) as u32;

    (x0, y0, x1.max(x0), y1.max(y0))
}
