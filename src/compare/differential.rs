//! # 逐像素差分模块
//!
//! ## 设计思路
//!
//! 差分图用于精确目视检查，因此始终以原图全分辨率计算，
//! 不做任何降采样。覆盖区内输出各通道绝对差，覆盖区外保持
//! 全透明，让下层的裁切高亮透出来。
//!
//! ## 实现思路
//!
//! - 覆盖区内：`(|ΔR|, |ΔG|, |ΔB|, 255)`。
//! - 覆盖区外：alpha = 0。
//! - 两张完全相同的图得到整帧纯黑且完全不透明的结果。

use super::alignment::{overlap_pixel_bounds, Rect};
use super::source::FrameBuffer;

/// 逐像素差分输出，尺寸与原图完全一致。
#[derive(Debug, serde::Serialize)]
pub struct PixelDeltaBuffer {
    pub width: u32,
    pub height: u32,
    /// RGBA 字节数组（`width * height * 4`）。
    pub bytes: Vec<u8>,
}

/// 计算覆盖区内的全分辨率通道差分图。
///
/// 两个帧必须与原图同尺寸，编辑图帧已按对齐变换重采样落位。
pub(crate) fn compute(
    original: &FrameBuffer,
    edited: &FrameBuffer,
    overlap: &Rect,
) -> PixelDeltaBuffer {
    debug_assert_eq!(original.width, edited.width);
    debug_assert_eq!(original.height, edited.height);

    let width = original.width;
    let height = original.height;
    let mut bytes = vec![0u8; width as usize * height as usize * 4];

    let (x0, y0, x1, y1) = overlap_pixel_bounds(overlap, width, height, 1.0);

    for y in y0..y1 {
        let row = y as usize * width as usize;
        for x in x0..x1 {
            let a = original.pixel(x, y);
            let b = edited.pixel(x, y);

            let idx = (row + x as usize) * 4;
            bytes[idx] = a[0].abs_diff(b[0]);
            bytes[idx + 1] = a[1].abs_diff(b[1]);
            bytes[idx + 2] = a[2].abs_diff(b[2]);
            bytes[idx + 3] = 255;
        }
    }

    PixelDeltaBuffer {
        width,
        height,
        bytes,
    }
}
