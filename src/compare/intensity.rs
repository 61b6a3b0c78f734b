//! # 强度热力分析模块
//!
//! ## 设计思路
//!
//! 把覆盖区划分为定长分块，对每个分块取逐像素通道差的最大值并量化成
//! 少量有序档位。取 max 而非均值：分块内哪怕只有一条硬边缘，
//! 也必须在热力图上留下记号。
//!
//! ## 实现思路
//!
//! 1. 按采样比例把覆盖区换算到帧坐标，逐分块遍历。
//! 2. 像素差 `delta = (|ΔR| + |ΔG| + |ΔB|) / 3`，分块取 `max_delta`。
//! 3. `max_delta <= threshold` 的分块视为无变化，不产出结果。
//! 4. `level = min(levels - 1, floor(max_delta / full_scale * levels))`。
//! 5. 分块矩形换算回原图坐标并与覆盖区求交后输出。
//!
//! 覆盖区之外的分块从不参与分析，缺失区域由裁切检测单独标注，
//! 两者不会对同一片像素重复计数。

use super::alignment::{overlap_pixel_bounds, Rect};
use super::source::FrameBuffer;

/// 各档位的渲染颜色（RGBA），亮度随严重度单调加深。
///
/// 前端按分块填充该颜色，并以细描边勾勒分块边界提升可读性。
pub const SEVERITY_PALETTE: [[u8; 4]; 5] = [
    [165, 180, 252, 90],
    [129, 140, 248, 110],
    [99, 102, 241, 130],
    [79, 70, 229, 150],
    [55, 48, 163, 170],
];

/// 强度分析的单个结果分块。
///
/// 每轮分析全量重建，矩形以原图像素坐标给出。
#[derive(Debug, Clone, serde::Serialize)]
pub struct DiffBlock {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// 量化档位，`0..levels`，数值越大变化越剧烈。
    pub severity: u8,
}

/// 强度分析参数快照。
#[derive(Debug, Clone, Copy)]
pub(crate) struct IntensityOptions {
    pub(crate) block_size: u32,
    pub(crate) threshold: f64,
    pub(crate) levels: u8,
    pub(crate) full_scale: f64,
    pub(crate) sampling_scale: f64,
}

/// 对覆盖区执行分块强度分析。
///
/// 两个帧必须同尺寸且均已落位到（可能经过采样的）原图坐标系。
/// 返回的分块按行优先顺序排列。
pub(crate) fn analyze(
    original: &FrameBuffer,
    edited: &FrameBuffer,
    overlap: &Rect,
    opts: &IntensityOptions,
) -> Vec<DiffBlock> {
    debug_assert_eq!(original.width, edited.width);
    debug_assert_eq!(original.height, edited.height);

    let sampling = opts.sampling_scale;
    let (x0, y0, x1, y1) = overlap_pixel_bounds(overlap, original.width, original.height, sampling);

    // 分块边长定义在原图坐标系，这里换算到采样帧坐标。
    let block = ((opts.block_size as f64 * sampling).round() as u32).max(1);
    let mut blocks = Vec::new();

    let mut by = y0;
    while by < y1 {
        let tile_y1 = (by + block).min(y1);

        let mut bx = x0;
        while bx < x1 {
            let tile_x1 = (bx + block).min(x1);

            let mut max_delta = 0.0f64;
            for y in by..tile_y1 {
                for x in bx..tile_x1 {
                    let a = original.pixel(x, y);
                    let b = edited.pixel(x, y);

                    let delta = (a[0].abs_diff(b[0]) as f64
                        + a[1].abs_diff(b[1]) as f64
                        + a[2].abs_diff(b[2]) as f64)
                        / 3.0;
                    if delta > max_delta {
                        max_delta = delta;
                    }
                }
            }

            if max_delta > opts.threshold {
                let level = ((max_delta / opts.full_scale) * opts.levels as f64).floor();
                let severity = (level as u8).min(opts.levels - 1);

                blocks.push(DiffBlock {
                    x: (bx as f64 / sampling).clamp(overlap.x, overlap.x + overlap.width),
                    y: (by as f64 / sampling).clamp(overlap.y, overlap.y + overlap.height),
                    width: (tile_x1 - bx) as f64 / sampling,
                    height: (tile_y1 - by) as f64 / sampling,
                    severity,
                });
            }

            bx = tile_x1;
        }

        by = tile_y1;
    }

    blocks
}
