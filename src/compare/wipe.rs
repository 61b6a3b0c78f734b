//! # 擦除对比模块
//!
//! ## 设计思路
//!
//! 擦除对比是纯几何渲染：原图铺满自身坐标系，编辑图按对齐变换落位，
//! 再用一条可拖动的竖线裁剪编辑图层。本模块不做任何像素分析，
//! 只产出百分比几何与裁剪指令，具体绘制交给前端。
//!
//! ## 实现思路
//!
//! - `WipeState` 只持有一个标量位置，新图像对载入时复位到 50。
//! - 指针坐标换算成容器内百分比并夹取到 `[0, 100]`，
//!   容器宽度非法时保持原位置，避免产生 NaN。
//! - `WipeLayout` 把变换换算成百分比定位，使编辑图精确落在
//!   原图坐标框内，杜绝切换瞬间的“跳动”。

use super::alignment::AlignmentTransform;
use super::source::ImageDescriptor;

/// 新图像对载入时的初始分割位置（%）。
pub const INITIAL_POSITION: f64 = 50.0;

/// 擦除分割线状态。
///
/// 唯一的持久量是当前分割位置百分比。
#[derive(Debug, Clone, Copy)]
pub struct WipeState {
    position: f64,
}

impl Default for WipeState {
    fn default() -> Self {
        Self::new()
    }
}

impl WipeState {
    pub fn new() -> Self {
        Self {
            position: INITIAL_POSITION,
        }
    }

    /// 当前分割位置（%）。
    pub fn position(&self) -> f64 {
        self.position
    }

    /// 图像对切换时复位。
    pub fn reset(&mut self) {
        self.position = INITIAL_POSITION;
    }

    /// 依据指针移动事件更新位置。
    ///
    /// 指针允许落在容器之外，结果始终夹取到 `[0, 100]`。
    pub fn update_from_pointer(
        &mut self,
        pointer_x: f64,
        container_left: f64,
        container_width: f64,
    ) -> f64 {
        if container_width > 0.0 && container_width.is_finite() {
            let ratio = (pointer_x - container_left) / container_width;
            self.position = (ratio * 100.0).clamp(0.0, 100.0);
        }
        self.position
    }
}

/// 擦除视图的图层几何（均为相对原图帧的百分比）。
///
/// 编辑图层需先按本矩形定位，再按 `clip_right_percent` 从右侧内缩裁剪。
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct WipeLayout {
    /// 编辑图层左边界（%）。
    pub left_percent: f64,
    /// 编辑图层上边界（%）。
    pub top_percent: f64,
    /// 编辑图层宽度（%）。
    pub width_percent: f64,
    /// 编辑图层高度（%）。
    pub height_percent: f64,
}

impl WipeLayout {
    /// 将对齐变换换算为百分比图层定位。
    pub fn resolve(
        original: ImageDescriptor,
        edited: ImageDescriptor,
        transform: &AlignmentTransform,
    ) -> Self {
        let ow = original.width as f64;
        let oh = original.height as f64;
        let (disp_w, disp_h) = transform.footprint(edited);

        Self {
            left_percent: transform.offset_x / ow * 100.0,
            top_percent: transform.offset_y / oh * 100.0,
            width_percent: disp_w / ow * 100.0,
            height_percent: disp_h / oh * 100.0,
        }
    }

    /// 编辑图层右侧内缩裁剪量（%），等价于 `inset(0 {x}% 0 0)`。
    pub fn clip_right_percent(position: f64) -> f64 {
        (100.0 - position).clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn pointer_far_outside_container_is_clamped() {
        let mut state = WipeState::new();

        assert_eq!(state.update_from_pointer(-5000.0, 100.0, 800.0), 0.0);
        assert_eq!(state.update_from_pointer(99999.0, 100.0, 800.0), 100.0);
    }

    #[test]
    fn degenerate_container_keeps_previous_position() {
        let mut state = WipeState::new();
        state.update_from_pointer(300.0, 100.0, 800.0);
        let before = state.position();

        assert_eq!(state.update_from_pointer(500.0, 100.0, 0.0), before);
        assert_eq!(state.update_from_pointer(500.0, 100.0, f64::NAN), before);
    }

    #[test]
    fn reset_returns_to_center() {
        let mut state = WipeState::new();
        state.update_from_pointer(120.0, 100.0, 800.0);
        state.reset();

        assert_eq!(state.position(), INITIAL_POSITION);
    }

    #[test]
    fn layout_matches_centered_footprint() {
        let original = ImageDescriptor::new(1000, 1000);
        let edited = ImageDescriptor::new(1000, 500);
        let transform = AlignmentTransform::resolve(original, edited);
        let layout = WipeLayout::resolve(original, edited, &transform);

        assert_eq!(layout.left_percent, 0.0);
        assert_eq!(layout.top_percent, 25.0);
        assert_eq!(layout.width_percent, 100.0);
        assert_eq!(layout.height_percent, 50.0);
    }

    #[test]
    fn identical_pair_layout_fills_frame() {
        let desc = ImageDescriptor::new(640, 480);
        let transform = AlignmentTransform::resolve(desc, desc);
        let layout = WipeLayout::resolve(desc, desc, &transform);

        assert_eq!(layout.left_percent, 0.0);
        assert_eq!(layout.top_percent, 0.0);
        assert_eq!(layout.width_percent, 100.0);
        assert_eq!(layout.height_percent, 100.0);
    }

    proptest! {
        /// 任意指针/容器组合下位置都保持在 [0, 100]。
        #[test]
        fn position_always_within_range(
            pointer_x in -1e7f64..1e7,
            container_left in -1e5f64..1e5,
            container_width in -1e4f64..1e4,
        ) {
            let mut state = WipeState::new();
            let position = state.update_from_pointer(pointer_x, container_left, container_width);

            prop_assert!((0.0..=100.0).contains(&position));
        }
    }
}
