//! # 数据源与中间模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“流水线中间结果”解耦：
//! - `ImageSource` 表示外部来源语义
//! - `RawImageBytes` 表示已加载但未解码的字节
//! - `ImageDescriptor` 表示解码器报告的逻辑像素尺寸
//! - `FrameBuffer` 表示已采样进原图坐标系的 RGBA 数据

use super::CompareError;

/// 图片输入来源。
pub enum ImageSource {
    /// 网络地址来源。
    Url(String),
    /// Base64（支持 Data URL 与纯 Base64 字符串）。
    Base64(String),
    /// 本地文件路径来源。
    FilePath(String),
    /// 调用方已持有的原始字节（例如前端上传内容）。
    Bytes(Vec<u8>),
}

/// 加载阶段输出：原始字节与来源标识。
pub(crate) struct RawImageBytes {
    /// 原始图片字节。
    pub(crate) bytes: Vec<u8>,
    /// 来源提示（用于日志与诊断）。
    pub(crate) source_hint: &'static str,
}

/// 图像逻辑尺寸（像素）。
///
/// 一经创建不可变；所有对齐与区域计算都以它为输入。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ImageDescriptor {
    pub width: u32,
    pub height: u32,
}

impl ImageDescriptor {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 校验尺寸合法性。
    ///
    /// 宽或高为 0 属于配置性错误，必须在对齐计算之前拒绝，不做静默兜底。
    pub fn validate(&self) -> Result<(), CompareError> {
        if self.width == 0 || self.height == 0 {
            return Err(CompareError::InvalidMetadata(format!(
                "图像尺寸非法：{}x{}（宽高均不能为 0）",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// 解码阶段输出：RGBA 像素与解码器报告的尺寸。
pub(crate) struct DecodedImage {
    pub(crate) descriptor: ImageDescriptor,
    pub(crate) pixels: image::RgbaImage,
}

/// 原图坐标系下的 RGBA 像素帧。
///
/// 原图帧与编辑图帧在分析阶段必须具有相同尺寸，
/// 编辑图内容已按对齐变换落位，覆盖区外为全透明。
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    /// RGBA 字节数组（`width * height * 4`）。
    pub bytes: Vec<u8>,
}

impl FrameBuffer {
    /// 创建全透明帧。
    pub(crate) fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bytes: vec![0u8; width as usize * height as usize * 4],
        }
    }

    /// 读取单个像素（调用方保证坐标在界内）。
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.bytes[idx],
            self.bytes[idx + 1],
            self.bytes[idx + 2],
            self.bytes[idx + 3],
        ]
    }
}

/// 将字节数转换为人类可读文本（1024 进制，保留两位小数）。
///
/// 供前端展示图像元数据，如 `2.35 MB`。
pub fn format_byte_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let exp = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exp as i32);

    // 整数值不显示小数尾巴，与前端历史展示保持一致。
    let rounded = (value * 100.0).round() / 100.0;
    if (rounded - rounded.trunc()).abs() < f64::EPSILON {
        format!("{} {}", rounded.trunc() as u64, UNITS[exp])
    } else {
        format!("{} {}", rounded, UNITS[exp])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_rejects_zero_dimensions() {
        assert!(ImageDescriptor::new(0, 100).validate().is_err());
        assert!(ImageDescriptor::new(100, 0).validate().is_err());
        assert!(ImageDescriptor::new(1, 1).validate().is_ok());
    }

    #[test]
    fn format_byte_size_uses_1024_units() {
        assert_eq!(format_byte_size(0), "0 Bytes");
        assert_eq!(format_byte_size(512), "512 Bytes");
        assert_eq!(format_byte_size(1024), "1 KB");
        assert_eq!(format_byte_size(1536), "1.5 KB");
        assert_eq!(format_byte_size(2 * 1024 * 1024), "2 MB");
    }

    #[test]
    fn frame_buffer_pixel_roundtrip() {
        let mut frame = FrameBuffer::transparent(2, 2);
        frame.bytes[4..8].copy_from_slice(&[10, 20, 30, 255]);

        assert_eq!(frame.pixel(0, 0), [0, 0, 0, 0]);
        assert_eq!(frame.pixel(1, 0), [10, 20, 30, 255]);
    }
}
