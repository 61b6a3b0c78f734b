//! # 解码与帧提取模块
//!
//! ## 设计思路
//!
//! 将“字节 → 图像 → 原图坐标系 RGBA 帧”的过程集中管理，并在关键节点
//! 增加资源上限控制。优先做尺寸检查，再进行完整解码，降低恶意输入
//! 触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 猜测格式并读取 header 尺寸
//! 2. 按像素上限快速拒绝
//! 3. 完整解码并转换 RGBA，校验字节长度一致性
//! 4. 按对齐变换把编辑图重采样落位进原图帧，覆盖区外保持全透明
//! 5. 重采样优先走 `fast_image_resize`，失败时回退 `image::imageops`

use fast_image_resize as fr;
use image::{ImageBuffer, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;

use super::alignment::AlignmentTransform;
use super::source::{DecodedImage, FrameBuffer, ImageDescriptor, RawImageBytes};
use super::{CompareConfig, CompareError, CompareHandler};

impl CompareHandler {
    /// 将原始字节解码为 RGBA 图像。
    pub(crate) fn decode_image(
        raw: RawImageBytes,
        config: &CompareConfig,
    ) -> Result<DecodedImage, CompareError> {
        let (header_width, header_height) = Self::inspect_dimensions_from_memory(&raw.bytes)?;
        Self::validate_pixel_limits(config, header_width, header_height)?;
        Self::validate_decoded_memory_limits(config, header_width, header_height)?;

        let decoded = image::load_from_memory(&raw.bytes)
            .map_err(|e| CompareError::Decode(format!("图片解码失败：{}", e)))?;

        let descriptor = ImageDescriptor::new(decoded.width(), decoded.height());
        Self::validate_pixel_limits(config, descriptor.width, descriptor.height)?;
        Self::validate_decoded_memory_limits(config, descriptor.width, descriptor.height)?;
        descriptor.validate()?;

        let pixels = decoded.to_rgba8();

        let expected_len = (descriptor.width as usize)
            .checked_mul(descriptor.height as usize)
            .and_then(|count| count.checked_mul(4))
            .ok_or_else(|| CompareError::ResourceLimit("图片尺寸导致内存溢出风险".to_string()))?;

        if pixels.as_raw().len() != expected_len {
            return Err(CompareError::Decode("解码后像素数据长度异常".to_string()));
        }

        log::info!(
            "✅ 图片解码成功 - 来源: {} 尺寸: {}x{}",
            raw.source_hint,
            descriptor.width,
            descriptor.height
        );

        Ok(DecodedImage { descriptor, pixels })
    }

    /// 仅通过内存中的图片头信息读取宽高。
    ///
    /// 用于在完整解码前做像素限制检查。
    fn inspect_dimensions_from_memory(bytes: &[u8]) -> Result<(u32, u32), CompareError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CompareError::InvalidFormat(format!("无法识别图片格式：{}", e)))?;

        reader
            .into_dimensions()
            .map_err(|e| CompareError::InvalidFormat(format!("无法读取图片尺寸：{}", e)))
    }

    /// 校验像素数量是否超过配置上限。
    fn validate_pixel_limits(
        config: &CompareConfig,
        width: u32,
        height: u32,
    ) -> Result<(), CompareError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| CompareError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > config.max_decoded_pixels {
            return Err(CompareError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, config.max_decoded_pixels
            )));
        }

        Ok(())
    }

    fn validate_decoded_memory_limits(
        config: &CompareConfig,
        width: u32,
        height: u32,
    ) -> Result<(), CompareError> {
        let estimated = (width as u64)
            .checked_mul(height as u64)
            .and_then(|pixels| pixels.checked_mul(4))
            .ok_or_else(|| CompareError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

        if estimated > config.max_decoded_bytes {
            return Err(CompareError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                config.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }

    /// 提取原图帧，可按比例降采样。
    ///
    /// `sampling_scale = 1.0` 时直接复用解码结果，保证逐字节一致。
    pub(crate) fn extract_frame(
        decoded: &DecodedImage,
        sampling_scale: f64,
        filter: image::imageops::FilterType,
    ) -> Result<FrameBuffer, CompareError> {
        let (width, height) = Self::sampled_dimensions(decoded.descriptor, sampling_scale);

        if width == decoded.descriptor.width && height == decoded.descriptor.height {
            return Ok(FrameBuffer {
                width,
                height,
                bytes: decoded.pixels.as_raw().clone(),
            });
        }

        let resized = Self::resize_rgba(&decoded.pixels, width, height, filter)?;
        Ok(FrameBuffer {
            width,
            height,
            bytes: resized.into_raw(),
        })
    }

    /// 按对齐变换把编辑图重采样并落位进原图帧。
    ///
    /// 输出帧与（采样后的）原图帧同尺寸，落位足迹之外全透明。
    pub(crate) fn project_into_frame(
        decoded: &DecodedImage,
        original: ImageDescriptor,
        transform: &AlignmentTransform,
        sampling_scale: f64,
        filter: image::imageops::FilterType,
    ) -> Result<FrameBuffer, CompareError> {
        let (frame_width, frame_height) = Self::sampled_dimensions(original, sampling_scale);

        let (disp_w, disp_h) = transform.footprint(decoded.descriptor);
        let target_width = ((disp_w * sampling_scale).round() as u32).max(1);
        let target_height = ((disp_h * sampling_scale).round() as u32).max(1);

        // 同尺寸直接复用像素，保证未缩放场景逐字节一致。
        let placed: RgbaImage = if target_width == decoded.descriptor.width
            && target_height == decoded.descriptor.height
        {
            decoded.pixels.clone()
        } else {
            Self::resize_rgba(&decoded.pixels, target_width, target_height, filter)?
        };

        let mut frame = FrameBuffer::transparent(frame_width, frame_height);
        let dest_x = (transform.offset_x * sampling_scale).round() as i64;
        let dest_y = (transform.offset_y * sampling_scale).round() as i64;

        for src_y in 0..target_height as i64 {
            let frame_y = dest_y + src_y;
            if frame_y < 0 || frame_y >= frame_height as i64 {
                continue;
            }

            for src_x in 0..target_width as i64 {
                let frame_x = dest_x + src_x;
                if frame_x < 0 || frame_x >= frame_width as i64 {
                    continue;
                }

                let src_idx = (src_y as usize * target_width as usize + src_x as usize) * 4;
                let dst_idx = (frame_y as usize * frame_width as usize + frame_x as usize) * 4;
                frame.bytes[dst_idx..dst_idx + 4]
                    .copy_from_slice(&placed.as_raw()[src_idx..src_idx + 4]);
            }
        }

        Ok(frame)
    }

    fn sampled_dimensions(descriptor: ImageDescriptor, sampling_scale: f64) -> (u32, u32) {
        if sampling_scale >= 1.0 {
            return (descriptor.width, descriptor.height);
        }

        (
            ((descriptor.width as f64 * sampling_scale).round() as u32).max(1),
            ((descriptor.height as f64 * sampling_scale).round() as u32).max(1),
        )
    }

    fn resize_rgba(
        src: &RgbaImage,
        target_width: u32,
        target_height: u32,
        filter: image::imageops::FilterType,
    ) -> Result<RgbaImage, CompareError> {
        match Self::resize_with_fast_image_resize(src, target_width, target_height, filter) {
            Ok(resized) => Ok(resized),
            Err(err) => {
                log::warn!("⚠️ fast_image_resize 重采样失败，回退 image::imageops：{}", err);
                Ok(image::imageops::resize(src, target_width, target_height, filter))
            }
        }
    }

    fn resize_with_fast_image_resize(
        src: &RgbaImage,
        target_width: u32,
        target_height: u32,
        filter: image::imageops::FilterType,
    ) -> Result<RgbaImage, CompareError> {
        let (src_width, src_height) = src.dimensions();

        let src_image = fr::images::Image::from_vec_u8(
            src_width,
            src_height,
            src.as_raw().clone(),
            fr::PixelType::U8x4,
        )
        .map_err(|e| CompareError::Decode(format!("构建源图像缓冲失败：{}", e)))?;

        let mut dst_image = fr::images::Image::new(target_width, target_height, fr::PixelType::U8x4);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(
            Self::to_fast_filter(filter),
        ));

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| CompareError::Decode(format!("fast_image_resize 执行失败：{}", e)))?;

        ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(
            target_width,
            target_height,
            dst_image.into_vec(),
        )
        .ok_or_else(|| CompareError::Decode("fast_image_resize 输出缓冲长度异常".to_string()))
    }

    fn to_fast_filter(filter: image::imageops::FilterType) -> fr::FilterType {
        match filter {
            image::imageops::FilterType::Nearest => fr::FilterType::Box,
            image::imageops::FilterType::Triangle => fr::FilterType::Bilinear,
            image::imageops::FilterType::CatmullRom => fr::FilterType::CatmullRom,
            image::imageops::FilterType::Gaussian => fr::FilterType::Mitchell,
            image::imageops::FilterType::Lanczos3 => fr::FilterType::Lanczos3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat};

    fn encode_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgba(rgba));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    #[test]
    fn decode_reports_descriptor_and_rgba_length() {
        let config = CompareConfig::default();
        let raw = RawImageBytes {
            bytes: encode_png(20, 10, [1, 2, 3, 255]),
            source_hint: "test",
        };

        let decoded = CompareHandler::decode_image(raw, &config).expect("decode should succeed");
        assert_eq!(decoded.descriptor, ImageDescriptor::new(20, 10));
        assert_eq!(decoded.pixels.as_raw().len(), 20 * 10 * 4);
    }

    #[test]
    fn decode_rejects_pixel_limit_violation() {
        let mut config = CompareConfig::default();
        config.max_decoded_pixels = 64;

        let raw = RawImageBytes {
            bytes: encode_png(32, 32, [0, 0, 0, 255]),
            source_hint: "test",
        };

        let result = CompareHandler::decode_image(raw, &config);
        assert!(matches!(result, Err(CompareError::ResourceLimit(_))));
    }

    #[test]
    fn decode_rejects_non_image_bytes() {
        let config = CompareConfig::default();
        let raw = RawImageBytes {
            bytes: b"definitely not an image".to_vec(),
            source_hint: "test",
        };

        let result = CompareHandler::decode_image(raw, &config);
        assert!(matches!(result, Err(CompareError::InvalidFormat(_))));
    }

    #[test]
    fn identical_pair_projection_is_byte_exact() {
        let config = CompareConfig::default();
        let raw = RawImageBytes {
            bytes: encode_png(24, 24, [120, 30, 60, 255]),
            source_hint: "test",
        };
        let decoded = CompareHandler::decode_image(raw, &config).expect("decode should succeed");

        let transform = AlignmentTransform::resolve(decoded.descriptor, decoded.descriptor);
        let frame = CompareHandler::project_into_frame(
            &decoded,
            decoded.descriptor,
            &transform,
            1.0,
            config.resize_filter,
        )
        .expect("projection should succeed");

        assert_eq!(frame.bytes, *decoded.pixels.as_raw());
    }

    #[test]
    fn letterboxed_projection_leaves_bands_transparent() {
        let config = CompareConfig::default();
        let raw = RawImageBytes {
            bytes: encode_png(100, 50, [200, 200, 200, 255]),
            source_hint: "test",
        };
        let decoded = CompareHandler::decode_image(raw, &config).expect("decode should succeed");

        let original = ImageDescriptor::new(100, 100);
        let transform = AlignmentTransform::resolve(original, decoded.descriptor);
        let frame = CompareHandler::project_into_frame(
            &decoded,
            original,
            &transform,
            1.0,
            config.resize_filter,
        )
        .expect("projection should succeed");

        // 上下各 25 像素条带应保持全透明，中间为编辑图内容。
        assert_eq!(frame.pixel(50, 0)[3], 0);
        assert_eq!(frame.pixel(50, 99)[3], 0);
        assert_eq!(frame.pixel(50, 50), [200, 200, 200, 255]);
    }

    #[test]
    fn sampled_extraction_halves_dimensions() {
        let config = CompareConfig::default();
        let raw = RawImageBytes {
            bytes: encode_png(64, 32, [10, 20, 30, 255]),
            source_hint: "test",
        };
        let decoded = CompareHandler::decode_image(raw, &config).expect("decode should succeed");

        let frame = CompareHandler::extract_frame(&decoded, 0.5, config.resize_filter)
            .expect("extraction should succeed");
        assert_eq!((frame.width, frame.height), (32, 16));
        assert_eq!(frame.bytes.len(), 32 * 16 * 4);
    }
}
