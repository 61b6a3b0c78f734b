//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `CompareConfig`，保证运行时行为可观测、可调整、可测试。
//! 其中性能档位（quality / balanced / speed）作为高层语义，映射到底层参数组合。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的平衡配置。
//! - `ComparePerformanceProfile` 负责档位字符串解析与反向输出。
//! - `apply_performance_profile` 将档位转换为具体阈值。
//! - `infer_performance_profile` 用于从当前配置反推档位（给前端展示状态）。

use image::imageops::FilterType;

use super::CompareError;

/// 图像对比配置。
///
/// 字段覆盖了加载、解码、重采样与三种分析模式的全部可调参数。
#[derive(Debug, Clone)]
pub struct CompareConfig {
    /// 下载/读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 网络下载总超时时间（秒）。
    pub download_timeout: u64,
    /// 建立连接（TCP/TLS）超时时间（秒）。
    pub connect_timeout: u64,
    /// 最大重定向次数，避免无限跳转或恶意链路。
    pub max_redirects: usize,
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 将编辑图重采样进原图坐标系时使用的滤镜。
    pub resize_filter: FilterType,
    /// 强度分析的分块边长（原图坐标系像素）。
    pub intensity_block_size: u32,
    /// 强度分析的逐像素差异阈值，低于等于该值的分块视为无变化。
    pub intensity_threshold: f64,
    /// 强度量化档位数量。
    pub severity_levels: u8,
    /// 强度量化满量程（档位带宽 = 满量程 / 档位数）。
    pub severity_full_scale: f64,
    /// 强度分析的采样比例，1.0 表示全分辨率。
    ///
    /// 仅为性能优化；降低采样不改变分块量化契约，结果仍以原图坐标报告。
    pub intensity_sampling_scale: f64,
    /// 几何比较使用的浮点容差。
    pub geometry_epsilon: f64,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            download_timeout: 30,
            connect_timeout: 8,
            max_redirects: 5,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            resize_filter: FilterType::Triangle,
            intensity_block_size: 16,
            intensity_threshold: 10.0,
            severity_levels: 5,
            severity_full_scale: 100.0,
            intensity_sampling_scale: 1.0,
            geometry_epsilon: 1e-6,
        }
    }
}

/// 对比性能档位（面向产品/用户语义）。
///
/// - `Quality`：尽量保真
/// - `Balanced`：质量与性能平衡
/// - `Speed`：优先分析速度
#[derive(Debug, Clone, Copy)]
pub enum ComparePerformanceProfile {
    Quality,
    Balanced,
    Speed,
}

impl ComparePerformanceProfile {
    /// 从外部字符串解析档位。
    pub(crate) fn from_str(profile: &str) -> Result<Self, CompareError> {
        match profile.trim().to_lowercase().as_str() {
            "quality" => Ok(Self::Quality),
            "balanced" => Ok(Self::Balanced),
            "speed" => Ok(Self::Speed),
            other => Err(CompareError::InvalidFormat(format!(
                "未知性能档位：{}（可选：quality / balanced / speed）",
                other
            ))),
        }
    }

    /// 将档位输出为稳定字符串，供前端展示与持久化。
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Quality => "quality",
            Self::Balanced => "balanced",
            Self::Speed => "speed",
        }
    }
}

impl CompareConfig {
    /// 基于当前参数反推性能档位。
    ///
    /// 用于“后端当前生效档位”查询场景。
    pub(crate) fn infer_performance_profile(&self) -> ComparePerformanceProfile {
        if self.intensity_sampling_scale >= 1.0
            && matches!(self.resize_filter, FilterType::CatmullRom)
        {
            return ComparePerformanceProfile::Quality;
        }

        if self.intensity_sampling_scale <= 0.5 || matches!(self.resize_filter, FilterType::Nearest)
        {
            return ComparePerformanceProfile::Speed;
        }

        ComparePerformanceProfile::Balanced
    }

    /// 应用指定性能档位到实际参数。
    ///
    /// 保持“档位语义稳定”，便于前端按档位切换而无需了解底层细节。
    pub(crate) fn apply_performance_profile(&mut self, profile: ComparePerformanceProfile) {
        match profile {
            ComparePerformanceProfile::Quality => {
                self.intensity_sampling_scale = 1.0;
                self.resize_filter = FilterType::CatmullRom;
            }
            ComparePerformanceProfile::Balanced => {
                self.intensity_sampling_scale = 1.0;
                self.resize_filter = FilterType::Triangle;
            }
            ComparePerformanceProfile::Speed => {
                self.intensity_sampling_scale = 0.5;
                self.resize_filter = FilterType::Nearest;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_parse_and_display_roundtrip() {
        for name in ["quality", "balanced", "speed"] {
            let profile =
                ComparePerformanceProfile::from_str(name).expect("profile should parse");
            assert_eq!(profile.as_str(), name);
        }

        assert!(ComparePerformanceProfile::from_str("ultra").is_err());
        assert!(ComparePerformanceProfile::from_str("").is_err());
    }

    #[test]
    fn apply_then_infer_is_stable() {
        let mut config = CompareConfig::default();

        config.apply_performance_profile(ComparePerformanceProfile::Quality);
        assert!(matches!(
            config.infer_performance_profile(),
            ComparePerformanceProfile::Quality
        ));

        config.apply_performance_profile(ComparePerformanceProfile::Speed);
        assert!(matches!(
            config.infer_performance_profile(),
            ComparePerformanceProfile::Speed
        ));

        config.apply_performance_profile(ComparePerformanceProfile::Balanced);
        assert!(matches!(
            config.infer_performance_profile(),
            ComparePerformanceProfile::Balanced
        ));
    }

    #[test]
    fn default_matches_documented_quantization() {
        let config = CompareConfig::default();
        assert_eq!(config.intensity_block_size, 16);
        assert_eq!(config.severity_levels, 5);
        // 满量程 100 / 5 档 = 每档带宽 20。
        assert!((config.severity_full_scale / config.severity_levels as f64 - 20.0).abs() < 1e-9);
    }
}
