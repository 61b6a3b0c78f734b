//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `CompareHandler` 只负责流程编排与配置管理，不绑定任何 UI 框架。
//! 处理链路固定为：
//! 1. 读取配置快照
//! 2. 并发加载两张图的原始字节并在解码前汇合
//! 3. 在阻塞线程池上解码、对齐、执行当前模式的分析
//! 4. 返回带标签的单一分析结果
//!
//! ## 实现思路
//!
//! - 配置通过 `Arc<RwLock<CompareConfig>>` 支持运行时动态切档。
//! - 单次请求内使用“同一配置快照”，避免处理中途配置漂移。
//! - 像素级计算整体放进 `spawn_blocking`，不阻塞调用方执行器。
//! - 记录 `load/analyze/total` 阶段耗时，便于性能诊断。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use super::alignment::{AlignmentTransform, Rect};
use super::crop::{self, CropReport};
use super::differential::{self, PixelDeltaBuffer};
use super::intensity::{self, DiffBlock, IntensityOptions};
use super::source::{ImageDescriptor, ImageSource};
use super::wipe::{self, WipeLayout};
use super::{CompareConfig, CompareError, ComparePerformanceProfile};

/// 分析模式选择器，由调用方持有，同一时刻只有一个生效。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// 可拖动竖线的擦除对比，纯几何渲染。
    Wipe,
    /// 分块强度热力图。
    Intensity,
    /// 全分辨率逐像素差分。
    Differential,
}

/// 单一模式的分析产物。
///
/// 以带标签枚举承载“同一时刻恰好一个模式生效”的结构性约束，
/// 而不是一组可同时为真的布尔开关。
#[derive(Debug, serde::Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum AnalysisOutput {
    Wipe {
        layout: WipeLayout,
        /// 初始分割位置（%），新图像对载入时为 50。
        position: f64,
    },
    Intensity {
        crop: CropReport,
        blocks: Vec<DiffBlock>,
    },
    Differential {
        crop: CropReport,
        delta: PixelDeltaBuffer,
    },
}

/// 一次完整对比的输出。
#[derive(Debug, serde::Serialize)]
pub struct CompareOutcome {
    pub original: ImageDescriptor,
    pub edited: ImageDescriptor,
    pub transform: AlignmentTransform,
    pub overlap: Rect,
    pub output: AnalysisOutput,
}

/// URL 下载短 TTL 缓存条目。
pub(super) struct CachedDownload {
    pub(super) created_at: Instant,
    pub(super) bytes: Vec<u8>,
}

/// 图像对比处理器。
///
/// 封装配置状态与复用型 HTTP 客户端，并编排各子模块实现完整流程。
pub struct CompareHandler {
    pub(super) config: Arc<RwLock<CompareConfig>>,
    pub(super) http: reqwest::Client,
    pub(super) download_cache: Arc<Mutex<HashMap<String, CachedDownload>>>,
}

impl CompareHandler {
    /// 根据初始配置创建处理器。
    ///
    /// 这里同时构建复用型 HTTP 客户端，减少每次请求的初始化开销。
    pub fn new(config: CompareConfig) -> Result<Self, CompareError> {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| CompareError::Network(format!("HTTP 客户端初始化失败：{}", e)))?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            http,
            download_cache: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// 获取配置快照。
    ///
    /// 作用：保证单次请求链路使用一致参数。
    pub(super) fn config_snapshot(&self) -> Result<CompareConfig, CompareError> {
        self.config
            .read()
            .map(|cfg| cfg.clone())
            .map_err(|_| CompareError::ResourceLimit("配置读取锁已中毒".to_string()))
    }

    /// 设置性能档位。
    pub fn set_performance_profile(
        &self,
        profile: ComparePerformanceProfile,
    ) -> Result<(), CompareError> {
        let mut config = self
            .config
            .write()
            .map_err(|_| CompareError::ResourceLimit("配置写入锁已中毒".to_string()))?;
        config.apply_performance_profile(profile);

        log::info!(
            "⚙️ 已切换对比性能档位：{:?}（sampling={}, filter={:?}）",
            profile,
            config.intensity_sampling_scale,
            config.resize_filter
        );

        Ok(())
    }

    /// 获取当前生效档位。
    pub fn get_performance_profile(&self) -> Result<ComparePerformanceProfile, CompareError> {
        let config = self
            .config
            .read()
            .map_err(|_| CompareError::ResourceLimit("配置读取锁已中毒".to_string()))?;
        Ok(config.infer_performance_profile())
    }

    /// 调整强度分析参数。
    ///
    /// 量化带宽（满量程 / 档位数）是可调常量，默认 100 / 5 = 20，
    /// 保持与既有视觉行为一致。
    pub fn set_analysis_tuning(
        &self,
        block_size: u32,
        threshold: f64,
        sampling_scale: f64,
    ) -> Result<(), CompareError> {
        if !(1..=256).contains(&block_size) {
            return Err(CompareError::InvalidFormat(
                "block_size 必须在 1~256 之间".to_string(),
            ));
        }
        if !(0.0..=255.0).contains(&threshold) {
            return Err(CompareError::InvalidFormat(
                "threshold 必须在 0~255 之间".to_string(),
            ));
        }
        if !(0.05..=1.0).contains(&sampling_scale) {
            return Err(CompareError::InvalidFormat(
                "sampling_scale 必须在 0.05~1.0 之间".to_string(),
            ));
        }

        let mut config = self
            .config
            .write()
            .map_err(|_| CompareError::ResourceLimit("配置写入锁已中毒".to_string()))?;

        config.intensity_block_size = block_size;
        config.intensity_threshold = threshold;
        config.intensity_sampling_scale = sampling_scale;

        Ok(())
    }

    /// 获取强度分析参数快照。
    pub fn get_analysis_tuning(&self) -> Result<(u32, f64, f64), CompareError> {
        let config = self
            .config
            .read()
            .map_err(|_| CompareError::ResourceLimit("配置读取锁已中毒".to_string()))?;

        Ok((
            config.intensity_block_size,
            config.intensity_threshold,
            config.intensity_sampling_scale,
        ))
    }

    /// 处理主入口：加载、对齐并按指定模式分析一对图像。
    ///
    /// 两张图的加载并发执行，全部就绪后才进入解码与分析；
    /// 任一来源失败则整轮拒绝，不做部分分析。
    pub async fn compare(
        &self,
        original: ImageSource,
        edited: ImageSource,
        mode: AnalysisMode,
    ) -> Result<CompareOutcome, CompareError> {
        let config = self.config_snapshot()?;
        let total_start = Instant::now();

        let load_start = Instant::now();
        let (raw_original, raw_edited) = tokio::try_join!(
            self.load_source(original, &config),
            self.load_source(edited, &config),
        )?;
        let load_elapsed = load_start.elapsed();

        let analyze_start = Instant::now();
        let outcome = tokio::task::spawn_blocking(move || {
            Self::analyze_pair(raw_original, raw_edited, mode, &config)
        })
        .await
        .map_err(|e| CompareError::Cancelled(format!("后台分析任务中断：{}", e)))??;
        let analyze_elapsed = analyze_start.elapsed();

        let total_elapsed = total_start.elapsed();
        log::info!(
            "✅ 对比分析完成 - mode={:?} load={}ms analyze={}ms total={}ms",
            mode,
            load_elapsed.as_millis(),
            analyze_elapsed.as_millis(),
            total_elapsed.as_millis()
        );

        Ok(outcome)
    }

    /// 同步 CPU 密集阶段：解码 → 校验 → 对齐 → 模式分析。
    fn analyze_pair(
        raw_original: super::source::RawImageBytes,
        raw_edited: super::source::RawImageBytes,
        mode: AnalysisMode,
        config: &CompareConfig,
    ) -> Result<CompareOutcome, CompareError> {
        let decoded_original = Self::decode_image(raw_original, config)?;
        let decoded_edited = Self::decode_image(raw_edited, config)?;

        let original = decoded_original.descriptor;
        let edited = decoded_edited.descriptor;
        original.validate()?;
        edited.validate()?;

        let transform = AlignmentTransform::resolve(original, edited);
        let overlap = transform.overlap_region(original, edited);

        let output = match mode {
            AnalysisMode::Wipe => AnalysisOutput::Wipe {
                layout: WipeLayout::resolve(original, edited, &transform),
                position: wipe::INITIAL_POSITION,
            },
            AnalysisMode::Intensity => {
                let crop = crop::detect(original, edited, &transform, config.geometry_epsilon);

                let sampling = config.intensity_sampling_scale;
                let original_frame =
                    Self::extract_frame(&decoded_original, sampling, config.resize_filter)?;
                let edited_frame = Self::project_into_frame(
                    &decoded_edited,
                    original,
                    &transform,
                    sampling,
                    config.resize_filter,
                )?;

                let blocks = intensity::analyze(
                    &original_frame,
                    &edited_frame,
                    &overlap,
                    &IntensityOptions {
                        block_size: config.intensity_block_size,
                        threshold: config.intensity_threshold,
                        levels: config.severity_levels,
                        full_scale: config.severity_full_scale,
                        sampling_scale: sampling,
                    },
                );

                AnalysisOutput::Intensity { crop, blocks }
            }
            AnalysisMode::Differential => {
                let crop = crop::detect(original, edited, &transform, config.geometry_epsilon);

                // 差分用于精确目视检查，始终全分辨率。
                let original_frame =
                    Self::extract_frame(&decoded_original, 1.0, config.resize_filter)?;
                let edited_frame = Self::project_into_frame(
                    &decoded_edited,
                    original,
                    &transform,
                    1.0,
                    config.resize_filter,
                )?;

                let delta = differential::compute(&original_frame, &edited_frame, &overlap);
                AnalysisOutput::Differential { crop, delta }
            }
        };

        Ok(CompareOutcome {
            original,
            edited,
            transform,
            overlap,
            output,
        })
    }
}
