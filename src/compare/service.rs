//! # 服务层（可注入状态）
//!
//! ## 设计思路
//!
//! 使用 `CompareServiceState` 作为应用注入状态，替代全局单例函数。
//! 好处：
//! 1. 生命周期清晰（由宿主应用统一管理）
//! 2. 测试可创建独立实例，减少共享状态副作用
//! 3. 后续可扩展多实例或按会话配置
//!
//! ## 实现思路
//!
//! 过期结果防护采用单调递增的代号（generation）：
//! - 每次提交分析前先领取新代号；图像对切换或模式切换都会触发新提交。
//! - 分析完成时代号已被超越的结果直接丢弃，不落入结果槽，
//!   也不作为错误上报——这是正常的竞态收敛，不是故障。
//! - 结果槽只有“当前代号的分析”一个写者，无需额外加锁策略。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::handler::{AnalysisMode, CompareHandler, CompareOutcome};
use super::source::ImageSource;
use super::{CompareConfig, CompareError, ComparePerformanceProfile};

struct PublishedOutcome {
    generation: u64,
    outcome: Arc<CompareOutcome>,
}

/// 图像对比服务状态。
///
/// 注入到宿主应用的命令层，内部持有 `CompareHandler` 与代号计数器。
pub struct CompareServiceState {
    handler: CompareHandler,
    generation: AtomicU64,
    latest: Mutex<Option<PublishedOutcome>>,
}

impl CompareServiceState {
    /// 使用默认配置创建服务状态。
    pub fn new() -> Result<Self, CompareError> {
        Self::with_config(CompareConfig::default())
    }

    /// 使用自定义配置创建服务状态。
    ///
    /// 主要用于测试或后续按场景注入不同策略。
    pub fn with_config(config: CompareConfig) -> Result<Self, CompareError> {
        let handler = CompareHandler::new(config)?;
        Ok(Self {
            handler,
            generation: AtomicU64::new(0),
            latest: Mutex::new(None),
        })
    }

    /// 提交一轮对比分析。
    ///
    /// 返回 `Ok(None)` 表示结果在完成前已被更新的提交超越并被丢弃；
    /// 这种情况不会覆盖更新的结果，也不会向上层报错。
    pub async fn submit(
        &self,
        original: ImageSource,
        edited: ImageSource,
        mode: AnalysisMode,
    ) -> Result<Option<Arc<CompareOutcome>>, CompareError> {
        let generation = self.begin_pass();
        let outcome = self.handler.compare(original, edited, mode).await?;
        self.publish_if_current(generation, outcome)
    }

    /// 使当前所有在途分析失效。
    ///
    /// 图像对切换（翻页导航）但尚未发起新分析时调用，
    /// 防止旧结果在空窗期落入结果槽。
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// 读取最近一次发布的结果。
    pub fn latest_outcome(&self) -> Result<Option<Arc<CompareOutcome>>, CompareError> {
        let slot = self
            .latest
            .lock()
            .map_err(|_| CompareError::ResourceLimit("结果槽锁已中毒".to_string()))?;
        Ok(slot.as_ref().map(|published| Arc::clone(&published.outcome)))
    }

    /// 设置性能档位。
    pub fn set_performance_profile(&self, profile: &str) -> Result<(), CompareError> {
        let profile = ComparePerformanceProfile::from_str(profile)?;
        self.handler.set_performance_profile(profile)
    }

    /// 获取当前生效性能档位（字符串）。
    pub fn get_performance_profile(&self) -> Result<String, CompareError> {
        let profile = self.handler.get_performance_profile()?;
        Ok(profile.as_str().to_string())
    }

    /// 调整强度分析参数（透传到处理器）。
    pub fn set_analysis_tuning(
        &self,
        block_size: u32,
        threshold: f64,
        sampling_scale: f64,
    ) -> Result<(), CompareError> {
        self.handler
            .set_analysis_tuning(block_size, threshold, sampling_scale)
    }

    /// 领取新一轮分析代号。
    fn begin_pass(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// 仅当代号仍是最新时发布结果。
    fn publish_if_current(
        &self,
        generation: u64,
        outcome: CompareOutcome,
    ) -> Result<Option<Arc<CompareOutcome>>, CompareError> {
        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("🗑️ 丢弃过期分析结果 - generation={}", generation);
            return Ok(None);
        }

        let outcome = Arc::new(outcome);
        let mut slot = self
            .latest
            .lock()
            .map_err(|_| CompareError::ResourceLimit("结果槽锁已中毒".to_string()))?;

        slot.replace(PublishedOutcome {
            generation,
            outcome: Arc::clone(&outcome),
        });

        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::handler::AnalysisOutput;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
    use std::io::Cursor;

    fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgba([rgb[0], rgb[1], rgb[2], 255]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    async fn run_outcome(
        service: &CompareServiceState,
        mode: AnalysisMode,
    ) -> CompareOutcome {
        // 直接走处理器拿到一个真实结果，用于代号发布逻辑测试。
        let png = solid_png(16, 16, [5, 5, 5]);
        service
            .handler
            .compare(
                ImageSource::Bytes(png.clone()),
                ImageSource::Bytes(png),
                mode,
            )
            .await
            .expect("compare should succeed")
    }

    #[tokio::test]
    async fn submit_publishes_latest_result() {
        let service = CompareServiceState::new().expect("service init failed");
        let png = solid_png(16, 16, [50, 60, 70]);

        let published = service
            .submit(
                ImageSource::Bytes(png.clone()),
                ImageSource::Bytes(png),
                AnalysisMode::Wipe,
            )
            .await
            .expect("submit should succeed")
            .expect("result should be published");

        assert!(matches!(published.output, AnalysisOutput::Wipe { .. }));
        assert!(service
            .latest_outcome()
            .expect("latest readback failed")
            .is_some());
    }

    #[tokio::test]
    async fn superseded_pass_is_discarded_silently() {
        let service = CompareServiceState::new().expect("service init failed");

        // 模拟：旧代号的分析在新代号启动之后才完成。
        let old_generation = service.begin_pass();
        let new_generation = service.begin_pass();

        let old_outcome = run_outcome(&service, AnalysisMode::Intensity).await;
        let stale = service
            .publish_if_current(old_generation, old_outcome)
            .expect("publish should not error");
        assert!(stale.is_none());
        assert!(service
            .latest_outcome()
            .expect("latest readback failed")
            .is_none());

        let new_outcome = run_outcome(&service, AnalysisMode::Differential).await;
        let published = service
            .publish_if_current(new_generation, new_outcome)
            .expect("publish should not error")
            .expect("current generation should publish");
        assert!(matches!(
            published.output,
            AnalysisOutput::Differential { .. }
        ));
    }

    #[tokio::test]
    async fn stale_result_never_overwrites_newer_one() {
        let service = CompareServiceState::new().expect("service init failed");

        let old_generation = service.begin_pass();
        let new_generation = service.begin_pass();

        // 新结果先发布。
        let new_outcome = run_outcome(&service, AnalysisMode::Differential).await;
        service
            .publish_if_current(new_generation, new_outcome)
            .expect("publish should not error")
            .expect("current generation should publish");

        // 旧结果后到，不得覆盖。
        let old_outcome = run_outcome(&service, AnalysisMode::Intensity).await;
        let stale = service
            .publish_if_current(old_generation, old_outcome)
            .expect("publish should not error");
        assert!(stale.is_none());

        let latest = service
            .latest_outcome()
            .expect("latest readback failed")
            .expect("latest should exist");
        assert!(matches!(latest.output, AnalysisOutput::Differential { .. }));
    }

    #[tokio::test]
    async fn invalidate_discards_in_flight_pass() {
        let service = CompareServiceState::new().expect("service init failed");

        let generation = service.begin_pass();
        // 翻页导航触发失效。
        service.invalidate();

        let outcome = run_outcome(&service, AnalysisMode::Wipe).await;
        let published = service
            .publish_if_current(generation, outcome)
            .expect("publish should not error");
        assert!(published.is_none());
    }

    #[test]
    fn service_profile_roundtrip_and_rejection() {
        let service = CompareServiceState::new().expect("service init failed");

        for profile in ["quality", "balanced", "speed"] {
            service
                .set_performance_profile(profile)
                .expect("set profile should succeed");
            assert_eq!(
                service
                    .get_performance_profile()
                    .expect("get profile should succeed"),
                profile
            );
        }

        let result = service.set_performance_profile("unknown-profile");
        assert!(matches!(result, Err(CompareError::InvalidFormat(_))));
    }
}
