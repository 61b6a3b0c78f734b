//! # 加载与校验模块
//!
//! ## 设计思路
//!
//! 统一处理不同来源（URL / Base64 / 本地文件 / 内存字节）的原始字节加载，
//! 并在“尽可能早”的阶段执行输入校验，尽快失败以减少不必要的内存与 CPU 消耗。
//!
//! ## 实现思路
//!
//! - URL：协议白名单 + 体积校验 + 流式下载 + 短 TTL 缓存 + 有限重试。
//! - Base64：格式解析 + 解码后体积限制。
//! - 文件：存在性 + metadata 体积限制 + 读取。
//! - 所有来源统一做魔数签名校验，非图片字节在解码前即被拒绝。

use base64::{engine::general_purpose, Engine as _};
use std::path::Path;
use std::time::{Duration, Instant};

use super::handler::CachedDownload;
use super::source::{ImageSource, RawImageBytes};
use super::{CompareConfig, CompareError, CompareHandler};

const NETWORK_RETRY_MAX_ATTEMPTS: u8 = 3;
const NETWORK_RETRY_BASE_DELAY_MS: u64 = 180;
const BUFFER_INITIAL_CAPACITY: usize = 16 * 1024;
const DOWNLOAD_CACHE_TTL_SECS: u64 = 25;
const DOWNLOAD_CACHE_MAX_ENTRIES: usize = 24;

impl CompareHandler {
    /// 按来源语义加载原始字节。
    pub(crate) async fn load_source(
        &self,
        source: ImageSource,
        config: &CompareConfig,
    ) -> Result<RawImageBytes, CompareError> {
        match source {
            ImageSource::Url(url) => self.load_from_url(&url, config).await,
            ImageSource::Base64(data) => Self::load_from_base64(&data, config),
            ImageSource::FilePath(path) => Self::load_from_file(&path, config),
            ImageSource::Bytes(bytes) => Self::load_from_bytes(bytes, config),
        }
    }

    /// 从 URL 加载图片原始字节。
    async fn load_from_url(
        &self,
        url: &str,
        config: &CompareConfig,
    ) -> Result<RawImageBytes, CompareError> {
        log::info!("🌐 开始下载图片 - URL: {}", Self::redact_url_for_log(url));

        Self::validate_url_scheme(url)?;

        if let Some(cached) = self.cached_download(url)? {
            log::debug!("♻️ 命中下载缓存 - URL: {}", Self::redact_url_for_log(url));
            Self::validate_image_signature(&cached)?;
            return Ok(RawImageBytes {
                bytes: cached,
                source_hint: "url",
            });
        }

        let mut last_error = None;
        for attempt in 1..=NETWORK_RETRY_MAX_ATTEMPTS {
            match self.download_with_validation(url, config).await {
                Ok(bytes) => {
                    Self::validate_image_signature(&bytes)?;
                    self.store_download(url, &bytes)?;
                    return Ok(RawImageBytes {
                        bytes,
                        source_hint: "url",
                    });
                }
                Err(err @ (CompareError::Network(_) | CompareError::Timeout(_))) => {
                    log::warn!(
                        "⚠️ 下载失败（第 {}/{} 次）：{}",
                        attempt,
                        NETWORK_RETRY_MAX_ATTEMPTS,
                        err
                    );
                    last_error = Some(err);
                    if attempt < NETWORK_RETRY_MAX_ATTEMPTS {
                        tokio::time::sleep(Duration::from_millis(
                            NETWORK_RETRY_BASE_DELAY_MS * attempt as u64,
                        ))
                        .await;
                    }
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error
            .unwrap_or_else(|| CompareError::Network("下载失败且无具体错误信息".to_string())))
    }

    /// 从 Base64 字符串加载图片原始字节。
    fn load_from_base64(data: &str, config: &CompareConfig) -> Result<RawImageBytes, CompareError> {
        log::info!("📝 开始处理 base64 图片");

        let bytes = Self::parse_base64_with_limit(data, config.max_file_size)?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageBytes {
            bytes,
            source_hint: "base64",
        })
    }

    /// 从本地路径加载图片原始字节。
    fn load_from_file(path: &str, config: &CompareConfig) -> Result<RawImageBytes, CompareError> {
        log::info!("📁 开始读取本地图片 - 路径: {}", path);

        let file_path = Path::new(path);
        if !file_path.exists() {
            return Err(CompareError::FileSystem(format!("文件不存在：{}", path)));
        }

        let metadata = std::fs::metadata(file_path)
            .map_err(|e| CompareError::FileSystem(format!("无法读取文件信息：{}", e)))?;

        if metadata.len() > config.max_file_size {
            return Err(CompareError::ResourceLimit(format!(
                "文件过大：{:.2} MB（限制：{:.2} MB）",
                metadata.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        let bytes = std::fs::read(file_path)
            .map_err(|e| CompareError::FileSystem(format!("无法读取图片文件：{}", e)))?;
        Self::validate_image_signature(&bytes)?;

        Ok(RawImageBytes {
            bytes,
            source_hint: "file",
        })
    }

    /// 使用调用方已持有的字节。
    fn load_from_bytes(bytes: Vec<u8>, config: &CompareConfig) -> Result<RawImageBytes, CompareError> {
        if bytes.len() as u64 > config.max_file_size {
            return Err(CompareError::ResourceLimit(format!(
                "图片字节过大：{:.2} MB（限制：{:.2} MB）",
                bytes.len() as f64 / 1024.0 / 1024.0,
                config.max_file_size as f64 / 1024.0 / 1024.0
            )));
        }

        Self::validate_image_signature(&bytes)?;
        Ok(RawImageBytes {
            bytes,
            source_hint: "bytes",
        })
    }

    /// 执行带校验的网络下载。
    ///
    /// 使用流式读取，避免一次性读入导致内存峰值过高。
    async fn download_with_validation(
        &self,
        url: &str,
        config: &CompareConfig,
    ) -> Result<Vec<u8>, CompareError> {
        let response = self
            .http
            .get(url)
            .timeout(Duration::from_secs(config.download_timeout))
            .send()
            .await
            .map_err(Self::map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(CompareError::Network(format!(
                "下载失败，HTTP 状态码：{}",
                response.status()
            )));
        }

        if let Some(total) = response.content_length() {
            if total > config.max_file_size {
                return Err(CompareError::ResourceLimit(format!(
                    "图片体积过大：{:.2} MB（限制：{:.2} MB）",
                    total as f64 / 1024.0 / 1024.0,
                    config.max_file_size as f64 / 1024.0 / 1024.0
                )));
            }
        }

        let mut response = response;
        let mut bytes = Vec::with_capacity(BUFFER_INITIAL_CAPACITY);

        while let Some(chunk) = response.chunk().await.map_err(Self::map_reqwest_error)? {
            if (bytes.len() + chunk.len()) as u64 > config.max_file_size {
                return Err(CompareError::ResourceLimit(format!(
                    "下载内容超过体积上限：{:.2} MB",
                    config.max_file_size as f64 / 1024.0 / 1024.0
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        if bytes.is_empty() {
            return Err(CompareError::Network("下载内容为空".to_string()));
        }

        Ok(bytes)
    }

    fn map_reqwest_error(error: reqwest::Error) -> CompareError {
        if error.is_timeout() {
            CompareError::Timeout(format!("网络请求超时：{}", error))
        } else {
            CompareError::Network(format!("网络请求失败：{}", error))
        }
    }

    /// 协议白名单校验，仅允许 http / https。
    fn validate_url_scheme(url: &str) -> Result<(), CompareError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| CompareError::InvalidFormat(format!("URL 解析失败：{}", e)))?;

        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(CompareError::InvalidFormat(format!(
                "不支持的 URL 协议：{}",
                other
            ))),
        }
    }

    /// 解析 Data URL 或纯 Base64 字符串，并在解码前按估算体积拒绝超限输入。
    pub(crate) fn parse_base64_with_limit(
        data: &str,
        max_bytes: u64,
    ) -> Result<Vec<u8>, CompareError> {
        let payload = match data.split_once(',') {
            Some((prefix, body)) if prefix.starts_with("data:") => {
                if !prefix.contains(";base64") {
                    return Err(CompareError::InvalidFormat(
                        "Data URL 缺少 base64 标记".to_string(),
                    ));
                }
                body
            }
            _ => data,
        };

        // Base64 解码后体积约为输入长度的 3/4，先估算再解码。
        let estimated = payload.len() as u64 * 3 / 4;
        if estimated > max_bytes {
            return Err(CompareError::ResourceLimit(format!(
                "Base64 解码后预计体积过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                max_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| CompareError::InvalidFormat(format!("Base64 解码失败：{}", e)))
    }

    /// 魔数签名校验：只接受图片类字节。
    fn validate_image_signature(bytes: &[u8]) -> Result<(), CompareError> {
        let kind = infer::get(bytes)
            .ok_or_else(|| CompareError::InvalidFormat("无法识别文件签名".to_string()))?;

        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(CompareError::InvalidFormat(format!(
                "文件签名不是图片：{}",
                kind.mime_type()
            )));
        }

        Ok(())
    }

    /// 日志展示用 URL 脱敏：去掉查询串。
    fn redact_url_for_log(url: &str) -> String {
        match url.split_once('?') {
            Some((base, _)) => format!("{}?<redacted>", base),
            None => url.to_string(),
        }
    }

    fn cached_download(&self, url: &str) -> Result<Option<Vec<u8>>, CompareError> {
        let mut cache = self
            .download_cache
            .lock()
            .map_err(|_| CompareError::ResourceLimit("下载缓存锁已中毒".to_string()))?;

        let ttl = Duration::from_secs(DOWNLOAD_CACHE_TTL_SECS);
        cache.retain(|_, entry| entry.created_at.elapsed() < ttl);

        Ok(cache.get(url).map(|entry| entry.bytes.clone()))
    }

    fn store_download(&self, url: &str, bytes: &[u8]) -> Result<(), CompareError> {
        let mut cache = self
            .download_cache
            .lock()
            .map_err(|_| CompareError::ResourceLimit("下载缓存锁已中毒".to_string()))?;

        if cache.len() >= DOWNLOAD_CACHE_MAX_ENTRIES {
            // 超出容量时淘汰最早的条目。
            if let Some(oldest) = cache
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(key, _)| key.clone())
            {
                cache.remove(&oldest);
            }
        }

        cache.insert(
            url.to_string(),
            CachedDownload {
                created_at: Instant::now(),
                bytes: bytes.to_vec(),
            },
        );

        Ok(())
    }
}
