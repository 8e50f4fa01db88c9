use std::time::{Duration, Instant};

use axum::body::Bytes;

use super::cache::{CacheKey, ResultCache};
use super::font::FontManager;
use super::types::{ImageFormat, ImageRequest};
use super::{encoder, renderer};
use crate::config::ImageRenderConfig;
use crate::error::PlaceholderError;

/// 生成结果
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub bytes: Bytes,
    pub format: ImageFormat,
    /// 是否来自结果缓存
    pub cache_hit: bool,
}

impl GeneratedImage {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// 占位图生成服务：指纹 → 缓存 → 渲染 → 编码 → 回填缓存
pub struct ImageService {
    cache: Option<ResultCache>,
    fonts: FontManager,
}

impl ImageService {
    /// 显式注入缓存与字体管理器；`cache` 为 `None` 时每次都重新生成
    pub fn new(cache: Option<ResultCache>, fonts: FontManager) -> Self {
        Self { cache, fonts }
    }

    pub fn from_config(cfg: &ImageRenderConfig) -> Self {
        let cache = cfg.cache_enabled.then(|| {
            ResultCache::new(cfg.cache_capacity, Duration::from_secs(cfg.cache_ttl_secs))
        });
        Self::new(cache, FontManager::new(cfg.font_pool_size))
    }

    /// 生成（或取缓存）请求对应的图片字节。失败的生成不会写入缓存。
    pub fn generate(&self, req: &ImageRequest) -> Result<GeneratedImage, PlaceholderError> {
        let t0 = Instant::now();
        let key = CacheKey::from_request(req);

        if let Some(bytes) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            tracing::debug!(key = %key, "占位图缓存命中");
            return Ok(GeneratedImage {
                bytes,
                format: req.format(),
                cache_hit: true,
            });
        }

        let buffer = renderer::render_request(req, &self.fonts)?;
        let t_render = t0.elapsed();
        let bytes = Bytes::from(encoder::encode(&buffer, req.format())?);
        let t_total = t0.elapsed();

        if let Some(cache) = &self.cache {
            cache.put(key, bytes.clone());
        }

        tracing::debug!(
            key = %key,
            width = req.width(),
            height = req.height(),
            format = req.format().as_str(),
            size = bytes.len(),
            "占位图生成完成: 渲染={:?}, 编码={:?}",
            t_render,
            t_total - t_render
        );

        Ok(GeneratedImage {
            bytes,
            format: req.format(),
            cache_hit: false,
        })
    }

    pub fn fonts(&self) -> &FontManager {
        &self.fonts
    }

    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }
}
