use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::ImageRenderConfig;
use crate::features::image::ImageService;

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    /// 占位图生成服务（缓存 + 字体池）
    pub image_service: Arc<ImageService>,
    /// 控制并发渲染的信号量（限制 CPU 密集型任务数量）
    pub render_semaphore: Arc<Semaphore>,
    /// 成功响应的 Cache-Control max-age（秒）
    pub cache_control_max_age_secs: u64,
}

impl AppState {
    pub fn new(
        image_service: ImageService,
        max_parallel: usize,
        cache_control_max_age_secs: u64,
    ) -> Self {
        Self {
            image_service: Arc::new(image_service),
            render_semaphore: Arc::new(Semaphore::new(max_parallel.max(1))),
            cache_control_max_age_secs,
        }
    }

    pub fn from_config(cfg: &ImageRenderConfig) -> Self {
        Self::new(
            ImageService::from_config(cfg),
            cfg.effective_parallelism(),
            cfg.cache_control_max_age_secs,
        )
    }
}
