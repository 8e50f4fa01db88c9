use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use moka::future::Cache;

use crate::config::RateLimitConfig;
use crate::error::AppError;

/// 按请求路径计数的固定窗口限流器。
///
/// 每个路径的计数器在首次请求时创建，窗口到期后由缓存 TTL 整体回收。
#[derive(Clone)]
pub struct RateLimiter {
    windows: Cache<String, Arc<AtomicU32>>,
    max_requests: u32,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            windows: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(window)
                .build(),
            max_requests,
        }
    }

    pub fn from_config(cfg: &RateLimitConfig) -> Option<Self> {
        cfg.enabled
            .then(|| Self::new(cfg.max_requests, cfg.window()))
    }

    /// 记录一次请求；返回该请求是否在额度内
    pub async fn check(&self, key: &str) -> bool {
        let counter = self
            .windows
            .get_with(key.to_string(), async { Arc::new(AtomicU32::new(0)) })
            .await;
        counter.fetch_add(1, Ordering::Relaxed) < self.max_requests
    }
}

/// 限流中间件：超额请求直接返回 429
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path().to_string();
    if !limiter.check(&path).await {
        tracing::warn!(path = %path, "触发限流");
        return AppError::TooManyRequests(path).into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::RateLimiter;
    use std::time::Duration;

    #[tokio::test]
    async fn rejects_after_quota_within_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert!(limiter.check("/api/placeholder/1x1").await);
        }
        assert!(!limiter.check("/api/placeholder/1x1").await);
    }

    #[tokio::test]
    async fn paths_are_counted_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check("/a").await);
        assert!(limiter.check("/b").await);
        assert!(!limiter.check("/a").await);
    }

    #[tokio::test]
    async fn quota_resets_after_window() {
        let limiter = RateLimiter::new(1, Duration::from_millis(100));
        assert!(limiter.check("/a").await);
        assert!(!limiter.check("/a").await);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(limiter.check("/a").await);
    }
}
