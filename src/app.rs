use axum::{Router, routing::get};
use tower_http::compression::CompressionLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::access_log::access_log_middleware;
use crate::config::AppConfig;
use crate::cors::build_cors_layer;
use crate::features::{health, image};
use crate::openapi::ApiDoc;
use crate::rate_limit::{RateLimiter, rate_limit_middleware};
use crate::request_id::request_id_middleware;
use crate::state::AppState;

/// 响应压缩策略：排除图片与常见二进制类型，保留默认最小大小阈值。
pub fn compression_predicate() -> impl tower_http::compression::predicate::Predicate {
    use tower_http::compression::predicate::{NotForContentType, Predicate, SizeAbove};

    SizeAbove::default()
        .and(NotForContentType::GRPC)
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::SSE)
        .and(NotForContentType::const_new("application/octet-stream"))
}

/// 组装完整路由与中间件栈。
///
/// 由外到内：request id → 访问日志 → CORS → 限流 → 压缩 → 路由。
pub fn build_router(config: &AppConfig, state: AppState) -> Router {
    let api_router = Router::<AppState>::new().merge(image::create_image_router());

    let mut app = Router::<AppState>::new()
        .route("/health", get(health::health_check))
        .nest(&config.api.prefix, api_router)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state);

    app = app.layer(CompressionLayer::new().compress_when(compression_predicate()));

    if let Some(limiter) = RateLimiter::from_config(&config.rate_limit) {
        app = app.layer(axum::middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ));
    }

    if let Some(cors) = build_cors_layer(&config.cors) {
        app = app.layer(cors);
    }

    app.layer(axum::middleware::from_fn(access_log_middleware))
        .layer(axum::middleware::from_fn(request_id_middleware))
}
