use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;

use crate::state::AppState;

/// 健康检查响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// 服务状态：healthy | unhealthy
    #[schema(example = "healthy")]
    pub status: String,
    /// 服务名称
    #[schema(example = "placeholder-api")]
    pub service: String,
    /// 当前版本（Cargo package version）
    #[schema(example = "0.1.0")]
    pub version: String,
    /// 内嵌字体是否可用
    pub font_available: bool,
    /// 结果缓存当前条目数（未启用缓存时为 null）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_entries: Option<usize>,
}

#[utoipa::path(
    get,
    path = "/health",
    summary = "健康检查",
    description = "用于探活的健康检查端点。内嵌字体无法解析时返回 503，此时任何占位图请求都会失败。",
    responses(
        (status = 200, description = "服务健康", body = HealthResponse),
        (status = 503, description = "字体不可用", body = HealthResponse)
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let service = &state.image_service;
    let font_available = service.fonts().is_available();
    let status = if font_available {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if font_available { "healthy" } else { "unhealthy" }.to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            font_available,
            cache_entries: service.cache().map(|c| c.len()),
        }),
    )
}
