use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 占位图生成核心的错误类型（封闭集合，HTTP 层负责映射状态码）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderError {
    /// 尺寸格式非法或超出范围
    #[error("无效的尺寸: {0}")]
    InvalidSize(String),

    /// 不支持的图片格式
    #[error("不支持的图片格式: {0}")]
    UnsupportedFormat(String),

    /// 颜色不是 6 位十六进制
    #[error("无效的颜色: {0}")]
    InvalidColor(String),

    /// 内嵌字体解析失败（进程级致命，失败结果被缓存）
    #[error("字体不可用: {0}")]
    FontUnavailable(String),

    /// 图片编码失败
    #[error("图片编码失败: {0}")]
    Encoding(String),
}

impl PlaceholderError {
    /// 是否属于调用方输入错误
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PlaceholderError::InvalidSize(_)
                | PlaceholderError::UnsupportedFormat(_)
                | PlaceholderError::InvalidColor(_)
        )
    }
}

/// 应用统一错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 生成核心返回的错误
    #[error(transparent)]
    Placeholder(#[from] PlaceholderError),

    /// 触发限流
    #[error("请求过于频繁: {0}")]
    TooManyRequests(String),

    /// 内部服务器错误
    #[error("内部错误: {0}")]
    Internal(String),
}

/// RFC7807 风格的错误响应（Problem Details）。
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    /// 问题类型（URI）。若无更细分的类型，可使用 about:blank。
    #[serde(rename = "type")]
    #[schema(example = "about:blank")]
    pub type_url: String,

    /// 简短标题，用于概括错误。
    #[schema(example = "Bad Request")]
    pub title: String,

    /// HTTP 状态码（与响应 status 一致）。
    #[schema(example = 400)]
    pub status: u16,

    /// 人类可读的详细信息
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// 稳定的错误码，用于程序化处理。
    #[schema(example = "INVALID_SIZE")]
    pub code: String,

    /// 请求追踪 ID（由 request-id 中间件注入）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Placeholder(e) => match e {
                PlaceholderError::InvalidSize(_)
                | PlaceholderError::UnsupportedFormat(_)
                | PlaceholderError::InvalidColor(_) => StatusCode::BAD_REQUEST,
                PlaceholderError::FontUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                PlaceholderError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn stable_code(&self) -> &'static str {
        match self {
            AppError::Placeholder(e) => match e {
                PlaceholderError::InvalidSize(_) => "INVALID_SIZE",
                PlaceholderError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
                PlaceholderError::InvalidColor(_) => "INVALID_COLOR",
                PlaceholderError::FontUnavailable(_) => "FONT_UNAVAILABLE",
                PlaceholderError::Encoding(_) => "ENCODING_FAILED",
            },
            AppError::TooManyRequests(_) => "RATE_LIMITED",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn title(&self) -> &'static str {
        match self.status_code() {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::TOO_MANY_REQUESTS => "Too Many Requests",
            StatusCode::SERVICE_UNAVAILABLE => "Service Unavailable",
            StatusCode::INTERNAL_SERVER_ERROR => "Internal Server Error",
            _ => "Error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.stable_code(), "请求处理失败: {}", self);
        }

        let problem = ProblemDetails {
            type_url: "about:blank".to_string(),
            title: self.title().to_string(),
            status: status.as_u16(),
            detail: Some(self.to_string()),
            code: self.stable_code().to_string(),
            request_id: crate::request_id::current_request_id(),
        };

        let mut res = Json(problem).into_response();
        *res.status_mut() = status;
        res.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        res
    }
}
