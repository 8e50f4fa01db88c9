use std::time::Instant;

use axum::{
    Router,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::get,
};

use super::types::validate;
use crate::error::AppError;
use crate::state::AppState;

/// 缓存命中标记响应头
pub const X_CACHE: &str = "x-cache";

/// 从原始查询串中提取的占位图参数（均为解码后的原始字节）
#[derive(Debug, Default, PartialEq, Eq)]
struct PlaceholderQuery {
    bg: Option<String>,
    fg: Option<String>,
    text: Option<Vec<u8>>,
}

/// `application/x-www-form-urlencoded` 风格解码：`+` 视为空格，再做一次百分号解码。
///
/// 只要存在一个非法的百分号序列，整个片段不做百分号解码（`+` 仍视为空格）。
fn decode_component(raw: &str) -> Vec<u8> {
    let spaced: Vec<u8> = raw
        .bytes()
        .map(|b| if b == b'+' { b' ' } else { b })
        .collect();
    if has_malformed_escape(&spaced) {
        return spaced;
    }
    urlencoding::decode_binary(&spaced).into_owned()
}

/// `%` 后面不是两位十六进制数字
fn has_malformed_escape(bytes: &[u8]) -> bool {
    bytes.iter().enumerate().any(|(i, &b)| {
        b == b'%'
            && !matches!(
                bytes.get(i + 1..i + 3),
                Some([hi, lo]) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit()
            )
    })
}

/// 同名参数以第一次出现为准；文本保留原始字节，颜色按 UTF-8 有损解码。
fn parse_query(raw: Option<&str>) -> PlaceholderQuery {
    let mut q = PlaceholderQuery::default();
    let Some(raw) = raw else {
        return q;
    };

    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode_component(k);
        match key.as_slice() {
            b"bg" if q.bg.is_none() => {
                q.bg = Some(String::from_utf8_lossy(&decode_component(v)).into_owned());
            }
            b"fg" if q.fg.is_none() => {
                q.fg = Some(String::from_utf8_lossy(&decode_component(v)).into_owned());
            }
            b"text" if q.text.is_none() => q.text = Some(decode_component(v)),
            _ => {}
        }
    }
    q
}

/// 拆分路径段 `WxH[.ext]`：尺寸取第一个 `.` 之前的部分；
/// 恰好一个 `.` 时才有扩展名，多个 `.` 视为未指定格式（默认 png）。
fn split_size_token(token: &str) -> (&str, Option<&str>) {
    let mut parts = token.split('.');
    let size = parts.next().unwrap_or(token);
    match (parts.next(), parts.next()) {
        (Some(ext), None) => (size, Some(ext)),
        _ => (size, None),
    }
}

#[utoipa::path(
    get,
    path = "/placeholder/{size}",
    summary = "生成占位图",
    description = "按 `宽x高[.格式]` 生成纯色背景 + 居中文字的占位图。\
默认格式 png、背景 cccccc、前景 666666、文字为尺寸本身。相同参数的结果会被缓存。",
    params(
        ("size" = String, Path, description = "尺寸与可选扩展名，例如 300x200 或 400x300.jpg（1..=3000）"),
        ("bg" = Option<String>, Query, description = "背景色，6 位十六进制（不含 #）"),
        ("fg" = Option<String>, Query, description = "前景色，6 位十六进制（不含 #）"),
        ("text" = Option<String>, Query, description = "自定义文字，默认显示尺寸")
    ),
    responses(
        (status = 200, description = "图片字节（png/jpeg/gif/webp），Content-Type 随格式变化"),
        (status = 400, description = "尺寸/格式/颜色参数非法", body = crate::error::ProblemDetails),
        (status = 429, description = "触发限流", body = crate::error::ProblemDetails),
        (status = 503, description = "内嵌字体不可用", body = crate::error::ProblemDetails),
        (status = 500, description = "编码失败", body = crate::error::ProblemDetails)
    ),
    tag = "Placeholder"
)]
pub async fn get_placeholder(
    State(state): State<AppState>,
    Path(size): Path<String>,
    RawQuery(raw_query): RawQuery,
) -> Result<impl IntoResponse, AppError> {
    let t_total = Instant::now();
    let (size_token, format_token) = split_size_token(&size);
    let q = parse_query(raw_query.as_deref());

    let request = validate(
        size_token,
        format_token,
        q.bg.as_deref(),
        q.fg.as_deref(),
        q.text.as_deref(),
    )?;

    let sem = state.render_semaphore.clone();
    let t_wait = Instant::now();
    let _permit = sem
        .acquire_owned()
        .await
        .map_err(|e| AppError::Internal(format!("获取渲染信号量失败: {e}")))?;
    let wait_ms = t_wait.elapsed().as_millis();

    // 栅格化与编码是 CPU 密集型操作，移出 tokio worker
    let service = state.image_service.clone();
    let generated = tokio::task::spawn_blocking(move || service.generate(&request))
        .await
        .map_err(|e| AppError::Internal(format!("渲染任务异常退出: {e}")))??;

    tracing::debug!(
        cache_hit = generated.cache_hit,
        bytes = generated.bytes.len(),
        "占位图请求完成: 信号量等待={}ms, 总耗时={:?}",
        wait_ms,
        t_total.elapsed()
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(generated.content_type()),
    );
    let cache_control = format!("public, max-age={}", state.cache_control_max_age_secs);
    if let Ok(v) = HeaderValue::from_str(&cache_control) {
        headers.insert(header::CACHE_CONTROL, v);
    }
    headers.insert(
        X_CACHE,
        HeaderValue::from_static(if generated.cache_hit { "HIT" } else { "MISS" }),
    );

    Ok((StatusCode::OK, headers, generated.bytes))
}

pub fn create_image_router() -> Router<AppState> {
    Router::new().route("/placeholder/:size", get(get_placeholder))
}
