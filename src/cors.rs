use axum::http::{HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer, ExposeHeaders};

use crate::config::CorsConfig;

/// 解析后的列表项：`*` 或若干具体值
#[derive(Debug, PartialEq)]
enum Allow<T> {
    Any,
    List(Vec<T>),
}

impl<T> Allow<T> {
    fn is_any(&self) -> bool {
        matches!(self, Allow::Any)
    }

    fn is_empty(&self) -> bool {
        matches!(self, Allow::List(v) if v.is_empty())
    }
}

/// 逐项解析，跳过空白与非法值；出现 `*` 即视为任意
fn parse_list<T>(label: &str, values: &[String], parse: impl Fn(&str) -> Option<T>) -> Allow<T> {
    let mut items = Vec::new();
    for raw in values {
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        if value == "*" {
            return Allow::Any;
        }
        match parse(value) {
            Some(v) => items.push(v),
            None => tracing::warn!("CORS {} 含无效值: {}", label, value),
        }
    }
    Allow::List(items)
}

fn origin(v: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(v).ok()
}

fn method(v: &str) -> Option<Method> {
    Method::from_bytes(v.to_ascii_uppercase().as_bytes()).ok()
}

fn header_name(v: &str) -> Option<HeaderName> {
    HeaderName::from_bytes(v.to_ascii_lowercase().as_bytes()).ok()
}

/// 根据配置构建 CORS 中间件；禁用或配置无效时返回 `None`
pub fn build_cors_layer(cors: &CorsConfig) -> Option<CorsLayer> {
    if !cors.enabled {
        return None;
    }

    let origins = parse_list("allowed_origins", &cors.allowed_origins, origin);
    if origins.is_empty() {
        tracing::warn!("CORS 已启用但 allowed_origins 为空，已跳过启用");
        return None;
    }
    let methods = parse_list("allowed_methods", &cors.allowed_methods, method);
    let headers = parse_list("allowed_headers", &cors.allowed_headers, header_name);
    let expose = parse_list("expose_headers", &cors.expose_headers, header_name);

    if cors.allow_credentials
        && (origins.is_any() || methods.is_any() || headers.is_any() || expose.is_any())
    {
        tracing::error!("CORS 配置无效：allow_credentials=true 不能与 \"*\" 同时使用，已跳过启用");
        return None;
    }

    let mut layer = CorsLayer::new()
        .allow_origin(match origins {
            Allow::Any => AllowOrigin::from(Any),
            Allow::List(v) => AllowOrigin::list(v),
        })
        .allow_methods(match methods {
            Allow::Any => AllowMethods::from(Any),
            Allow::List(v) => AllowMethods::list(v),
        })
        .allow_headers(match headers {
            Allow::Any => AllowHeaders::from(Any),
            Allow::List(v) => AllowHeaders::list(v),
        })
        .expose_headers(match expose {
            Allow::Any => ExposeHeaders::from(Any),
            Allow::List(v) => ExposeHeaders::list(v),
        });

    if cors.allow_credentials {
        layer = layer.allow_credentials(true);
    }
    if let Some(secs) = cors.max_age_secs
        && secs > 0
    {
        layer = layer.max_age(Duration::from_secs(secs));
    }
    Some(layer)
}
