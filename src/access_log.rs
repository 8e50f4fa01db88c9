use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::request_id::RequestId;

/// 访问日志中间件：每个请求一行，target 为 `placeholder_api::access`
pub async fn access_log_middleware(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|r| r.as_str().to_string())
        .unwrap_or_default();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());
    let client_ip = client_ip_from_headers(req.headers())
        .map(str::to_string)
        .or(peer)
        .unwrap_or_else(|| "-".to_string());

    let res = next.run(req).await;

    tracing::info!(
        target: "placeholder_api::access",
        method = %method,
        uri = %uri,
        status = res.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        client_ip = %client_ip,
        request_id = %request_id,
        "{} {} {}",
        method,
        uri,
        res.status().as_u16()
    );
    res
}

/// 反代场景下优先取 X-Forwarded-For 首项，其次 X-Real-IP
fn client_ip_from_headers(headers: &HeaderMap) -> Option<&str> {
    if let Some(ip) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next().map(|s| s.trim()))
        && !ip.is_empty()
    {
        return Some(ip);
    }
    if let Some(v) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let s = v.trim();
        if !s.is_empty() {
            return Some(s);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::client_ip_from_headers;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn client_ip_prefers_x_forwarded_for_first_item() {
        let mut h = HeaderMap::new();
        h.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 1.2.3.4 , 5.6.7.8 "),
        );
        h.insert("x-real-ip", HeaderValue::from_static("9.9.9.9"));
        assert_eq!(client_ip_from_headers(&h), Some("1.2.3.4"));
    }

    #[test]
    fn client_ip_falls_back_to_x_real_ip() {
        let mut h = HeaderMap::new();
        h.insert("x-real-ip", HeaderValue::from_static(" 9.9.9.9 "));
        assert_eq!(client_ip_from_headers(&h), Some("9.9.9.9"));
    }

    #[test]
    fn client_ip_returns_none_for_missing_or_non_utf8() {
        assert_eq!(client_ip_from_headers(&HeaderMap::new()), None);

        let mut h = HeaderMap::new();
        h.insert(
            "x-forwarded-for",
            HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap(),
        );
        assert_eq!(client_ip_from_headers(&h), None);
    }
}
