use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use tower::ServiceExt;

use placeholder_api::{AppState, build_router, config::AppConfig};

fn build_app_with(config: AppConfig) -> Router {
    let state = AppState::from_config(&config.image);
    build_router(&config, state)
}

fn build_app() -> Router {
    build_app_with(AppConfig::default())
}

async fn get(app: &Router, uri: &str) -> Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .expect("call app")
}

async fn body_bytes(resp: Response) -> Vec<u8> {
    to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body")
        .to_vec()
}

async fn problem_code(resp: Response) -> String {
    assert_eq!(
        resp.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/problem+json")
    );
    let json: serde_json::Value =
        serde_json::from_slice(&body_bytes(resp).await).expect("parse json");
    json["code"].as_str().unwrap_or_default().to_string()
}

fn header_str<'a>(resp: &'a Response, name: &str) -> &'a str {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

#[tokio::test]
async fn default_png_has_background_and_centered_text() {
    let app = build_app();
    let resp = get(&app, "/api/placeholder/300x200").await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, "content-type"), "image/png");
    assert_eq!(header_str(&resp, "cache-control"), "public, max-age=31536000");
    assert_eq!(header_str(&resp, "x-cache"), "MISS");

    let img = image::load_from_memory(&body_bytes(resp).await)
        .expect("decode png")
        .to_rgb8();
    assert_eq!(img.dimensions(), (300, 200));
    assert_eq!(img.get_pixel(0, 0).0, [0xcc, 0xcc, 0xcc]);
    assert_eq!(img.get_pixel(299, 199).0, [0xcc, 0xcc, 0xcc]);

    let ink_in_center = (100..200)
        .flat_map(|x| (70..130).map(move |y| (x, y)))
        .any(|(x, y)| img.get_pixel(x, y).0 != [0xcc, 0xcc, 0xcc]);
    assert!(ink_in_center, "expected text pixels around the center");
}

#[tokio::test]
async fn jpeg_with_custom_colors_and_text() {
    let app = build_app();
    let resp = get(
        &app,
        "/api/placeholder/400x300.jpg?bg=ff0000&fg=ffffff&text=Test",
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, "content-type"), "image/jpeg");

    let img = image::load_from_memory(&body_bytes(resp).await)
        .expect("decode jpeg")
        .to_rgb8();
    assert_eq!(img.dimensions(), (400, 300));
    let [r, g, b] = img.get_pixel(2, 2).0;
    assert!(r > 240 && g < 16 && b < 16, "corner = {:?}", [r, g, b]);
}

#[tokio::test]
async fn every_format_returns_its_content_type() {
    let app = build_app();
    for (ext, ct) in [
        ("png", "image/png"),
        ("jpeg", "image/jpeg"),
        ("GIF", "image/gif"),
        ("webp", "image/webp"),
    ] {
        let resp = get(&app, &format!("/api/placeholder/64x32.{ext}")).await;
        assert_eq!(resp.status(), StatusCode::OK, "{ext}");
        assert_eq!(header_str(&resp, "content-type"), ct, "{ext}");
        let img = image::load_from_memory(&body_bytes(resp).await).expect("decode");
        assert_eq!((img.width(), img.height()), (64, 32), "{ext}");
    }
}

#[tokio::test]
async fn multiple_dots_fall_back_to_png() {
    let app = build_app();
    let resp = get(&app, "/api/placeholder/1x1.png.gz").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, "content-type"), "image/png");
    let img = image::load_from_memory(&body_bytes(resp).await).expect("decode png");
    assert_eq!((img.width(), img.height()), (1, 1));
}

#[tokio::test]
async fn invalid_inputs_map_to_problem_codes() {
    let app = build_app();
    for (uri, code) in [
        ("/api/placeholder/abcx200", "INVALID_SIZE"),
        ("/api/placeholder/0x10", "INVALID_SIZE"),
        ("/api/placeholder/3001x10", "INVALID_SIZE"),
        ("/api/placeholder/300x200.bmp", "UNSUPPORTED_FORMAT"),
        ("/api/placeholder/300x200?bg=zz0000", "INVALID_COLOR"),
        ("/api/placeholder/300x200?fg=%23ffffff", "INVALID_COLOR"),
    ] {
        let resp = get(&app, uri).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(problem_code(resp).await, code, "{uri}");
    }
}

#[tokio::test]
async fn size_error_wins_over_format_and_color_errors() {
    let app = build_app();
    let resp = get(&app, "/api/placeholder/0x0.bmp?bg=zz").await;
    assert_eq!(problem_code(resp).await, "INVALID_SIZE");
}

#[tokio::test]
async fn repeated_request_is_a_cache_hit_with_identical_bytes() {
    let app = build_app();
    let uri = "/api/placeholder/123x45.gif?bg=1e1e1e&fg=00ff00";

    let first = get(&app, uri).await;
    assert_eq!(header_str(&first, "x-cache"), "MISS");
    let first_bytes = body_bytes(first).await;

    let second = get(&app, uri).await;
    assert_eq!(header_str(&second, "x-cache"), "HIT");
    assert_eq!(body_bytes(second).await, first_bytes);
}

#[tokio::test]
async fn different_text_produces_different_images() {
    let app = build_app();
    let hello = body_bytes(get(&app, "/api/placeholder/200x100?text=Hello").await).await;
    let nihao = body_bytes(
        get(&app, "/api/placeholder/200x100?text=%E4%BD%A0%E5%A5%BD").await,
    )
    .await;
    let spaced = body_bytes(get(&app, "/api/placeholder/200x100?text=Hello+World").await).await;
    assert_ne!(hello, nihao);
    assert_ne!(hello, spaced);
}

#[tokio::test]
async fn cache_can_be_disabled() {
    let mut config = AppConfig::default();
    config.image.cache_enabled = false;
    let app = build_app_with(config);
    for _ in 0..2 {
        let resp = get(&app, "/api/placeholder/40x40").await;
        assert_eq!(header_str(&resp, "x-cache"), "MISS");
    }
}

#[tokio::test]
async fn rate_limit_rejects_excess_requests_per_path() {
    let mut config = AppConfig::default();
    config.rate_limit.max_requests = 2;
    config.rate_limit.window_secs = 60;
    let app = build_app_with(config);

    for _ in 0..2 {
        assert_eq!(get(&app, "/api/placeholder/10x10").await.status(), StatusCode::OK);
    }
    let limited = get(&app, "/api/placeholder/10x10").await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(problem_code(limited).await, "RATE_LIMITED");

    assert_eq!(get(&app, "/api/placeholder/11x10").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn custom_prefix_and_cache_control() {
    let mut config = AppConfig::default();
    config.api.prefix = "/img".to_string();
    config.image.cache_control_max_age_secs = 60;
    let app = build_app_with(config);

    let resp = get(&app, "/img/placeholder/20x20").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, "cache-control"), "public, max-age=60");
    assert_eq!(
        get(&app, "/api/placeholder/20x20").await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn health_reports_font_availability() {
    let app = build_app();
    let resp = get(&app, "/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["font_available"], true);
}

#[tokio::test]
async fn default_cors_allows_any_origin() {
    let app = build_app();
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/placeholder/10x10")
                .header(header::ORIGIN, "https://example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(header_str(&resp, "access-control-allow-origin"), "*");
    assert!(!header_str(&resp, "x-request-id").is_empty());
}
