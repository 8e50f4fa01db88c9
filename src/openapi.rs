use utoipa::openapi::server::{ServerBuilder, ServerVariableBuilder};
use utoipa::{Modify, OpenApi};

/// Swagger UI 的 Servers：业务接口带前缀，`/health` 走根路径。
struct ApiServers;

impl Modify for ApiServers {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let api = ServerBuilder::new()
            .url("{api_prefix}")
            .description(Some("占位图接口（默认 /api）"))
            .parameter(
                "api_prefix",
                ServerVariableBuilder::new()
                    .default_value("/api")
                    .description(Some("接口前缀：对应 config.api.prefix（APP_API__PREFIX）")),
            )
            .build();

        let root = ServerBuilder::new()
            .url("/")
            .description(Some("根路径（/health）"))
            .build();

        openapi.servers = Some(vec![api, root]);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::health_check,
        crate::features::image::handler::get_placeholder,
    ),
    components(schemas(
        crate::error::ProblemDetails,
        crate::features::health::handler::HealthResponse,
        crate::features::image::types::ImageFormat,
    )),
    modifiers(&ApiServers),
    tags(
        (name = "Placeholder", description = "占位图生成"),
        (name = "Health", description = "健康检查"),
    ),
    info(
        title = "Placeholder Image API",
        version = "0.1.0",
        description = "按尺寸、颜色与文字即时生成占位图（png/jpeg/gif/webp）"
    )
)]
pub struct ApiDoc;
