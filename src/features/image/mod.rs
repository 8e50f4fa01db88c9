pub mod cache;
pub mod encoder;
pub mod font;
pub mod handler;
pub mod layout;
pub mod renderer;
pub mod service;
pub mod types;

/// 启动期预热内嵌字体：解析字体程序并填满 face 池。
///
/// 解析失败时返回错误，调用方应终止启动（此后任何请求都无法成功）。
pub fn prewarm_font() -> Result<&'static str, font::FontError> {
    let program = font::embedded().program()?;
    Ok(program.name())
}

pub use cache::{CacheKey, ResultCache};
pub use font::FontManager;
pub use handler::create_image_router;
pub use service::{GeneratedImage, ImageService};
pub use types::{ImageFormat, ImageRequest, Rgb, validate};
