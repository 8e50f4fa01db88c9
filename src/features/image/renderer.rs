use image::{Rgb as Pixel, RgbImage};

use super::font::{FontError, FontManager, GlyphRaster, MonoFallback};
use super::layout;
use super::types::{ImageRequest, Rgb};
use crate::error::PlaceholderError;

/// 渲染目标像素缓冲（不透明 RGB）
pub type PixelBuffer = RgbImage;

/// 借出 face 渲染请求；字号无法构造时退回内置点阵字体，字体程序不可用则整体失败。
pub fn render_request(
    request: &ImageRequest,
    fonts: &FontManager,
) -> Result<PixelBuffer, PlaceholderError> {
    let label = request.label();
    let size = layout::compute_font_size(request.width(), request.height(), label);

    match fonts.get_face(size) {
        Ok(face) => {
            let buffer = render(request, &face);
            fonts.release_face(face);
            Ok(buffer)
        }
        Err(FontError::Unavailable { name }) => Err(PlaceholderError::FontUnavailable(
            format!("内嵌字体 {name} 解析失败"),
        )),
        Err(e @ FontError::Face { .. }) => {
            tracing::warn!("{}，改用内置点阵字体", e);
            Ok(render(request, &MonoFallback::new(size)))
        }
    }
}

/// 填充背景并以前景色居中绘制文字
pub fn render(request: &ImageRequest, face: &dyn GlyphRaster) -> PixelBuffer {
    let (width, height) = (request.width(), request.height());
    let mut canvas = RgbImage::from_pixel(width, height, Pixel(request.background().channels()));

    let label = request.label();
    let (text_width, text_height) = face.measure(label);
    let (cx, cy) = layout::compute_anchor(width, height, f64::from(text_height));

    // 以文字中点对齐锚点：左边缘 = cx - w/2，基线 = cy + h/2
    let left = (cx - f64::from(text_width) / 2.0) as f32;
    let baseline = (cy + f64::from(text_height) / 2.0) as f32;

    let fg = request.foreground();
    face.rasterize(label, left, baseline, &mut |x, y, coverage| {
        blend(&mut canvas, x, y, fg, coverage);
    });
    canvas
}

fn blend(canvas: &mut RgbImage, x: i64, y: i64, color: Rgb, coverage: f32) {
    if x < 0 || y < 0 || x >= i64::from(canvas.width()) || y >= i64::from(canvas.height()) {
        return;
    }
    let alpha = coverage.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }
    let px = canvas.get_pixel_mut(x as u32, y as u32);
    for (dst, src) in px.0.iter_mut().zip(color.channels()) {
        let mixed = f32::from(*dst) * (1.0 - alpha) + f32::from(src) * alpha;
        *dst = mixed.round().clamp(0.0, 255.0) as u8;
    }
}
