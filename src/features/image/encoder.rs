use image::ExtendedColorType;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;

use super::renderer::PixelBuffer;
use super::types::ImageFormat;
use crate::error::PlaceholderError;

/// JPEG 质量（0-100）
pub const JPEG_QUALITY: u8 = 90;
/// WebP 有损质量（0-100）
pub const WEBP_QUALITY: f32 = 90.0;

/// 将像素缓冲编码为目标格式
pub fn encode(buffer: &PixelBuffer, format: ImageFormat) -> Result<Vec<u8>, PlaceholderError> {
    let (w, h) = buffer.dimensions();
    let expected = w as usize * h as usize * 3;
    if w == 0 || h == 0 || buffer.as_raw().len() != expected {
        return Err(PlaceholderError::Encoding(format!(
            "像素缓冲尺寸异常: {w}x{h}, {} 字节",
            buffer.as_raw().len()
        )));
    }

    match format {
        ImageFormat::Png => encode_png(buffer),
        ImageFormat::Jpeg => encode_jpeg(buffer),
        ImageFormat::Gif => encode_gif(buffer),
        ImageFormat::Webp => encode_webp(buffer),
    }
}

fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>, PlaceholderError> {
    let (w, h) = buffer.dimensions();
    let mut out = Vec::with_capacity(buffer.as_raw().len() / 4);
    {
        let mut encoder = png::Encoder::new(&mut out, w, h);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Default);
        let mut writer = encoder
            .write_header()
            .map_err(|e| PlaceholderError::Encoding(format!("PNG write_header error: {e}")))?;
        writer
            .write_image_data(buffer.as_raw())
            .map_err(|e| PlaceholderError::Encoding(format!("PNG write_image_data error: {e}")))?;
        writer
            .finish()
            .map_err(|e| PlaceholderError::Encoding(format!("PNG finish error: {e}")))?;
    }
    Ok(out)
}

fn encode_jpeg(buffer: &PixelBuffer) -> Result<Vec<u8>, PlaceholderError> {
    let (w, h) = buffer.dimensions();
    let mut out = Vec::new();
    let mut enc = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    enc.encode(buffer.as_raw(), w, h, ExtendedColorType::Rgb8)
        .map_err(|e| PlaceholderError::Encoding(format!("JPEG encode error: {e}")))?;
    Ok(out)
}

/// 单帧、默认调色板量化，不写循环扩展
fn encode_gif(buffer: &PixelBuffer) -> Result<Vec<u8>, PlaceholderError> {
    let (w, h) = buffer.dimensions();
    let mut out = Vec::new();
    {
        let mut enc = GifEncoder::new(&mut out);
        enc.encode(buffer.as_raw(), w, h, ExtendedColorType::Rgb8)
            .map_err(|e| PlaceholderError::Encoding(format!("GIF encode error: {e}")))?;
    }
    Ok(out)
}

fn encode_webp(buffer: &PixelBuffer) -> Result<Vec<u8>, PlaceholderError> {
    let (w, h) = buffer.dimensions();
    let memory = webp::Encoder::from_rgb(buffer.as_raw(), w, h)
        .encode_simple(false, WEBP_QUALITY)
        .map_err(|e| PlaceholderError::Encoding(format!("WebP encode error: {e:?}")))?;
    Ok(memory.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample() -> PixelBuffer {
        let mut buf = RgbImage::from_pixel(64, 48, Rgb([0xcc, 0xcc, 0xcc]));
        for x in 20..44 {
            for y in 16..32 {
                buf.put_pixel(x, y, Rgb([0x66, 0x66, 0x66]));
            }
        }
        buf
    }

    #[test]
    fn png_is_lossless() {
        let buf = sample();
        let bytes = encode(&buf, ImageFormat::Png).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
        assert_eq!(decoded, buf);
    }

    #[test]
    fn lossy_formats_decode_to_same_dimensions() {
        let buf = sample();
        for (format, magic) in [
            (ImageFormat::Jpeg, &b"\xff\xd8"[..]),
            (ImageFormat::Gif, &b"GIF8"[..]),
            (ImageFormat::Webp, &b"RIFF"[..]),
        ] {
            let bytes = encode(&buf, format).unwrap();
            assert!(bytes.starts_with(magic), "{format}");
            let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();
            assert_eq!(decoded.dimensions(), (64, 48), "{format}");
            let corner = decoded.get_pixel(0, 0).0;
            for c in corner {
                assert!((i16::from(c) - 0xcc).abs() <= 8, "{format}: {corner:?}");
            }
        }
    }

    #[test]
    fn mismatched_buffer_is_an_encoding_error() {
        let broken = RgbImage::from_raw(0, 0, Vec::new()).unwrap();
        assert!(matches!(
            encode(&broken, ImageFormat::Png),
            Err(PlaceholderError::Encoding(_))
        ));
    }
}
