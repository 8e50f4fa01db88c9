use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PlaceholderError;

/// 单边最大像素
pub const MAX_DIMENSION: u32 = 3000;
/// 默认背景色（浅灰）
pub const DEFAULT_BACKGROUND: Rgb = Rgb::new(0xcc, 0xcc, 0xcc);
/// 默认前景色（深灰）
pub const DEFAULT_FOREGROUND: Rgb = Rgb::new(0x66, 0x66, 0x66);
/// 文本非法 UTF-8 时的替代文字
pub const INVALID_UTF8_LABEL: &str = "Invalid UTF-8";

static SIZE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([0-9]+)x([0-9]+)$").unwrap());
static COLOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{6}$").unwrap());

/// 输出图片格式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, utoipa::ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum ImageFormat {
    /// PNG（默认，无损）
    #[default]
    Png,
    /// JPEG（有损，质量 90）
    #[serde(alias = "jpg")]
    Jpeg,
    /// GIF（调色板量化）
    Gif,
    /// WebP（有损，质量 90）
    Webp,
}

impl ImageFormat {
    /// 规范化后的格式名
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = PlaceholderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "gif" => Ok(ImageFormat::Gif),
            "webp" => Ok(ImageFormat::Webp),
            _ => Err(PlaceholderError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 24 位 RGB 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// 解析 6 位十六进制颜色（不含 `#`，大小写不敏感）
    pub fn from_hex(raw: &str) -> Result<Self, PlaceholderError> {
        if !COLOR_RE.is_match(raw) {
            return Err(PlaceholderError::InvalidColor(raw.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&raw[i..i + 2], 16)
                .map_err(|_| PlaceholderError::InvalidColor(raw.to_string()))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn to_hex(&self) -> String {
        format!("{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn channels(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// 经过校验的占位图请求。构造后不可变。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    width: u32,
    height: u32,
    format: ImageFormat,
    background: Rgb,
    foreground: Rgb,
    /// 调用方解码后的原始字节，可能不是合法 UTF-8
    text: Vec<u8>,
}

impl ImageRequest {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn background(&self) -> Rgb {
        self.background
    }

    pub fn foreground(&self) -> Rgb {
        self.foreground
    }

    /// 原始文本字节（参与指纹计算）
    pub fn text_bytes(&self) -> &[u8] {
        &self.text
    }

    /// 用于测量与绘制的文字；非法 UTF-8 时替换为固定文案
    pub fn label(&self) -> &str {
        std::str::from_utf8(&self.text).unwrap_or(INVALID_UTF8_LABEL)
    }
}

/// 解析 `WxH` 尺寸
pub fn parse_size(token: &str) -> Result<(u32, u32), PlaceholderError> {
    let invalid = || {
        PlaceholderError::InvalidSize(format!(
            "{token}（应为 WIDTHxHEIGHT，范围 1x1 到 {MAX_DIMENSION}x{MAX_DIMENSION}）"
        ))
    };
    let caps = SIZE_RE.captures(token).ok_or_else(invalid)?;
    let width: u32 = caps[1].parse().map_err(|_| invalid())?;
    let height: u32 = caps[2].parse().map_err(|_| invalid())?;
    if !(1..=MAX_DIMENSION).contains(&width) || !(1..=MAX_DIMENSION).contains(&height) {
        return Err(invalid());
    }
    Ok((width, height))
}

/// 校验原始参数并应用默认值。
///
/// 空字符串与缺省等价。校验顺序：尺寸 → 格式 → 背景色 → 前景色。
pub fn validate(
    size_token: &str,
    format_token: Option<&str>,
    raw_bg: Option<&str>,
    raw_fg: Option<&str>,
    raw_text: Option<&[u8]>,
) -> Result<ImageRequest, PlaceholderError> {
    let (width, height) = parse_size(size_token)?;

    let format = match format_token.filter(|s| !s.is_empty()) {
        Some(token) => token.parse()?,
        None => ImageFormat::default(),
    };

    let background = match raw_bg.filter(|s| !s.is_empty()) {
        Some(hex) => Rgb::from_hex(hex)?,
        None => DEFAULT_BACKGROUND,
    };
    let foreground = match raw_fg.filter(|s| !s.is_empty()) {
        Some(hex) => Rgb::from_hex(hex)?,
        None => DEFAULT_FOREGROUND,
    };

    let text = match raw_text.filter(|t| !t.is_empty()) {
        Some(bytes) => bytes.to_vec(),
        None => format!("{width}x{height}").into_bytes(),
    };

    Ok(ImageRequest {
        width,
        height,
        format,
        background,
        foreground,
        text,
    })
}
