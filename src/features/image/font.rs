//! 字体资源管理
//!
//! - 内嵌字体在进程内只解析一次（`OnceLock`），解析失败的结果同样被缓存并回放给所有调用方；
//! - `FontFace` 绑定一个字号，每次请求都按精确字号构造，池只在字号完全一致时复用；
//! - 字号无法构造时由渲染器退回到内置点阵字体（`MonoFallback`）。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock};

use embedded_graphics::{
    Pixel,
    mono_font::{MonoFont, MonoTextStyle, ascii::FONT_10X20},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use rusttype::{Font, Scale, VMetrics, point};
use thiserror::Error;

/// 编译期内嵌的唯一字体
pub static EMBEDDED_FONT: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/resources/fonts/DejaVuSans-Bold.ttf"
));

/// 池中预热的字号
pub const DEFAULT_POINT_SIZE: f64 = 24.0;
/// 默认池容量
pub const DEFAULT_POOL_SIZE: usize = 32;

static EMBEDDED: FontSource = FontSource::new("DejaVuSans-Bold", EMBEDDED_FONT);

/// 进程级内嵌字体来源
pub fn embedded() -> &'static FontSource {
    &EMBEDDED
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FontError {
    /// 字体程序解析失败，对所有请求致命
    #[error("字体 {name} 解析失败")]
    Unavailable { name: &'static str },

    /// 指定字号无法构造 face
    #[error("无法以 {size} pt 构造字体: {reason}")]
    Face { size: f64, reason: String },
}

/// 解析后的字体程序，只读共享
pub struct FontProgram {
    name: &'static str,
    font: Font<'static>,
    units_per_em: f32,
    unscaled: VMetrics,
}

impl FontProgram {
    fn parse(name: &'static str, data: &'static [u8]) -> Result<Self, FontError> {
        let font = Font::try_from_bytes(data).ok_or(FontError::Unavailable { name })?;
        let units_per_em = f32::from(font.units_per_em());
        if units_per_em <= 0.0 || font.glyph_count() == 0 {
            return Err(FontError::Unavailable { name });
        }
        let unscaled = font.v_metrics_unscaled();
        Ok(Self {
            name,
            font,
            units_per_em,
            unscaled,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// 字体数据 + 一次性解析结果
pub struct FontSource {
    name: &'static str,
    data: &'static [u8],
    program: OnceLock<Result<FontProgram, FontError>>,
    parse_attempts: AtomicUsize,
}

impl FontSource {
    pub const fn new(name: &'static str, data: &'static [u8]) -> Self {
        Self {
            name,
            data,
            program: OnceLock::new(),
            parse_attempts: AtomicUsize::new(0),
        }
    }

    /// 获取解析后的字体程序；首次调用者完成解析前，其余并发调用者阻塞等待
    pub fn program(&self) -> Result<&FontProgram, FontError> {
        self.program
            .get_or_init(|| {
                self.parse_attempts.fetch_add(1, Ordering::Relaxed);
                let t0 = std::time::Instant::now();
                let parsed = FontProgram::parse(self.name, self.data);
                match &parsed {
                    Ok(_) => tracing::info!(
                        "字体 {} 解析完成: {} 字节, 耗时 {:?}",
                        self.name,
                        self.data.len(),
                        t0.elapsed()
                    ),
                    Err(e) => tracing::error!("{}", e),
                }
                parsed
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// 实际执行过的解析次数（至多为 1）
    pub fn parse_attempts(&self) -> usize {
        self.parse_attempts.load(Ordering::Relaxed)
    }
}

/// 测量与栅格化文字的统一接口
pub trait GlyphRaster {
    /// 返回（前进宽度，行高），单位像素
    fn measure(&self, text: &str) -> (f32, f32);

    /// 以 `left` 为起点、`baseline` 为基线输出每个像素的覆盖率（0..=1）
    fn rasterize(&self, text: &str, left: f32, baseline: f32, plot: &mut dyn FnMut(i64, i64, f32));
}

/// 绑定单一字号的栅格化句柄
#[derive(Clone)]
pub struct FontFace {
    font: Font<'static>,
    point_size: f64,
    scale: Scale,
    v_metrics: VMetrics,
}

impl FontFace {
    /// 72 DPI 下 1pt = 1px。
    ///
    /// rusttype 的 Scale 以 ascent-descent 为单位，这里换算回 em。
    pub fn new(program: &FontProgram, point_size: f64) -> Result<Self, FontError> {
        if !point_size.is_finite() || point_size <= 0.0 {
            return Err(FontError::Face {
                size: point_size,
                reason: "字号必须为正的有限值".to_string(),
            });
        }
        let em_px = point_size as f32;
        let extent = (program.unscaled.ascent - program.unscaled.descent) / program.units_per_em;
        let scale = Scale::uniform(em_px * extent);
        if !scale.y.is_finite() || scale.y <= 0.0 {
            return Err(FontError::Face {
                size: point_size,
                reason: "字体纵向度量异常".to_string(),
            });
        }
        let v_metrics = program.font.v_metrics(scale);
        Ok(Self {
            font: program.font.clone(),
            point_size,
            scale,
            v_metrics,
        })
    }

    pub fn point_size(&self) -> f64 {
        self.point_size
    }

    fn same_size(&self, point_size: f64) -> bool {
        self.point_size.to_bits() == point_size.to_bits()
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("point_size", &self.point_size)
            .finish_non_exhaustive()
    }
}

impl GlyphRaster for FontFace {
    fn measure(&self, text: &str) -> (f32, f32) {
        let width = self
            .font
            .layout(text, self.scale, point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0);
        let height = self.v_metrics.ascent - self.v_metrics.descent + self.v_metrics.line_gap;
        (width, height)
    }

    fn rasterize(&self, text: &str, left: f32, baseline: f32, plot: &mut dyn FnMut(i64, i64, f32)) {
        for glyph in self.font.layout(text, self.scale, point(left, baseline)) {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|x, y, v| {
                    plot(i64::from(bb.min.x) + i64::from(x), i64::from(bb.min.y) + i64::from(y), v)
                });
            }
        }
    }
}

/// 内置点阵字体，按字号最近邻放大。不依赖任何字体文件。
pub struct MonoFallback {
    font: &'static MonoFont<'static>,
    factor: f32,
}

impl MonoFallback {
    pub fn new(point_size: f64) -> Self {
        let font = &FONT_10X20;
        let cell_h = font.character_size.height as f32;
        let size = if point_size.is_finite() && point_size > 0.0 {
            point_size as f32
        } else {
            cell_h
        };
        Self {
            font,
            factor: size / cell_h,
        }
    }

    fn advance(&self) -> u32 {
        self.font.character_size.width + self.font.character_spacing
    }
}

impl GlyphRaster for MonoFallback {
    fn measure(&self, text: &str) -> (f32, f32) {
        let chars = text.chars().count() as f32;
        (
            chars * self.advance() as f32 * self.factor,
            self.font.character_size.height as f32 * self.factor,
        )
    }

    fn rasterize(&self, text: &str, left: f32, baseline: f32, plot: &mut dyn FnMut(i64, i64, f32)) {
        let chars = text.chars().count() as u32;
        if chars == 0 {
            return;
        }
        let mut mask = BitMask::new(chars * self.advance(), self.font.character_size.height);
        let style = MonoTextStyle::new(self.font, BinaryColor::On);
        // BitMask 的 Error 为 Infallible
        let _ = Text::with_baseline(text, Point::zero(), style, Baseline::Top).draw(&mut mask);

        let top = baseline - self.font.baseline as f32 * self.factor;
        let dst_w = (mask.width as f32 * self.factor).ceil() as i64;
        let dst_h = (mask.height as f32 * self.factor).ceil() as i64;
        let (x0, y0) = (left.round() as i64, top.round() as i64);
        for dy in 0..dst_h {
            let sy = ((dy as f32 / self.factor) as u32).min(mask.height - 1);
            for dx in 0..dst_w {
                let sx = ((dx as f32 / self.factor) as u32).min(mask.width - 1);
                if mask.get(sx, sy) {
                    plot(x0 + dx, y0 + dy, 1.0);
                }
            }
        }
    }
}

/// 单色位图绘制目标
struct BitMask {
    width: u32,
    height: u32,
    bits: Vec<bool>,
}

impl BitMask {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; (width * height) as usize],
        }
    }

    fn get(&self, x: u32, y: u32) -> bool {
        self.bits[(y * self.width + x) as usize]
    }
}

impl OriginDimensions for BitMask {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for BitMask {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(p, color) in pixels {
            if color.is_on()
                && p.x >= 0
                && p.y >= 0
                && (p.x as u32) < self.width
                && (p.y as u32) < self.height
            {
                self.bits[(p.y as u32 * self.width + p.x as u32) as usize] = true;
            }
        }
        Ok(())
    }
}

/// 字体 face 借出/归还管理器
pub struct FontManager {
    source: &'static FontSource,
    pool: Mutex<VecDeque<FontFace>>,
    capacity: usize,
}

impl FontManager {
    /// 使用进程内嵌字体
    pub fn new(pool_size: usize) -> Self {
        Self::with_source(embedded(), pool_size)
    }

    /// 指定字体来源并按默认字号预填充池；字体不可用时池保持为空
    pub fn with_source(source: &'static FontSource, pool_size: usize) -> Self {
        let mut pool = VecDeque::with_capacity(pool_size);
        match source.program() {
            Ok(program) => {
                for _ in 0..pool_size {
                    if let Ok(face) = FontFace::new(program, DEFAULT_POINT_SIZE) {
                        pool.push_back(face);
                    }
                }
            }
            Err(e) => tracing::warn!("字体池预填充跳过: {}", e),
        }
        Self {
            source,
            pool: Mutex::new(pool),
            capacity: pool_size,
        }
    }

    /// 借出一个精确字号的 face。池中只有同字号的 face 才会被复用。
    pub fn get_face(&self, point_size: f64) -> Result<FontFace, FontError> {
        let program = self.source.program()?;
        if let Some(face) = self.take_pooled(point_size) {
            return Ok(face);
        }
        FontFace::new(program, point_size)
    }

    /// 归还 face；池满时直接丢弃
    pub fn release_face(&self, face: FontFace) {
        if let Ok(mut pool) = self.pool.lock()
            && pool.len() < self.capacity
        {
            pool.push_back(face);
        }
    }

    /// 字体程序是否可用（首次调用会触发解析）
    pub fn is_available(&self) -> bool {
        self.source.program().is_ok()
    }

    pub fn pooled(&self) -> usize {
        self.pool.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn take_pooled(&self, point_size: f64) -> Option<FontFace> {
        let mut pool = self.pool.lock().ok()?;
        let idx = pool.iter().position(|f| f.same_size(point_size))?;
        pool.remove(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    static BROKEN: FontSource = FontSource::new("broken", b"definitely not a font");

    #[test]
    fn embedded_font_parses_once() {
        let source = embedded();
        assert!(source.program().is_ok());
        assert!(source.program().is_ok());
        assert_eq!(source.parse_attempts(), 1);
    }

    #[test]
    fn parse_failure_is_cached_and_replayed() {
        let first = BROKEN.program().err().unwrap();
        let second = BROKEN.program().err().unwrap();
        assert_eq!(first, second);
        assert!(matches!(first, FontError::Unavailable { name: "broken" }));
        assert_eq!(BROKEN.parse_attempts(), 1);

        let manager = FontManager::with_source(&BROKEN, 4);
        assert_eq!(manager.pooled(), 0);
        assert!(!manager.is_available());
        assert!(matches!(
            manager.get_face(24.0),
            Err(FontError::Unavailable { .. })
        ));
    }

    #[test]
    fn concurrent_first_callers_share_one_parse() {
        static LOCAL: FontSource = FontSource::new("local", EMBEDDED_FONT);
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| LOCAL.program().map(|p| p.name())))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), Ok("local"));
        }
        assert_eq!(LOCAL.parse_attempts(), 1);
    }

    #[test]
    fn face_always_matches_requested_size() {
        let manager = FontManager::new(4);
        assert_eq!(manager.pooled(), 4);

        let face = manager.get_face(37.5).unwrap();
        assert_eq!(face.point_size(), 37.5);
        // 非默认字号不消耗池
        assert_eq!(manager.pooled(), 4);

        let pooled = manager.get_face(DEFAULT_POINT_SIZE).unwrap();
        assert_eq!(pooled.point_size(), DEFAULT_POINT_SIZE);
        assert_eq!(manager.pooled(), 3);
        manager.release_face(pooled);
        assert_eq!(manager.pooled(), 4);
    }

    #[test]
    fn release_on_full_pool_drops_face() {
        let manager = FontManager::new(2);
        let extra = manager.get_face(50.0).unwrap();
        manager.release_face(extra);
        assert_eq!(manager.pooled(), 2);
        assert_eq!(manager.capacity(), 2);
    }

    #[test]
    fn reused_face_of_new_size_is_found_again() {
        let manager = FontManager::new(1);
        let default = manager.get_face(DEFAULT_POINT_SIZE).unwrap();
        let custom = manager.get_face(61.25).unwrap();
        drop(default);
        manager.release_face(custom);
        let again = manager.get_face(61.25).unwrap();
        assert_eq!(again.point_size(), 61.25);
        assert_eq!(manager.pooled(), 0);
    }

    #[test]
    fn invalid_sizes_fail_face_construction() {
        let manager = FontManager::new(0);
        for size in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                manager.get_face(size),
                Err(FontError::Face { .. })
            ));
        }
    }

    #[test]
    fn pool_is_safe_under_concurrent_use() {
        let manager = Arc::new(FontManager::new(8));
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let m = Arc::clone(&manager);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        let size = if i % 2 == 0 { DEFAULT_POINT_SIZE } else { 30.0 };
                        let face = m.get_face(size).unwrap();
                        assert_eq!(face.point_size(), size);
                        m.release_face(face);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(manager.pooled() <= 8);
    }

    #[test]
    fn face_measures_scale_with_size() {
        let program = embedded().program().unwrap();
        let small = FontFace::new(program, 12.0).unwrap();
        let large = FontFace::new(program, 48.0).unwrap();
        let (sw, sh) = small.measure("300x200");
        let (lw, lh) = large.measure("300x200");
        assert!(sw > 0.0 && sh > 0.0);
        assert!((lw / sw - 4.0).abs() < 0.2, "{sw} {lw}");
        assert!((lh / sh - 4.0).abs() < 0.2, "{sh} {lh}");
        assert_eq!(small.measure("").0, 0.0);
    }

    #[test]
    fn fallback_scales_cell_to_point_size() {
        let fallback = MonoFallback::new(40.0);
        let (w, h) = fallback.measure("abcd");
        assert!((h - 40.0).abs() < 1e-3);
        assert!((w - 80.0).abs() < 1e-3);

        let mut lit = 0usize;
        fallback.rasterize("A", 0.0, 30.0, &mut |_, _, v| {
            if v > 0.0 {
                lit += 1;
            }
        });
        assert!(lit > 0);
    }
}
