//! 字号与锚点计算。没有精细字体度量可用，全部基于画布尺寸与字符数的经验公式。

/// 文字目标占用宽度比例
const TARGET_WIDTH_RATIO: f64 = 0.85;
/// 平均字宽到字号的系数
const CHAR_WIDTH_TO_SIZE: f64 = 0.8;
/// 尺寸归一化基线（像素）
const DIMENSION_BASELINE: f64 = 200.0;
const MAX_FONT_SIZE: f64 = 150.0;
const MAX_FONT_RATIO: f64 = 0.4;
const MIN_FONT_SIZE: f64 = 12.0;
const MIN_FONT_RATIO: f64 = 0.02;

/// 视觉居中修正：锚点上移行高的 15%，抵消升部/降部带来的视觉下沉。
///
/// 经验值，按目测效果调校；不是字体的物理度量。
pub const VISUAL_CENTER_OFFSET: f64 = 0.15;

/// 根据画布尺寸与文字长度计算字号（pt，72 DPI 下等于像素）
pub fn compute_font_size(width: u32, height: u32, text: &str) -> f64 {
    let min_dim = f64::from(width.min(height));
    let glyph_count = text.chars().count().max(1) as f64;

    let avg_char_width = f64::from(width) * TARGET_WIDTH_RATIO / glyph_count;
    let dimension_scale = min_dim / DIMENSION_BASELINE;
    let base = avg_char_width * CHAR_WIDTH_TO_SIZE * dimension_scale;

    let max_size = MAX_FONT_SIZE.min(min_dim * MAX_FONT_RATIO);
    let min_size = MIN_FONT_SIZE.max(min_dim * MIN_FONT_RATIO);

    // 小画布上下限会交叉，此时下限优先（不能用 f64::clamp）
    let mut size = base;
    if size > max_size {
        size = max_size;
    }
    if size < min_size {
        size = min_size;
    }
    size
}

/// 文字中心点
pub fn compute_anchor(width: u32, height: u32, measured_text_height: f64) -> (f64, f64) {
    let x = f64::from(width) / 2.0;
    let y = f64::from(height) / 2.0 - measured_text_height * VISUAL_CENTER_OFFSET;
    (x, y)
}
