//! 文字转轮廓
//!
//! 用已加载的字体把文字内容转换为矢量模型：
//! - 原点位于第一行基线起点，y 向上
//! - 尺寸为真实单位（英寸）
//! - 每个字形是一个子模型，轮廓保持成组

use crate::config::TextSizing;
use crate::error::{ExportError, ExportResult};
use crate::font::{FontResource, LoadedFonts};
use crate::outline::ContourBuilder;
use ttf_parser::{Face, GlyphId};
use zcut_core::element::TextAlignment;
use zcut_core::error::CoreError;
use zcut_core::geometry::VectorModel;
use zcut_core::math::Point2;

/// 排版参数（真实单位）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextLayout {
    /// 每个字形之后额外的前进量
    pub letter_spacing: f64,
    /// 行距，字号的倍数
    pub line_height: f64,
    pub alignment: TextAlignment,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            letter_spacing: 0.0,
            line_height: 1.2,
            alignment: TextAlignment::Left,
        }
    }
}

/// 文字转换选项
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextOptions {
    pub layout: TextLayout,
    pub sizing: TextSizing,
    /// 曲线离散容差（真实单位）
    pub tolerance: f64,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            layout: TextLayout::default(),
            sizing: TextSizing::CapHeight,
            tolerance: zcut_core::math::DEFAULT_TOLERANCE,
        }
    }
}

/// 字体单位的轮廓命令，展平后再缩放到输出坐标
struct GlyphSink {
    builder: ContourBuilder,
}

impl GlyphSink {
    fn new(tolerance: f64) -> Self {
        Self {
            builder: ContourBuilder::new(tolerance),
        }
    }

    fn into_model(self, scale: f64, origin: Point2) -> VectorModel {
        let paths = self
            .builder
            .finish(|x, y| Point2::new(origin.x + x * scale, origin.y + y * scale));
        VectorModel::from_paths(paths)
    }
}

impl ttf_parser::OutlineBuilder for GlyphSink {
    fn move_to(&mut self, x: f32, y: f32) {
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

/// 字号对应的参考高度（字体单位）
fn reference_height(face: &Face<'_>, sizing: TextSizing) -> f64 {
    match sizing {
        TextSizing::Em => face.units_per_em() as f64,
        TextSizing::CapHeight => face
            .capital_height()
            .filter(|h| *h > 0)
            .map(|h| h as f64)
            // 旧版 OS/2 表没有 capHeight，量 'H' 的高度
            .or_else(|| {
                face.glyph_index('H')
                    .and_then(|gid| face.glyph_bounding_box(gid))
                    .map(|rect| rect.y_max as f64)
                    .filter(|h| *h > 0.0)
            })
            .or_else(|| Some(face.ascender() as f64).filter(|h| *h > 0.0))
            .unwrap_or(face.units_per_em() as f64),
    }
}

fn glyph_for(face: &Face<'_>, ch: char) -> GlyphId {
    face.glyph_index(ch).unwrap_or(GlyphId(0))
}

/// 单行宽度（真实单位）
fn line_width(face: &Face<'_>, line: &str, scale: f64, letter_spacing: f64) -> f64 {
    let count = line.chars().count();
    if count == 0 {
        return 0.0;
    }
    let advance: f64 = line
        .chars()
        .map(|ch| face.glyph_hor_advance(glyph_for(face, ch)).unwrap_or(0) as f64 * scale)
        .sum();
    advance + letter_spacing * (count - 1) as f64
}

fn glyph_name(ch: char) -> String {
    if ch.is_ascii_alphanumeric() {
        ch.to_string()
    } else {
        format!("u{:04X}", ch as u32)
    }
}

/// 用指定字体生成文字轮廓
pub fn outline_text(
    font: &FontResource,
    content: &str,
    size: f64,
    options: &TextOptions,
) -> ExportResult<VectorModel> {
    if !(size.is_finite() && size > 0.0) {
        return Err(ExportError::Core(CoreError::InvalidDimension {
            name: "font size",
            value: size,
        }));
    }

    let face = font.face()?;
    let scale = size / reference_height(&face, options.sizing);
    let layout = &options.layout;
    let line_advance = layout.line_height * size;

    let mut model = VectorModel::new();
    for (line_index, line) in content.split('\n').enumerate() {
        let line = line.trim_end_matches('\r');
        let width = line_width(&face, line, scale, layout.letter_spacing);
        let mut pen_x = match layout.alignment {
            TextAlignment::Left => 0.0,
            TextAlignment::Center => -width / 2.0,
            TextAlignment::Right => -width,
        };
        let baseline = -(line_index as f64) * line_advance;

        for ch in line.chars() {
            let gid = glyph_for(&face, ch);
            // 容差换算到字体单位
            let mut sink = GlyphSink::new(options.tolerance / scale);
            // 空白字形没有轮廓
            if face.outline_glyph(gid, &mut sink).is_some() {
                let glyph = sink.into_model(scale, Point2::new(pen_x, baseline));
                if !glyph.is_empty() {
                    model.add_model(&glyph_name(ch), glyph);
                }
            }
            let advance = face.glyph_hor_advance(gid).unwrap_or(0) as f64 * scale;
            pen_x += advance + layout.letter_spacing;
        }
    }

    tracing::debug!(
        "文字轮廓: {} 个字形, 字体 {}",
        model.models.len(),
        font.family()
    );
    Ok(model)
}

/// 文字 → 矢量模型；字体未加载时返回 [`ExportError::FontNotLoaded`]
pub fn text_to_path(
    fonts: &LoadedFonts,
    content: &str,
    font_family: &str,
    size: f64,
    options: &TextOptions,
) -> ExportResult<VectorModel> {
    let font = fonts.require(font_family)?;
    outline_text(font, content, size, options)
}
