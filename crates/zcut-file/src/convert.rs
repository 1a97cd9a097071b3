//! 坐标系转换
//!
//! 把编辑画布上的元素（像素，左上角原点，y 向下，顺时针旋转）转换为
//! 加工坐标系下的矢量模型（英寸，左下角原点，y 向上）。
//!
//! 每个元素依次执行：
//! 1. 绝对变换分解为平移/旋转/缩放（剪切分量丢弃并告警）
//! 2. 在局部原点构建基础模型（真实单位）
//! 3. 锚点补偿，使锚点落在局部原点
//! 4. 旋转取反（屏幕顺时针 → 加工逆时针）
//! 5. 平移并垂直翻转：`X = x / scale`，`Y = H - y / scale`
//!
//! 文字在基线坐标系（y 向上）中围绕字形包围盒内的锚点翻转；
//! 图稿与形状在自身 y 向下的局部坐标系中围绕左上角翻转。

use crate::config::TextSizing;
use crate::error::{ExportError, ExportResult};
use crate::font::LoadedFonts;
use crate::glyph::{text_to_path, TextLayout, TextOptions};
use crate::normalize::{normalize, NormalizeOptions};
use crate::source::SourceCache;
use zcut_core::element::{ArtworkPayload, DesignElement, ElementKind, ShapePrimitive, TextPayload};
use zcut_core::geometry::VectorModel;
use zcut_core::scale::CanvasFrame;
use zcut_core::scene::{BackgroundLayer, PlacedElement};
use zcut_core::transform::{Decomposed, Transform2D};

/// 一次导出共享的转换参数
pub struct ConvertContext<'a> {
    pub frame: &'a CanvasFrame,
    /// 像素/英寸，导出开始时由画布帧算出
    pub scale: f64,
    pub fonts: &'a LoadedFonts,
    pub sources: &'a SourceCache,
    pub text_sizing: TextSizing,
    /// 曲线离散容差（英寸）
    pub tolerance: f64,
}

/// 单个元素的转换结果
#[derive(Debug)]
pub struct Converted {
    pub model: VectorModel,
    /// 图稿退化为占位矩形时的原因
    pub degraded: Option<ExportError>,
}

/// 元素的标识，用于错误报告
fn element_label(element: &DesignElement) -> String {
    element.id.clone().unwrap_or_else(|| "<unnamed>".to_string())
}

fn element_source(element: &DesignElement) -> String {
    element
        .source_ref()
        .or_else(|| element.font_family())
        .unwrap_or("-")
        .to_string()
}

fn conversion_failed(element: &DesignElement, reason: impl std::fmt::Display) -> ExportError {
    ExportError::ModelConversionFailed {
        id: element_label(element),
        kind: element.kind.type_name(),
        source_ref: element_source(element),
        reason: reason.to_string(),
    }
}

impl ConvertContext<'_> {
    /// 画布像素位置 → 加工坐标（含翻转）
    fn placement(&self, d: &Decomposed) -> Transform2D {
        Transform2D::translation(
            d.translation.x / self.scale,
            self.frame.real_height - d.translation.y / self.scale,
        )
    }

    /// 转换一个已定位的元素
    pub async fn convert(&self, placed: &PlacedElement<'_>) -> ExportResult<Converted> {
        let element = placed.element;
        let d = placed
            .decompose()
            .map_err(|e| conversion_failed(element, e))?;
        if d.has_skew() {
            tracing::warn!(
                "元素 {} 的变换含剪切分量 {:.4} rad，已忽略",
                element_label(element),
                d.skew
            );
        }

        let converted = match &element.kind {
            ElementKind::Text(text) => self.convert_text(element, text, &d)?,
            ElementKind::VectorArtwork(art) => self.convert_artwork(art, &d, element).await,
            ElementKind::RasterImage(art) => self.convert_raster(art, &d, element),
            ElementKind::Shape(shape) => self.convert_shape(&shape.primitive, &d, element),
        };

        if converted.model.is_empty() {
            tracing::debug!("元素 {} 没有几何", element_label(element));
        }
        if !converted.model.is_finite() {
            return Err(conversion_failed(element, "non-finite coordinates"));
        }
        Ok(converted)
    }

    fn convert_text(
        &self,
        element: &DesignElement,
        text: &TextPayload,
        d: &Decomposed,
    ) -> ExportResult<Converted> {
        let options = TextOptions {
            layout: TextLayout {
                letter_spacing: text.letter_spacing / self.scale,
                line_height: text.line_height,
                alignment: text.alignment,
            },
            sizing: self.text_sizing,
            tolerance: self.tolerance,
        };
        let size = text.font_size / self.scale;
        let mut model = text_to_path(self.fonts, &text.content, &text.font_family, size, &options)
            .map_err(|e| match e {
                ExportError::FontNotLoaded(_) => e,
                other => conversion_failed(element, other),
            })?;

        model.scale(d.scale_x, d.scale_y, self.tolerance);
        let bbox = model.bounding_box();
        if bbox.is_empty() {
            // 纯空白文字：只保留位置
            return Ok(Converted {
                model,
                degraded: None,
            });
        }

        // 包围盒内的锚点（y 向上：顶边为 max.y）
        let (ax, ay) = element.anchor.factors();
        let anchor_x = bbox.min.x + ax * bbox.width();
        let anchor_y = bbox.max.y - ay * bbox.height();

        let t = Transform2D::translation(-anchor_x, -anchor_y)
            .then(&Transform2D::rotation(-d.rotation))
            .then(&self.placement(d));
        model.transform(&t, self.tolerance);
        Ok(Converted {
            model,
            degraded: None,
        })
    }

    /// 图稿与形状共用：基础模型左上角在原点，y 向下
    fn place_box(
        &self,
        mut model: VectorModel,
        natural_width: f64,
        natural_height: f64,
        element: &DesignElement,
        d: &Decomposed,
    ) -> VectorModel {
        let w = natural_width * d.scale_x;
        let h = natural_height * d.scale_y;
        let (ax, ay) = element.anchor.factors();

        let t = Transform2D::scale(d.scale_x, d.scale_y)
            // 围绕左上角翻转为 y 向上
            .then(&Transform2D::scale(1.0, -1.0))
            .then(&Transform2D::translation(-ax * w, ay * h))
            .then(&Transform2D::rotation(-d.rotation))
            .then(&self.placement(d));
        model.transform(&t, self.tolerance);
        model
    }

    async fn convert_artwork(
        &self,
        art: &ArtworkPayload,
        d: &Decomposed,
        element: &DesignElement,
    ) -> Converted {
        let (w, h) = (art.natural_width / self.scale, art.natural_height / self.scale);
        let normalized = normalize(
            self.sources,
            &art.source,
            w,
            h,
            &NormalizeOptions {
                tolerance: self.tolerance,
            },
        )
        .await;
        Converted {
            model: self.place_box(normalized.model, w, h, element, d),
            degraded: normalized.degraded,
        }
    }

    /// 位图没有可加工的轮廓，输出其外框
    fn convert_raster(
        &self,
        art: &ArtworkPayload,
        d: &Decomposed,
        element: &DesignElement,
    ) -> Converted {
        let (w, h) = (art.natural_width / self.scale, art.natural_height / self.scale);
        tracing::debug!("位图 {} 以外框输出", art.source);
        Converted {
            model: self.place_box(VectorModel::rectangle(w, h), w, h, element, d),
            degraded: None,
        }
    }

    fn convert_shape(
        &self,
        primitive: &ShapePrimitive,
        d: &Decomposed,
        element: &DesignElement,
    ) -> Converted {
        let (pw, ph) = primitive.size();
        let (w, h) = (pw / self.scale, ph / self.scale);
        let model = primitive.build_model(1.0 / self.scale, self.tolerance);
        Converted {
            model: self.place_box(model, w, h, element, d),
            degraded: None,
        }
    }

    /// 背景层：按真实尺寸归一化，左上角对齐画布帧左上角，与图稿相同方式翻转
    pub async fn convert_background(&self, layer: &BackgroundLayer) -> Converted {
        let normalized = normalize(
            self.sources,
            &layer.source,
            layer.real_width,
            layer.real_height,
            &NormalizeOptions {
                tolerance: self.tolerance,
            },
        )
        .await;
        let mut model = normalized.model;
        let t = Transform2D::scale(1.0, -1.0)
            .then(&Transform2D::translation(0.0, self.frame.real_height));
        model.transform(&t, self.tolerance);
        Converted {
            model,
            degraded: normalized.degraded,
        }
    }
}
