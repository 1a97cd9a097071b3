//! 文档组装
//!
//! 背景层在前，元素按 z 序在后，逐个转换后以唯一名称加入文档。
//! 单个元素失败只跳过该元素，不影响其余元素。

use crate::config::ExportFormat;
use crate::convert::ConvertContext;
use crate::document::ManufacturingDocument;
use crate::error::{ExportError, ExportResult};
use crate::{dxf_io, svg_io};
use zcut_core::element::DesignElement;
use zcut_core::scene::{BackgroundLayer, PlacedElement};

/// 被跳过的元素
#[derive(Debug)]
pub struct SkippedElement {
    pub id: Option<String>,
    pub kind: &'static str,
    pub error: ExportError,
}

/// 以占位几何输出的元素
#[derive(Debug)]
pub struct DegradedElement {
    /// 文档中的模型名
    pub model: String,
    pub error: ExportError,
}

/// 组装结果与诊断信息
#[derive(Debug)]
pub struct AssemblyReport {
    pub document: ManufacturingDocument,
    pub skipped: Vec<SkippedElement>,
    pub degraded: Vec<DegradedElement>,
}

impl AssemblyReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.degraded.is_empty()
    }
}

/// 未设置 id 的元素生成名称
fn generated_name(element: &DesignElement) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", element.kind.type_name(), &id[..8])
}

/// 组装加工文档
pub async fn assemble(
    ctx: &ConvertContext<'_>,
    name: &str,
    backgrounds: &[BackgroundLayer],
    elements: &[PlacedElement<'_>],
) -> AssemblyReport {
    let frame = ctx.frame;
    let mut document = ManufacturingDocument::new(name, frame.real_width, frame.real_height);
    let mut skipped = Vec::new();
    let mut degraded = Vec::new();

    for layer in backgrounds {
        let converted = ctx.convert_background(layer).await;
        let base = layer.name.as_deref().unwrap_or("background");
        let model_name = document.add_model(base, converted.model);
        if let Some(error) = converted.degraded {
            degraded.push(DegradedElement {
                model: model_name,
                error,
            });
        }
    }

    for placed in elements {
        let element = placed.element;
        match ctx.convert(placed).await {
            Ok(converted) => {
                let base = match &element.id {
                    Some(id) => id.clone(),
                    None => generated_name(element),
                };
                let model_name = document.add_model(&base, converted.model);
                tracing::debug!("已添加模型 {}", model_name);
                if let Some(error) = converted.degraded {
                    degraded.push(DegradedElement {
                        model: model_name,
                        error,
                    });
                }
            }
            Err(error) => {
                tracing::warn!(
                    "跳过元素 {} ({}): {}",
                    element.id.as_deref().unwrap_or("<unnamed>"),
                    element.kind.type_name(),
                    error
                );
                skipped.push(SkippedElement {
                    id: element.id.clone(),
                    kind: element.kind.type_name(),
                    error,
                });
            }
        }
    }

    tracing::info!(
        "文档组装完成: {} 个模型, 跳过 {}, 降级 {}",
        document.len(),
        skipped.len(),
        degraded.len()
    );

    AssemblyReport {
        document,
        skipped,
        degraded,
    }
}

/// 序列化为指定格式
pub fn serialize(document: &ManufacturingDocument, format: ExportFormat) -> ExportResult<Vec<u8>> {
    match format {
        ExportFormat::Dxf => dxf_io::export(document),
        ExportFormat::Svg => svg_io::export(document),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextSizing;
    use crate::font::LoadedFonts;
    use crate::source::{SourceCache, SourceFetcher};
    use async_trait::async_trait;
    use std::sync::Arc;
    use zcut_core::element::ShapePrimitive;
    use zcut_core::scale::CanvasFrame;
    use zcut_core::scene::{flatten, DesignNode};

    struct NoSources;

    #[async_trait]
    impl SourceFetcher for NoSources {
        async fn fetch(&self, source_ref: &str) -> ExportResult<Vec<u8>> {
            Err(ExportError::VectorSourceFetchFailed {
                source_ref: source_ref.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    fn square() -> DesignElement {
        DesignElement::shape(ShapePrimitive::Rectangle {
            width: 50.0,
            height: 50.0,
            corner_radius: 0.0,
        })
    }

    #[tokio::test]
    async fn test_one_failure_leaves_the_rest() {
        let frame = CanvasFrame::new(24.0, 18.0, 1200.0, 900.0);
        let fonts = LoadedFonts::default();
        let sources = SourceCache::new(Arc::new(NoSources));
        let ctx = ConvertContext {
            frame: &frame,
            scale: frame.scale().unwrap(),
            fonts: &fonts,
            sources: &sources,
            text_sizing: TextSizing::CapHeight,
            tolerance: 0.001,
        };

        let nodes = vec![
            DesignNode::Element(square().with_id("a")),
            DesignNode::Element(square().with_id("a")),
            DesignNode::Element(DesignElement::text("hi", "Missing", 40.0).with_id("t")),
            DesignNode::Element(square()),
            DesignNode::Element(
                DesignElement::vector_artwork("gone.svg", 10.0, 10.0).with_id("art"),
            ),
        ];
        let placed = flatten(&nodes);
        let report = assemble(&ctx, "d", &[], &placed).await;

        assert_eq!(report.document.len(), 4);
        assert_eq!(report.document.models[0].name, "a");
        assert_eq!(report.document.models[1].name, "a_2");
        assert!(report.document.models[2].name.starts_with("shape_"));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id.as_deref(), Some("t"));
        assert_eq!(report.degraded.len(), 1);
        assert_eq!(report.degraded[0].model, "art");
        assert!(!report.is_complete());
    }
}
