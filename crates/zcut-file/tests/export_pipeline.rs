//! 导出管线集成测试：内存中的字体/图稿来源，完整走一遍快照 → DXF

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use zcut_core::element::{Anchor, DesignElement, ShapePrimitive};
use zcut_core::scale::CanvasFrame;
use zcut_core::scene::{BackgroundLayer, DesignGroup, DesignNode, DesignSnapshot};
use zcut_file::{
    ExportConfig, ExportError, ExportFormat, ExportPipeline, ExportResult, FontLoader,
    SourceFetcher,
};

const LOGO_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"
    width="100" height="100" viewBox="0 0 100 100">
    <circle cx="50" cy="50" r="50"/>
</svg>"#;

#[derive(Default)]
struct MemoryFonts {
    fonts: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl FontLoader for MemoryFonts {
    async fn load(&self, family: &str) -> ExportResult<Vec<u8>> {
        self.fonts
            .get(family)
            .cloned()
            .ok_or_else(|| ExportError::FontNotLoaded(family.to_string()))
    }
}

struct MemorySources {
    delay: Duration,
}

#[async_trait]
impl SourceFetcher for MemorySources {
    async fn fetch(&self, source_ref: &str) -> ExportResult<Vec<u8>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match source_ref {
            "mem://logo.svg" => Ok(LOGO_SVG.as_bytes().to_vec()),
            "mem://corrupt.svg" => Ok(b"\x00\x01 not svg".to_vec()),
            other => Err(ExportError::VectorSourceFetchFailed {
                source_ref: other.to_string(),
                reason: "not in memory".to_string(),
            }),
        }
    }
}

const SANS: &[u8] = include_bytes!("fixtures/DejaVuSans.ttf");

fn pipeline_with(fonts: MemoryFonts, delay: Duration, format: ExportFormat) -> ExportPipeline {
    let config = ExportConfig {
        format,
        ..ExportConfig::default()
    };
    ExportPipeline::with_loaders(config, Arc::new(fonts), Arc::new(MemorySources { delay }))
}

fn pipeline() -> ExportPipeline {
    pipeline_with(MemoryFonts::default(), Duration::ZERO, ExportFormat::Dxf)
}

fn frame() -> CanvasFrame {
    CanvasFrame::new(24.0, 18.0, 1200.0, 900.0)
}

fn rectangle(id: &str, w: f64, h: f64) -> DesignElement {
    DesignElement::shape(ShapePrimitive::Rectangle {
        width: w,
        height: h,
        corner_radius: 0.0,
    })
    .with_id(id)
}

fn load_dxf(bytes: &[u8]) -> dxf::Drawing {
    let mut reader = bytes;
    dxf::Drawing::load(&mut reader).unwrap()
}

#[tokio::test]
async fn exports_shapes_at_real_scale() {
    let snapshot = DesignSnapshot::new("order-1042", frame())
        .with_element(rectangle("plate-cut", 100.0, 50.0).with_position(600.0, 450.0));

    let outcome = pipeline().export(&snapshot).await.unwrap();
    assert_eq!(outcome.file_name, "order-1042.dxf");
    assert!(outcome.report.is_complete());

    let drawing = load_dxf(&outcome.bytes);
    let polylines: Vec<_> = drawing
        .entities()
        .filter_map(|e| match &e.specific {
            dxf::entities::EntityType::LwPolyline(p) => Some((e.common.layer.clone(), p.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(polylines.len(), 1);
    let (layer, poly) = &polylines[0];
    assert_eq!(layer, "plate-cut");

    let xs: Vec<f64> = poly.vertices.iter().map(|v| v.x).collect();
    let ys: Vec<f64> = poly.vertices.iter().map(|v| v.y).collect();
    let min = |v: &[f64]| v.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = |v: &[f64]| v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    assert!((min(&xs) - 12.0).abs() < 1e-9);
    assert!((max(&xs) - 14.0).abs() < 1e-9);
    assert!((min(&ys) - 8.0).abs() < 1e-9);
    assert!((max(&ys) - 9.0).abs() < 1e-9);
}

#[tokio::test]
async fn one_failing_element_leaves_n_minus_one_models() {
    let snapshot = DesignSnapshot::new("mixed", frame())
        .with_element(rectangle("a", 50.0, 50.0))
        .with_element(rectangle("b", 50.0, 50.0).with_position(100.0, 100.0))
        .with_element(DesignElement::text("EST. 1990", "NoSuchFont", 100.0).with_id("title"))
        .with_element(
            DesignElement::vector_artwork("mem://logo.svg", 100.0, 100.0)
                .with_id("logo")
                .with_position(300.0, 300.0)
                .with_anchor(Anchor::Center),
        );

    let outcome = pipeline().export(&snapshot).await.unwrap();
    let doc = &outcome.report.document;
    assert_eq!(doc.len(), 3);
    assert_eq!(outcome.report.skipped.len(), 1);
    assert!(matches!(
        outcome.report.skipped[0].error,
        ExportError::FontNotLoaded(_)
    ));

    // 100 像素的圆形图稿 = 直径 2 英寸，中心在 (6, 18 - 6)
    let logo = doc.get("logo").unwrap().bounding_box();
    assert!((logo.width() - 2.0).abs() < 1e-6);
    assert!((logo.center().x - 6.0).abs() < 1e-6);
    assert!((logo.center().y - 12.0).abs() < 1e-6);
}

#[tokio::test]
async fn unreadable_sources_become_placeholders() {
    let snapshot = DesignSnapshot::new("placeholders", frame())
        .with_background(BackgroundLayer {
            name: Some("template".to_string()),
            source: "mem://missing.svg".to_string(),
            real_width: 24.0,
            real_height: 18.0,
        })
        .with_element(
            DesignElement::vector_artwork("mem://corrupt.svg", 150.0, 50.0)
                .with_id("art")
                .with_position(0.0, 900.0)
                .with_anchor(Anchor::BottomLeft),
        );

    let outcome = pipeline().export(&snapshot).await.unwrap();
    let report = &outcome.report;
    assert_eq!(report.document.len(), 2);
    assert_eq!(report.degraded.len(), 2);
    assert_eq!(report.document.models[0].name, "template");

    let template = report.document.get("template").unwrap().bounding_box();
    assert!((template.width() - 24.0).abs() < 1e-9);
    assert!((template.height() - 18.0).abs() < 1e-9);

    // 左下角锚点落在画布左下角：占位矩形 3x1 英寸贴着原点
    let art = report.document.get("art").unwrap().bounding_box();
    assert!(art.min.x.abs() < 1e-9);
    assert!(art.min.y.abs() < 1e-9);
    assert!((art.max.x - 3.0).abs() < 1e-9);
    assert!((art.max.y - 1.0).abs() < 1e-9);
}

#[tokio::test]
async fn nested_group_rotation_reaches_document() {
    // 组顺时针转 90°，子矩形原本向右延伸，导出后在 y 向上坐标中向下延伸
    let group = DesignGroup::new(vec![DesignNode::Element(rectangle("bar", 100.0, 10.0))])
        .with_position(600.0, 300.0)
        .with_rotation(90.0);
    let snapshot = DesignSnapshot::new("rotated", frame()).with_group(group);

    let outcome = pipeline().export(&snapshot).await.unwrap();
    let bar = outcome.report.document.get("bar").unwrap().bounding_box();
    assert!((bar.width() - 0.2).abs() < 1e-9);
    assert!((bar.height() - 2.0).abs() < 1e-9);
    assert!((bar.max.y - 12.0).abs() < 1e-9);
    assert!((bar.max.x - 12.0).abs() < 1e-9);
}

#[tokio::test]
async fn text_lands_at_its_anchor() {
    let mut fonts = MemoryFonts::default();
    fonts.fonts.insert("Sans".to_string(), SANS.to_vec());

    let title = DesignElement::text("EST. 1990", "Sans", 100.0)
        .with_id("title")
        .with_position(600.0, 450.0);
    let snapshot = DesignSnapshot::new("text", frame()).with_element(title);
    let outcome = pipeline_with(fonts, Duration::ZERO, ExportFormat::Dxf)
        .export(&snapshot)
        .await
        .unwrap();

    let title = outcome.report.document.get("title").unwrap().bounding_box();
    assert!((title.min.x - 12.0).abs() < 1e-9);
    assert!((title.max.y - 9.0).abs() < 1e-9);
    assert!((title.height() - 2.0).abs() < 0.15);
    assert_eq!(outcome.report.document.get("title").unwrap().models.len(), 8);
}

#[tokio::test]
async fn svg_preview_format() {
    let snapshot = DesignSnapshot::new("preview", frame()).with_element(rectangle("r", 10.0, 10.0));
    let outcome = pipeline_with(MemoryFonts::default(), Duration::ZERO, ExportFormat::Svg)
        .export(&snapshot)
        .await
        .unwrap();
    assert_eq!(outcome.file_name, "preview.svg");
    let svg = String::from_utf8(outcome.bytes).unwrap();
    assert!(svg.contains(r#"<g id="r">"#));
}

#[tokio::test]
async fn overlapping_export_is_rejected() {
    let delay = Duration::from_millis(20);
    let pipeline = pipeline_with(MemoryFonts::default(), delay, ExportFormat::Dxf);
    let logo = DesignElement::vector_artwork("mem://logo.svg", 100.0, 100.0).with_id("logo");
    let snapshot = DesignSnapshot::new("slow", frame()).with_element(logo);

    let (first, second) = tokio::join!(pipeline.export(&snapshot), pipeline.export(&snapshot));
    assert!(first.is_ok());
    assert!(matches!(second, Err(ExportError::ExportInProgress)));

    // 完成后可以再次导出
    assert!(pipeline.export(&snapshot).await.is_ok());
}
