//! 矢量图稿归一化
//!
//! 把外部 SVG 图稿转换为矢量模型（y 向下）：几何包围盒的左上角移到原点，
//! 有声明的画框（viewBox/width/height）时按画框尺寸缩放到目标宽高，
//! 否则按实测包围盒缩放，使几何恰好填满目标尺寸。
//!
//! 获取或解析失败、或者没有任何几何图元时，按回退链退化为目标尺寸的矩形，
//! 并在结果中记录原因，调用方记录日志后继续。

use crate::error::ExportError;
use crate::outline::ContourBuilder;
use crate::source::SourceCache;
use usvg::tiny_skia_path::PathSegment;
use zcut_core::geometry::{Geometry, VectorModel};
use zcut_core::math::{BoundingBox2, Point2, EPSILON};
use zcut_core::transform::Transform2D;

/// 归一化策略，按顺序尝试
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// 图稿的精确几何
    ExactGeometry,
    /// 目标尺寸的矩形
    PlaceholderRectangle,
}

/// 默认回退链
pub const FALLBACK_CHAIN: [Fallback; 2] = [Fallback::ExactGeometry, Fallback::PlaceholderRectangle];

/// 归一化结果
#[derive(Debug)]
pub struct Normalized {
    pub model: VectorModel,
    /// 实际使用的策略
    pub strategy: Fallback,
    /// 退化原因
    pub degraded: Option<ExportError>,
}

impl Normalized {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// 图稿解析选项
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    /// 曲线离散容差（目标单位）
    pub tolerance: f64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            tolerance: zcut_core::math::DEFAULT_TOLERANCE,
        }
    }
}

fn parse_failed(source_ref: &str, reason: impl std::fmt::Display) -> ExportError {
    ExportError::VectorParseFailed {
        source_ref: source_ref.to_string(),
        reason: reason.to_string(),
    }
}

/// 根元素是否声明了画框；压缩或无法解析的文档视为未声明
fn declares_frame(data: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(data) else {
        return false;
    };
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    };
    let Ok(doc) = roxmltree::Document::parse_with_options(text, options) else {
        return false;
    };
    let root = doc.root_element();
    ["viewBox", "width", "height"]
        .iter()
        .any(|attr| root.has_attribute(*attr))
}

fn map_point(t: &usvg::Transform, x: f64, y: f64) -> Point2 {
    Point2::new(
        t.sx as f64 * x + t.kx as f64 * y + t.tx as f64,
        t.ky as f64 * x + t.sy as f64 * y + t.ty as f64,
    )
}

fn collect_group(group: &usvg::Group, tolerance: f64, out: &mut Vec<Geometry>) {
    for node in group.children() {
        match node {
            usvg::Node::Group(child) => collect_group(child, tolerance, out),
            usvg::Node::Path(path) => collect_path(path, tolerance, out),
            // 位图与文字不参与加工几何
            usvg::Node::Image(_) | usvg::Node::Text(_) => {}
        }
    }
}

/// 路径在自身坐标中展平，再用绝对变换映射到文档坐标
fn collect_path(path: &usvg::Path, tolerance: f64, out: &mut Vec<Geometry>) {
    let t = path.abs_transform();
    let det = (t.sx as f64 * t.sy as f64 - t.kx as f64 * t.ky as f64).abs();
    let local_tolerance = tolerance / det.sqrt().max(EPSILON);

    let mut builder = ContourBuilder::new(local_tolerance);
    for segment in path.data().segments() {
        match segment {
            PathSegment::MoveTo(p) => builder.move_to(p.x, p.y),
            PathSegment::LineTo(p) => builder.line_to(p.x, p.y),
            PathSegment::QuadTo(c, p) => builder.quad_to(c.x, c.y, p.x, p.y),
            PathSegment::CubicTo(c1, c2, p) => builder.cubic_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y),
            PathSegment::Close => builder.close(),
        }
    }
    out.extend(builder.finish(|x, y| map_point(&t, x, y)));
}

/// 源坐标（y 向下）下的几何及其尺寸参考
struct Extracted {
    paths: Vec<Geometry>,
    /// 几何的实测包围盒
    measured: BoundingBox2,
    /// 声明的画框尺寸；未声明时为 None
    declared: Option<(f64, f64)>,
}

/// 解析 SVG 字节并提取几何
fn extract(data: &[u8], tolerance: f64, source_ref: &str) -> Result<Extracted, ExportError> {
    let options = usvg::Options::default();
    let tree = usvg::Tree::from_data(data, &options).map_err(|e| parse_failed(source_ref, e))?;

    let mut paths = Vec::new();
    collect_group(tree.root(), tolerance, &mut paths);
    if paths.is_empty() {
        return Err(parse_failed(source_ref, "no geometric primitives"));
    }

    let measured = paths
        .iter()
        .fold(BoundingBox2::empty(), |acc, g| acc.union(&g.bounding_box()));
    // usvg 已把 viewBox 映射到 size
    let declared = declares_frame(data).then(|| {
        let size = tree.size();
        (size.width() as f64, size.height() as f64)
    });
    Ok(Extracted {
        paths,
        measured,
        declared,
    })
}

/// 纯函数部分：字节 → 目标尺寸的模型
pub fn normalize_bytes(
    data: &[u8],
    target_width: f64,
    target_height: f64,
    options: &NormalizeOptions,
) -> Result<VectorModel, ExportError> {
    normalize_bytes_for(data, target_width, target_height, options, "<bytes>")
}

fn normalize_bytes_for(
    data: &[u8],
    target_width: f64,
    target_height: f64,
    options: &NormalizeOptions,
    source_ref: &str,
) -> Result<VectorModel, ExportError> {
    // 源坐标下的容差未知，先用目标容差的一小部分离散，缩放后再按需求离散
    let extracted = extract(data, options.tolerance * 0.1, source_ref)?;
    let measured = extracted.measured;
    let (w, h) = extracted
        .declared
        .unwrap_or((measured.width(), measured.height()));

    let sx = if w > EPSILON { target_width / w } else { 1.0 };
    let sy = if h > EPSILON { target_height / h } else { 1.0 };
    // 退化方向（如纯水平线）沿用另一个方向的比例
    let (sx, sy) = match (w > EPSILON, h > EPSILON) {
        (true, true) => (sx, sy),
        (true, false) => (sx, sx),
        (false, true) => (sy, sy),
        (false, false) => return Err(parse_failed(source_ref, "zero-size artwork")),
    };

    let t = Transform2D::translation(-measured.min.x, -measured.min.y)
        .then(&Transform2D::scale(sx, sy));
    let mut model = VectorModel::from_paths(extracted.paths);
    model.transform(&t, options.tolerance);
    if !model.is_finite() {
        return Err(parse_failed(source_ref, "non-finite coordinates"));
    }
    Ok(model)
}

/// 获取并归一化图稿，按回退链处理失败
pub async fn normalize(
    sources: &SourceCache,
    source_ref: &str,
    target_width: f64,
    target_height: f64,
    options: &NormalizeOptions,
) -> Normalized {
    let mut failure = None;
    for strategy in FALLBACK_CHAIN {
        match strategy {
            Fallback::ExactGeometry => {
                let attempt = match sources.get(source_ref).await {
                    Ok(bytes) => normalize_bytes_for(
                        &bytes,
                        target_width,
                        target_height,
                        options,
                        source_ref,
                    ),
                    Err(e) => Err(e),
                };
                match attempt {
                    Ok(model) => {
                        return Normalized {
                            model,
                            strategy,
                            degraded: None,
                        }
                    }
                    Err(e) => {
                        tracing::warn!("图稿归一化失败，使用占位矩形: {}", e);
                        failure = Some(e);
                    }
                }
            }
            Fallback::PlaceholderRectangle => {
                return Normalized {
                    model: VectorModel::rectangle(target_width, target_height),
                    strategy,
                    degraded: failure,
                }
            }
        }
    }
    // 回退链以占位矩形结尾，不会走到这里
    Normalized {
        model: VectorModel::rectangle(target_width, target_height),
        strategy: Fallback::PlaceholderRectangle,
        degraded: failure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExportResult;
    use crate::source::SourceFetcher;
    use async_trait::async_trait;
    use std::sync::Arc;

    const SQUARE_WITH_VIEWBOX: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"
        viewBox="0 0 100 50">
        <rect x="25" y="10" width="50" height="40"/>
    </svg>"#;

    const STROKE_ONLY_ROOT: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" stroke-width="2">
        <rect x="10" y="20" width="30" height="60"/>
    </svg>"#;

    const BARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg">
        <rect x="10" y="20" width="30" height="60"/>
        <circle cx="80" cy="50" r="10"/>
    </svg>"#;

    const EMPTY_DRAWING: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10">
        <text>hi</text>
    </svg>"#;

    struct MapFetcher;

    #[async_trait]
    impl SourceFetcher for MapFetcher {
        async fn fetch(&self, source_ref: &str) -> ExportResult<Vec<u8>> {
            match source_ref {
                "square.svg" => Ok(SQUARE_WITH_VIEWBOX.as_bytes().to_vec()),
                "broken.svg" => Ok(b"<svg><path d=".to_vec()),
                "empty.svg" => Ok(EMPTY_DRAWING.as_bytes().to_vec()),
                other => Err(ExportError::VectorSourceFetchFailed {
                    source_ref: other.to_string(),
                    reason: "not found".to_string(),
                }),
            }
        }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{} != {}", a, b);
    }

    #[test]
    fn test_declared_frame_sets_scale() {
        let options = NormalizeOptions::default();
        let model =
            normalize_bytes(SQUARE_WITH_VIEWBOX.as_bytes(), 4.0, 2.0, &options).unwrap();
        let bbox = model.bounding_box();
        // 包围盒移到原点，比例取自 100x50 画框：0.04
        assert_close(bbox.min.x, 0.0);
        assert_close(bbox.min.y, 0.0);
        assert_close(bbox.max.x, 2.0);
        assert_close(bbox.max.y, 1.6);
    }

    #[test]
    fn test_measured_bbox_without_frame() {
        let options = NormalizeOptions::default();
        let model = normalize_bytes(BARE.as_bytes(), 8.0, 6.0, &options).unwrap();
        let bbox = model.bounding_box();
        assert!(bbox.min.x.abs() < 1e-3);
        assert!(bbox.min.y.abs() < 1e-3);
        assert!((bbox.width() - 8.0).abs() < 1e-2);
        assert!((bbox.height() - 6.0).abs() < 1e-2);
        assert_eq!(model.paths.len(), 2);
    }

    #[test]
    fn test_declares_frame() {
        assert!(declares_frame(SQUARE_WITH_VIEWBOX.as_bytes()));
        assert!(!declares_frame(BARE.as_bytes()));
        assert!(!declares_frame(STROKE_ONLY_ROOT.as_bytes()));
        assert!(!declares_frame(
            br#"<!-- <svg width="5"> --><svg xmlns="http://www.w3.org/2000/svg" data-width="3"/>"#
        ));
        assert!(declares_frame(
            br#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#
        ));
    }

    #[test]
    fn test_size_like_attributes_do_not_declare_frame() {
        let options = NormalizeOptions::default();
        let model = normalize_bytes(STROKE_ONLY_ROOT.as_bytes(), 3.0, 6.0, &options).unwrap();
        let bbox = model.bounding_box();
        assert_close(bbox.min.x, 0.0);
        assert_close(bbox.min.y, 0.0);
        assert_close(bbox.width(), 3.0);
        assert_close(bbox.height(), 6.0);
    }

    async fn run(source_ref: &str) -> Normalized {
        let cache = SourceCache::new(Arc::new(MapFetcher));
        normalize(&cache, source_ref, 3.0, 1.5, &NormalizeOptions::default()).await
    }

    #[tokio::test]
    async fn test_exact_geometry() {
        let out = run("square.svg").await;
        assert_eq!(out.strategy, Fallback::ExactGeometry);
        assert!(!out.is_degraded());
    }

    #[tokio::test]
    async fn test_placeholder_on_failures() {
        let cases = [("broken.svg", true), ("empty.svg", true), ("missing.svg", false)];
        for (source, expect_parse) in cases {
            let out = run(source).await;
            assert_eq!(out.strategy, Fallback::PlaceholderRectangle, "{}", source);
            let bbox = out.model.bounding_box();
            assert_close(bbox.min.x, 0.0);
            assert_close(bbox.min.y, 0.0);
            assert_close(bbox.width(), 3.0);
            assert_close(bbox.height(), 1.5);
            match out.degraded {
                Some(ExportError::VectorParseFailed { .. }) => assert!(expect_parse, "{}", source),
                Some(ExportError::VectorSourceFetchFailed { .. }) => {
                    assert!(!expect_parse, "{}", source)
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
