//! SVG 预览导出
//!
//! 每个模型一个 `<g>`，只描边不填充。viewBox 以英寸为单位，
//! 外层分组做 y 翻转，使预览与编辑画布方向一致。

use crate::document::ManufacturingDocument;
use crate::error::{ExportError, ExportResult};
use std::fmt::Write;
use zcut_core::geometry::{Geometry, Polyline};

/// 描边宽度（英寸）
const STROKE_WIDTH: f64 = 0.01;

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// 凸度段对应的圆弧半径与大弧标志
fn bulge_arc_params(chord: f64, bulge: f64) -> (f64, bool) {
    let radius = chord * (1.0 + bulge * bulge) / (4.0 * bulge.abs());
    (radius, bulge.abs() > 1.0)
}

fn polyline_path(pl: &Polyline, out: &mut String) -> std::fmt::Result {
    let Some(first) = pl.vertices.first() else {
        return Ok(());
    };
    write!(out, "M{} {}", first.point.x, first.point.y)?;
    for i in 0..pl.segment_count() {
        let v1 = &pl.vertices[i];
        let v2 = &pl.vertices[(i + 1) % pl.vertices.len()];
        if v1.bulge.abs() < zcut_core::math::EPSILON {
            write!(out, " L{} {}", v2.point.x, v2.point.y)?;
        } else {
            let chord = (v2.point - v1.point).norm();
            let (r, large) = bulge_arc_params(chord, v1.bulge);
            write!(
                out,
                " A{} {} 0 {} {} {} {}",
                r,
                r,
                u8::from(large),
                u8::from(v1.bulge > 0.0),
                v2.point.x,
                v2.point.y
            )?;
        }
    }
    if pl.closed {
        out.push_str(" Z");
    }
    Ok(())
}

fn write_geometry(geometry: &Geometry, out: &mut String) -> std::fmt::Result {
    match geometry {
        Geometry::Line(l) => writeln!(
            out,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}"/>"#,
            l.start.x, l.start.y, l.end.x, l.end.y
        ),
        Geometry::Circle(c) => writeln!(
            out,
            r#"<circle cx="{}" cy="{}" r="{}"/>"#,
            c.center.x, c.center.y, c.radius
        ),
        Geometry::Arc(a) => {
            let (s, e) = (a.start_point(), a.end_point());
            let large = a.sweep_angle() > std::f64::consts::PI;
            writeln!(
                out,
                r#"<path d="M{} {} A{} {} 0 {} 1 {} {}"/>"#,
                s.x,
                s.y,
                a.radius,
                a.radius,
                u8::from(large),
                e.x,
                e.y
            )
        }
        Geometry::Polyline(pl) => {
            let mut d = String::new();
            polyline_path(pl, &mut d)?;
            writeln!(out, r#"<path d="{}"/>"#, d)
        }
    }
}

fn render(document: &ManufacturingDocument) -> Result<String, std::fmt::Error> {
    let (w, h) = (document.width, document.height);
    let mut out = String::new();
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}in" height="{h}in" viewBox="0 0 {w} {h}">"#
    )?;
    writeln!(
        out,
        r#"<g transform="matrix(1 0 0 -1 0 {h})" fill="none" stroke="black" stroke-width="{STROKE_WIDTH}">"#
    )?;
    for named in &document.models {
        writeln!(out, r#"<g id="{}">"#, escape_attr(&named.name))?;
        for geometry in named.model.all_paths() {
            write_geometry(geometry, &mut out)?;
        }
        out.push_str("</g>\n");
    }
    out.push_str("</g>\n</svg>\n");
    Ok(out)
}

/// 序列化为 SVG 字节
pub fn export(document: &ManufacturingDocument) -> ExportResult<Vec<u8>> {
    render(document)
        .map(String::into_bytes)
        .map_err(|e| ExportError::DocumentSerializationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use zcut_core::geometry::{PolylineVertex, VectorModel};
    use zcut_core::math::Point2;

    #[test]
    fn test_preview_structure() {
        let mut doc = ManufacturingDocument::new("d", 24.0, 18.0);
        doc.add_model("plate", VectorModel::rectangle(24.0, 18.0));
        doc.add_model("a\"b", VectorModel::rectangle(1.0, 1.0));
        let svg = String::from_utf8(export(&doc).unwrap()).unwrap();

        assert!(svg.contains(r#"viewBox="0 0 24 18""#));
        assert!(svg.contains(r#"matrix(1 0 0 -1 0 18)"#));
        assert!(svg.contains(r#"<g id="plate">"#));
        assert!(svg.contains(r#"<g id="a_b">"#));
        assert_eq!(svg.matches("<path").count(), 2);
    }

    #[test]
    fn test_semicircle_bulge() {
        let pl = Polyline::new(
            vec![
                PolylineVertex::with_bulge(Point2::new(0.0, 0.0), 1.0),
                PolylineVertex::new(Point2::new(2.0, 0.0)),
            ],
            false,
        );
        let mut d = String::new();
        polyline_path(&pl, &mut d).unwrap();
        assert_eq!(d, "M0 0 A1 1 0 0 1 2 0");
    }

    #[test]
    fn test_preview_parses() {
        let mut doc = ManufacturingDocument::new("d", 4.0, 3.0);
        doc.add_model("box", VectorModel::rectangle(2.0, 1.0));
        let bytes = export(&doc).unwrap();
        let tree = usvg::Tree::from_data(&bytes, &usvg::Options::default()).unwrap();
        assert!((tree.size().width() - 384.0).abs() < 1e-3);
    }
}
