//! DXF 导出
//!
//! 输出 AutoCAD R2010 格式，`$INSUNITS` 为英寸。每个顶层模型一个图层，
//! 只使用 LINE / ARC / CIRCLE / LWPOLYLINE 四种实体。

use crate::document::ManufacturingDocument;
use crate::error::{ExportError, ExportResult};
use zcut_core::geometry::Geometry;

/// 序列化为 DXF 字节
pub fn export(document: &ManufacturingDocument) -> ExportResult<Vec<u8>> {
    let mut drawing = dxf::Drawing::new();
    drawing.header.version = dxf::enums::AcadVersion::R2010;
    drawing.header.default_drawing_units = dxf::enums::Units::Inches;

    let mut entity_count = 0usize;
    for named in &document.models {
        let mut dxf_layer = dxf::tables::Layer::default();
        dxf_layer.name = named.name.clone();
        drawing.add_layer(dxf_layer);

        for geometry in named.model.all_paths() {
            let mut entity = dxf::entities::Entity::new(convert_geometry(geometry));
            entity.common.layer = named.name.clone();
            drawing.add_entity(entity);
            entity_count += 1;
        }
    }

    let mut bytes = Vec::new();
    drawing
        .save(&mut bytes)
        .map_err(|e| ExportError::DocumentSerializationFailed(e.to_string()))?;

    tracing::debug!(
        "DXF: {} 个图层, {} 个实体, {} 字节",
        document.len(),
        entity_count,
        bytes.len()
    );
    Ok(bytes)
}

/// 几何图元 → DXF 实体
fn convert_geometry(geometry: &Geometry) -> dxf::entities::EntityType {
    match geometry {
        Geometry::Line(line) => {
            let mut dxf_line = dxf::entities::Line::default();
            dxf_line.p1 = dxf::Point::new(line.start.x, line.start.y, 0.0);
            dxf_line.p2 = dxf::Point::new(line.end.x, line.end.y, 0.0);
            dxf::entities::EntityType::Line(dxf_line)
        }

        Geometry::Circle(circle) => {
            let mut dxf_circle = dxf::entities::Circle::default();
            dxf_circle.center = dxf::Point::new(circle.center.x, circle.center.y, 0.0);
            dxf_circle.radius = circle.radius;
            dxf::entities::EntityType::Circle(dxf_circle)
        }

        // DXF 圆弧角度为度，逆时针
        Geometry::Arc(arc) => {
            let mut dxf_arc = dxf::entities::Arc::default();
            dxf_arc.center = dxf::Point::new(arc.center.x, arc.center.y, 0.0);
            dxf_arc.radius = arc.radius;
            dxf_arc.start_angle = arc.start_angle.to_degrees();
            dxf_arc.end_angle = arc.end_angle.to_degrees();
            dxf::entities::EntityType::Arc(dxf_arc)
        }

        Geometry::Polyline(polyline) => {
            let mut lwpoly = dxf::entities::LwPolyline::default();
            lwpoly.set_is_closed(polyline.closed);
            lwpoly.vertices = polyline
                .vertices
                .iter()
                .map(|v| dxf::LwPolylineVertex {
                    x: v.point.x,
                    y: v.point.y,
                    bulge: v.bulge,
                    ..Default::default()
                })
                .collect();
            dxf::entities::EntityType::LwPolyline(lwpoly)
        }
    }
}
