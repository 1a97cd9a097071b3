//! 设计元素
//!
//! 编辑画布上放置的条目：文字、矢量图稿、位图、基本形状。
//! 位置、尺寸均为画布像素；旋转角以度为单位，屏幕上顺时针为正。

use crate::geometry::{Circle, Geometry, Line, Polyline, PolylineVertex, VectorModel};
use crate::math::{Point2, Vector2};
use crate::transform::Transform2D;
use serde::{Deserialize, Serialize};

/// 原点锚点（九宫格）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    #[default]
    TopLeft,
    Top,
    TopRight,
    Left,
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl Anchor {
    /// 锚点在包围盒中的比例位置 (fx, fy)，y 向下：左上 (0,0)，右下 (1,1)
    pub fn factors(&self) -> (f64, f64) {
        match self {
            Anchor::TopLeft => (0.0, 0.0),
            Anchor::Top => (0.5, 0.0),
            Anchor::TopRight => (1.0, 0.0),
            Anchor::Left => (0.0, 0.5),
            Anchor::Center => (0.5, 0.5),
            Anchor::Right => (1.0, 0.5),
            Anchor::BottomLeft => (0.0, 1.0),
            Anchor::Bottom => (0.5, 1.0),
            Anchor::BottomRight => (1.0, 1.0),
        }
    }

    /// 锚点相对左上角的偏移（y 向下）
    pub fn offset(&self, width: f64, height: f64) -> Vector2 {
        let (fx, fy) = self.factors();
        Vector2::new(fx * width, fy * height)
    }
}

/// 文本对齐方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextAlignment {
    /// 左对齐（默认）
    #[default]
    Left,
    /// 居中对齐
    Center,
    /// 右对齐
    Right,
}

fn default_line_height() -> f64 {
    1.2
}

fn default_scale() -> f64 {
    1.0
}

/// 文字内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    pub content: String,
    pub font_family: String,
    /// 字号（像素）
    pub font_size: f64,
    /// 字间距（像素）
    #[serde(default)]
    pub letter_spacing: f64,
    /// 行高（字号的倍数）
    #[serde(default = "default_line_height")]
    pub line_height: f64,
    #[serde(default)]
    pub alignment: TextAlignment,
    /// 填充色，仅用于编辑画布显示
    #[serde(default)]
    pub fill: Option<String>,
}

/// 图稿（矢量或位图）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtworkPayload {
    /// 外部资源引用（URL 或路径）
    pub source: String,
    /// 原始宽度（像素）
    pub natural_width: f64,
    /// 原始高度（像素）
    pub natural_height: f64,
    /// 填充/着色，仅用于编辑画布显示
    #[serde(default)]
    pub fill: Option<String>,
}

/// 基本形状（尺寸均为像素）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "primitive", rename_all = "snake_case")]
pub enum ShapePrimitive {
    Rectangle {
        width: f64,
        height: f64,
        #[serde(default)]
        corner_radius: f64,
    },
    Ellipse {
        width: f64,
        height: f64,
    },
    Line {
        length: f64,
    },
    /// 正多边形，内接于 width × height 的椭圆，首顶点朝上
    Polygon {
        sides: u32,
        width: f64,
        height: f64,
    },
}

impl ShapePrimitive {
    /// 原始尺寸（像素）
    pub fn size(&self) -> (f64, f64) {
        match *self {
            ShapePrimitive::Rectangle { width, height, .. }
            | ShapePrimitive::Ellipse { width, height }
            | ShapePrimitive::Polygon { width, height, .. } => (width, height),
            ShapePrimitive::Line { length } => (length, 0.0),
        }
    }

    /// 按 `units_per_pixel` 换算后构建模型：左上角为原点，y 向下
    pub fn build_model(&self, units_per_pixel: f64, tolerance: f64) -> VectorModel {
        let k = units_per_pixel;
        match *self {
            ShapePrimitive::Rectangle {
                width,
                height,
                corner_radius,
            } => {
                let (w, h) = (width * k, height * k);
                let r = (corner_radius * k).clamp(0.0, w.min(h) / 2.0);
                if r <= 0.0 {
                    VectorModel::rectangle(w, h)
                } else {
                    VectorModel::from_paths(vec![Geometry::Polyline(rounded_rectangle(w, h, r))])
                }
            }
            ShapePrimitive::Ellipse { width, height } => {
                let (w, h) = (width * k, height * k);
                let center = Point2::new(w / 2.0, h / 2.0);
                if (w - h).abs() <= f64::EPSILON * w.max(h) {
                    VectorModel::from_paths(vec![Geometry::Circle(Circle::new(center, w / 2.0))])
                } else {
                    // 先画单位圆再非等比缩放，由变换负责离散
                    let mut model = VectorModel::from_paths(vec![Geometry::Circle(Circle::new(
                        Point2::origin(),
                        0.5,
                    ))]);
                    let placement = Transform2D::scale(w, h)
                        .then(&Transform2D::translation(center.x, center.y));
                    model.transform(&placement, tolerance);
                    model
                }
            }
            ShapePrimitive::Line { length } => VectorModel::from_paths(vec![Geometry::Line(
                Line::new(Point2::origin(), Point2::new(length * k, 0.0)),
            )]),
            ShapePrimitive::Polygon {
                sides,
                width,
                height,
            } => {
                let (w, h) = (width * k, height * k);
                let n = sides.max(3);
                let points = (0..n).map(|i| {
                    let angle = -std::f64::consts::FRAC_PI_2
                        + std::f64::consts::TAU * (i as f64) / (n as f64);
                    Point2::new(w / 2.0 * (1.0 + angle.cos()), h / 2.0 * (1.0 + angle.sin()))
                });
                let outline = Polyline::from_points(points, true);
                VectorModel::from_paths(vec![Geometry::Polyline(outline)])
            }
        }
    }
}

/// 圆角矩形（y 向下坐标中顺序遍历，四个角为 90° 凸度段）
fn rounded_rectangle(w: f64, h: f64, r: f64) -> Polyline {
    let bulge = (std::f64::consts::FRAC_PI_8).tan();
    Polyline::new(
        vec![
            PolylineVertex::new(Point2::new(r, 0.0)),
            PolylineVertex::with_bulge(Point2::new(w - r, 0.0), bulge),
            PolylineVertex::new(Point2::new(w, r)),
            PolylineVertex::with_bulge(Point2::new(w, h - r), bulge),
            PolylineVertex::new(Point2::new(w - r, h)),
            PolylineVertex::with_bulge(Point2::new(r, h), bulge),
            PolylineVertex::new(Point2::new(0.0, h - r)),
            PolylineVertex::with_bulge(Point2::new(0.0, r), bulge),
        ],
        true,
    )
}

/// 元素内容（封闭的标签联合）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElementKind {
    Text(TextPayload),
    VectorArtwork(ArtworkPayload),
    RasterImage(ArtworkPayload),
    Shape(ShapePayload),
}

/// 形状内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapePayload {
    #[serde(flatten)]
    pub primitive: ShapePrimitive,
}

impl ElementKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ElementKind::Text(_) => "text",
            ElementKind::VectorArtwork(_) => "vector_artwork",
            ElementKind::RasterImage(_) => "raster_image",
            ElementKind::Shape(_) => "shape",
        }
    }
}

/// 设计元素
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignElement {
    #[serde(default)]
    pub id: Option<String>,
    pub kind: ElementKind,
    /// 锚点所在的像素位置
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    /// 旋转角度（度，屏幕顺时针为正）
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_scale")]
    pub scale_x: f64,
    #[serde(default = "default_scale")]
    pub scale_y: f64,
    #[serde(default)]
    pub anchor: Anchor,
    #[serde(default)]
    pub z_order: i32,
    /// 所属编辑区（弱引用）
    #[serde(default)]
    pub zone_id: Option<String>,
}

impl DesignElement {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            id: None,
            kind,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            anchor: Anchor::TopLeft,
            z_order: 0,
            zone_id: None,
        }
    }

    pub fn text(
        content: impl Into<String>,
        font_family: impl Into<String>,
        font_size: f64,
    ) -> Self {
        Self::new(ElementKind::Text(TextPayload {
            content: content.into(),
            font_family: font_family.into(),
            font_size,
            letter_spacing: 0.0,
            line_height: default_line_height(),
            alignment: TextAlignment::Left,
            fill: None,
        }))
    }

    pub fn vector_artwork(
        source: impl Into<String>,
        natural_width: f64,
        natural_height: f64,
    ) -> Self {
        Self::new(ElementKind::VectorArtwork(ArtworkPayload {
            source: source.into(),
            natural_width,
            natural_height,
            fill: None,
        }))
    }

    pub fn raster_image(
        source: impl Into<String>,
        natural_width: f64,
        natural_height: f64,
    ) -> Self {
        Self::new(ElementKind::RasterImage(ArtworkPayload {
            source: source.into(),
            natural_width,
            natural_height,
            fill: None,
        }))
    }

    pub fn shape(primitive: ShapePrimitive) -> Self {
        Self::new(ElementKind::Shape(ShapePayload { primitive }))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_scale(mut self, scale_x: f64, scale_y: f64) -> Self {
        self.scale_x = scale_x;
        self.scale_y = scale_y;
        self
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_z_order(mut self, z_order: i32) -> Self {
        self.z_order = z_order;
        self
    }

    pub fn with_zone(mut self, zone_id: impl Into<String>) -> Self {
        self.zone_id = Some(zone_id.into());
        self
    }

    /// 局部变换：T(x, y) · R(rotation) · S(scale_x, scale_y)
    ///
    /// 屏幕坐标 y 向下，数学正方向的旋转矩阵在屏幕上表现为顺时针。
    pub fn local_transform(&self) -> Transform2D {
        Transform2D::scale(self.scale_x, self.scale_y)
            .then(&Transform2D::rotation(self.rotation.to_radians()))
            .then(&Transform2D::translation(self.x, self.y))
    }

    /// 外部资源引用（仅图稿）
    pub fn source_ref(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::VectorArtwork(a) | ElementKind::RasterImage(a) => Some(&a.source),
            _ => None,
        }
    }

    /// 字体族（仅文字）
    pub fn font_family(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Text(t) => Some(&t.font_family),
            _ => None,
        }
    }

    /// 未缩放的像素尺寸；文字尺寸取决于字体，返回 None
    pub fn natural_size(&self) -> Option<(f64, f64)> {
        match &self.kind {
            ElementKind::Text(_) => None,
            ElementKind::VectorArtwork(a) | ElementKind::RasterImage(a) => {
                Some((a.natural_width, a.natural_height))
            }
            ElementKind::Shape(s) => Some(s.primitive.size()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_offsets() {
        assert_eq!(Anchor::TopLeft.offset(10.0, 4.0), Vector2::new(0.0, 0.0));
        assert_eq!(Anchor::Center.offset(10.0, 4.0), Vector2::new(5.0, 2.0));
        assert_eq!(Anchor::BottomRight.offset(10.0, 4.0), Vector2::new(10.0, 4.0));
        assert_eq!(Anchor::Bottom.offset(10.0, 4.0), Vector2::new(5.0, 4.0));
    }

    #[test]
    fn test_element_json() {
        let json = r#"{
            "id": "logo",
            "kind": { "type": "vector_artwork", "source": "https://cdn.example.com/logo.svg",
                      "natural_width": 200, "natural_height": 100 },
            "x": 40, "y": 60, "rotation": 15, "anchor": "center", "zone_id": "front"
        }"#;
        let element: DesignElement = serde_json::from_str(json).unwrap();
        assert_eq!(element.id.as_deref(), Some("logo"));
        assert_eq!(element.anchor, Anchor::Center);
        assert_eq!(element.scale_x, 1.0);
        assert_eq!(element.natural_size(), Some((200.0, 100.0)));
        assert_eq!(element.source_ref(), Some("https://cdn.example.com/logo.svg"));
    }

    #[test]
    fn test_shape_json() {
        let json = r#"{
            "kind": { "type": "shape", "primitive": "rectangle", "width": 30, "height": 20 }
        }"#;
        let element: DesignElement = serde_json::from_str(json).unwrap();
        assert_eq!(element.natural_size(), Some((30.0, 20.0)));
        assert_eq!(element.kind.type_name(), "shape");
    }

    #[test]
    fn test_rounded_rectangle_bounds() {
        let shape = ShapePrimitive::Rectangle {
            width: 100.0,
            height: 50.0,
            corner_radius: 10.0,
        };
        let model = shape.build_model(0.1, 1e-4);
        let bbox = model.bounding_box();
        assert!((bbox.width() - 10.0).abs() < 1e-3);
        assert!((bbox.height() - 5.0).abs() < 1e-3);
        assert!(bbox.min.x.abs() < 1e-3 && bbox.min.y.abs() < 1e-3);
    }

    #[test]
    fn test_ellipse_and_polygon_fill_box() {
        let ellipse = ShapePrimitive::Ellipse {
            width: 40.0,
            height: 20.0,
        }
        .build_model(1.0, 1e-3);
        let bbox = ellipse.bounding_box();
        assert!((bbox.width() - 40.0).abs() < 1e-2);
        assert!((bbox.height() - 20.0).abs() < 1e-2);

        let square = ShapePrimitive::Polygon {
            sides: 4,
            width: 10.0,
            height: 10.0,
        }
        .build_model(1.0, 1e-3);
        let bbox = square.bounding_box();
        assert!((bbox.width() - 10.0).abs() < 1e-9);
        assert!((bbox.height() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_local_transform_places_anchor() {
        let element = DesignElement::shape(ShapePrimitive::Line { length: 10.0 })
            .with_position(100.0, 50.0)
            .with_rotation(90.0);
        let t = element.local_transform();
        // 屏幕上顺时针 90°：+x 方向转到 +y（向下）
        let p = t.apply_point(&Point2::new(10.0, 0.0));
        assert!((p.x - 100.0).abs() < 1e-9);
        assert!((p.y - 60.0).abs() < 1e-9);
    }
}
