//! ZCUT 核心几何引擎
//!
//! 提供矢量模型、二维仿射变换、比例换算与编辑区约束。本 crate 不做任何 I/O。
//!
//! # 坐标约定
//!
//! - 编辑画布：像素，左上角为原点，y 向下，顺时针旋转为正
//! - 矢量模型：真实单位（英寸），导出前的中间模型仍为 y 向下
//!
//! # 示例
//!
//! ```rust
//! use zcut_core::prelude::*;
//!
//! // 24 英寸宽的产品显示在 1200 像素宽的画布上
//! let scale = calculate_scale(24.0, 1200.0).unwrap();
//! assert_eq!(scale, 50.0);
//!
//! let line = Line::new(Point2::origin(), Point2::new(3.0, 4.0));
//! assert_eq!(line.length(), 5.0);
//! ```

pub mod element;
pub mod error;
pub mod geometry;
pub mod math;
pub mod scale;
pub mod scene;
pub mod transform;
pub mod zone;

pub mod prelude {
    //! 常用类型的便捷导入
    pub use crate::element::{
        Anchor, ArtworkPayload, DesignElement, ElementKind, ShapePayload, ShapePrimitive,
        TextAlignment, TextPayload,
    };
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::geometry::{
        Arc, Circle, Geometry, Line, NamedModel, Polyline, PolylineVertex, VectorModel,
    };
    pub use crate::math::{BoundingBox2, Point2, Vector2};
    pub use crate::scale::{calculate_scale, to_pixels, to_real, CanvasFrame};
    pub use crate::scene::{
        BackgroundLayer, DesignGroup, DesignNode, DesignSnapshot, PlacedElement,
    };
    pub use crate::transform::{decompose, Decomposed, Transform2D};
    pub use crate::zone::{constrain, EditZone, ElementBounds, PixelRect, ZoneConstraintEngine};
}
