//! 轮廓构建
//!
//! 字形轮廓和 SVG 路径都由 move/line/quad/cubic/close 命令描述。
//! 命令写入 `lyon::path::Path`，完成后按容差展平为多段线，
//! 再映射到输出坐标。

use lyon::math::point;
use lyon::path::iterator::PathIterator;
use lyon::path::{Path, PathEvent};
use zcut_core::geometry::{Geometry, Polyline};
use zcut_core::math::Point2;

/// 首尾点重合判定（源坐标，f32 精度）
const CLOSE_EPSILON: f64 = 1e-6;

/// 逐条命令累积轮廓
pub struct ContourBuilder {
    builder: lyon::path::Builder,
    contour_open: bool,
    /// 最近一个轮廓的起点，close 之后的绘制从这里继续
    start: Option<lyon::math::Point>,
    /// 展平容差（源坐标）
    tolerance: f32,
}

impl ContourBuilder {
    pub fn new(tolerance: f64) -> Self {
        Self {
            builder: Path::builder(),
            contour_open: false,
            start: None,
            tolerance: (tolerance as f32).max(f32::EPSILON),
        }
    }

    /// 结束当前开放轮廓（不闭合）
    fn end_open(&mut self) {
        if self.contour_open {
            self.builder.end(false);
            self.contour_open = false;
        }
    }

    /// 没有开放轮廓时从上一个起点重新开始
    fn ensure_open(&mut self, fallback: lyon::math::Point) {
        if !self.contour_open {
            let at = self.start.unwrap_or(fallback);
            self.builder.begin(at);
            self.start = Some(at);
            self.contour_open = true;
        }
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        self.end_open();
        let at = point(x, y);
        self.builder.begin(at);
        self.start = Some(at);
        self.contour_open = true;
    }

    pub fn line_to(&mut self, x: f32, y: f32) {
        let to = point(x, y);
        self.ensure_open(to);
        self.builder.line_to(to);
    }

    pub fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let to = point(x, y);
        self.ensure_open(to);
        self.builder.quadratic_bezier_to(point(x1, y1), to);
    }

    pub fn cubic_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let to = point(x, y);
        self.ensure_open(to);
        self.builder.cubic_bezier_to(point(x1, y1), point(x2, y2), to);
    }

    /// 闭合当前轮廓
    pub fn close(&mut self) {
        if self.contour_open {
            self.builder.close();
            self.contour_open = false;
        }
    }

    /// 展平全部轮廓，`map` 把源坐标映射到输出坐标
    pub fn finish(mut self, map: impl Fn(f64, f64) -> Point2) -> Vec<Geometry> {
        self.end_open();
        let tolerance = self.tolerance;
        let path = self.builder.build();

        let mut contours = Vec::new();
        let mut current: Vec<(f64, f64)> = Vec::new();
        for event in path.iter().flattened(tolerance) {
            match event {
                PathEvent::Begin { at } => {
                    current.clear();
                    current.push((at.x as f64, at.y as f64));
                }
                PathEvent::Line { to, .. }
                | PathEvent::Quadratic { to, .. }
                | PathEvent::Cubic { to, .. } => current.push((to.x as f64, to.y as f64)),
                PathEvent::End { close, .. } => {
                    let points = std::mem::take(&mut current);
                    if let Some(contour) = to_polyline(points, close, &map) {
                        contours.push(Geometry::Polyline(contour));
                    }
                }
            }
        }
        contours
    }
}

fn to_polyline(
    mut points: Vec<(f64, f64)>,
    closed: bool,
    map: &impl Fn(f64, f64) -> Point2,
) -> Option<Polyline> {
    // 末点与首点重合时去掉，闭合标志负责连回
    if closed && points.len() > 1 {
        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            let dx = (first.0 - last.0).abs();
            let dy = (first.1 - last.1).abs();
            if dx <= CLOSE_EPSILON && dy <= CLOSE_EPSILON {
                points.pop();
            }
        }
    }
    if points.len() < 2 {
        return None;
    }
    Some(Polyline::from_points(
        points.into_iter().map(|(x, y)| map(x, y)),
        closed,
    ))
}
