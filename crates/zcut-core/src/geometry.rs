//! 矢量模型
//!
//! 加工输出只包含平面几何图元：
//! - 线段 (Line)
//! - 圆 (Circle)
//! - 圆弧 (Arc)
//! - 多段线 (Polyline，可闭合，顶点可带凸度)
//!
//! 图元组织成可嵌套的 [`VectorModel`]。模型不携带颜色或填充语义，
//! 所有变换都以 [`Transform2D`] 按步骤施加。

use crate::math::{BoundingBox2, Point2, Vector2, EPSILON};
use crate::transform::Transform2D;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, TAU};

/// 单段圆弧离散的上限
const MAX_SEGMENTS: usize = 1024;

/// 几何类型枚举
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Line(Line),
    Circle(Circle),
    Arc(Arc),
    Polyline(Polyline),
}

impl Geometry {
    /// 获取几何的包围盒
    pub fn bounding_box(&self) -> BoundingBox2 {
        match self {
            Geometry::Line(l) => l.bounding_box(),
            Geometry::Circle(c) => c.bounding_box(),
            Geometry::Arc(a) => a.bounding_box(),
            Geometry::Polyline(pl) => pl.bounding_box(),
        }
    }

    /// 获取几何的类型名称
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Line(_) => "Line",
            Geometry::Circle(_) => "Circle",
            Geometry::Arc(_) => "Arc",
            Geometry::Polyline(_) => "Polyline",
        }
    }

    /// 所有坐标和参数都是有限值
    pub fn is_finite(&self) -> bool {
        let finite = |p: &Point2| p.x.is_finite() && p.y.is_finite();
        match self {
            Geometry::Line(l) => finite(&l.start) && finite(&l.end),
            Geometry::Circle(c) => finite(&c.center) && c.radius.is_finite(),
            Geometry::Arc(a) => {
                finite(&a.center)
                    && a.radius.is_finite()
                    && a.start_angle.is_finite()
                    && a.end_angle.is_finite()
            }
            Geometry::Polyline(pl) => pl
                .vertices
                .iter()
                .all(|v| finite(&v.point) && v.bulge.is_finite()),
        }
    }

    /// 施加仿射变换
    ///
    /// 相似变换下圆/圆弧仍为圆/圆弧；非等比缩放或剪切时离散为多段线，
    /// `tolerance` 为变换后空间中的弦高容差。
    pub fn transformed(&self, t: &Transform2D, tolerance: f64) -> Geometry {
        let conformal = t.conformal_scale();
        let local_tolerance = tolerance / max_stretch(t).max(EPSILON);

        match (self, conformal) {
            (Geometry::Line(l), _) => {
                Geometry::Line(Line::new(t.apply_point(&l.start), t.apply_point(&l.end)))
            }
            (Geometry::Circle(c), Some(k)) => {
                Geometry::Circle(Circle::new(t.apply_point(&c.center), c.radius * k))
            }
            (Geometry::Circle(c), None) => Geometry::Polyline(
                Polyline::from_points(c.flatten(local_tolerance), true).mapped(t),
            ),
            (Geometry::Arc(a), Some(k)) => Geometry::Arc(a.transformed_conformal(t, k)),
            (Geometry::Arc(a), None) => Geometry::Polyline(
                Polyline::from_points(a.flatten(local_tolerance), false).mapped(t),
            ),
            (Geometry::Polyline(pl), Some(_)) => Geometry::Polyline(pl.mapped(t)),
            (Geometry::Polyline(pl), None) => {
                Geometry::Polyline(pl.flatten(local_tolerance).mapped(t))
            }
        }
    }
}

/// 变换对单位向量的最大拉伸（取两列范数的较大者）
fn max_stretch(t: &Transform2D) -> f64 {
    let m = &t.matrix;
    let col1 = (m[(0, 0)] * m[(0, 0)] + m[(1, 0)] * m[(1, 0)]).sqrt();
    let col2 = (m[(0, 1)] * m[(0, 1)] + m[(1, 1)] * m[(1, 1)]).sqrt();
    col1.max(col2)
}

/// 满足弦高容差所需的分段数
fn segment_count(radius: f64, sweep: f64, tolerance: f64) -> usize {
    let sweep = sweep.abs();
    if radius <= EPSILON || sweep <= EPSILON {
        return 1;
    }
    // 每个象限至少一段
    let minimum = ((sweep / FRAC_PI_2).ceil() as usize).max(1);
    let tol = tolerance.max(EPSILON).min(radius);
    let step = 2.0 * (1.0 - tol / radius).acos();
    let n = if step > EPSILON {
        (sweep / step).ceil() as usize
    } else {
        MAX_SEGMENTS
    };
    n.clamp(minimum, MAX_SEGMENTS)
}

/// 沿圆弧采样（含起止点），`sweep` 带符号，正值为逆时针
fn sample_arc(
    center: Point2,
    radius: f64,
    start_angle: f64,
    sweep: f64,
    tolerance: f64,
) -> Vec<Point2> {
    let n = segment_count(radius, sweep, tolerance);
    (0..=n)
        .map(|i| {
            let angle = start_angle + sweep * (i as f64) / (n as f64);
            Point2::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect()
}

/// 线段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start: Point2,
    pub end: Point2,
}

impl Line {
    pub fn new(start: Point2, end: Point2) -> Self {
        Self { start, end }
    }

    /// 计算线段长度
    pub fn length(&self) -> f64 {
        (self.end - self.start).norm()
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::from_points([self.start, self.end])
    }
}

/// 圆
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point2,
    pub radius: f64,
}

impl Circle {
    pub fn new(center: Point2, radius: f64) -> Self {
        Self { center, radius }
    }

    /// 离散为闭合点列（不重复首点）
    pub fn flatten(&self, tolerance: f64) -> Vec<Point2> {
        let n = segment_count(self.radius, TAU, tolerance).max(8);
        (0..n)
            .map(|i| {
                let angle = TAU * (i as f64) / (n as f64);
                Point2::new(
                    self.center.x + self.radius * angle.cos(),
                    self.center.y + self.radius * angle.sin(),
                )
            })
            .collect()
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        BoundingBox2::new(
            Point2::new(self.center.x - self.radius, self.center.y - self.radius),
            Point2::new(self.center.x + self.radius, self.center.y + self.radius),
        )
    }
}

/// 圆弧（从起始角逆时针扫到终止角）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point2,
    pub radius: f64,
    /// 起始角度（弧度）
    pub start_angle: f64,
    /// 终止角度（弧度）
    pub end_angle: f64,
}

impl Arc {
    pub fn new(center: Point2, radius: f64, start_angle: f64, end_angle: f64) -> Self {
        Self {
            center,
            radius,
            start_angle,
            end_angle,
        }
    }

    /// 计算扫过的角度
    pub fn sweep_angle(&self) -> f64 {
        let mut sweep = self.end_angle - self.start_angle;
        while sweep < 0.0 {
            sweep += TAU;
        }
        while sweep > TAU {
            sweep -= TAU;
        }
        sweep
    }

    /// 获取起点
    pub fn start_point(&self) -> Point2 {
        Point2::new(
            self.center.x + self.radius * self.start_angle.cos(),
            self.center.y + self.radius * self.start_angle.sin(),
        )
    }

    /// 获取终点
    pub fn end_point(&self) -> Point2 {
        Point2::new(
            self.center.x + self.radius * self.end_angle.cos(),
            self.center.y + self.radius * self.end_angle.sin(),
        )
    }

    /// 检查角度是否在弧的范围内
    fn contains_angle(&self, angle: f64) -> bool {
        let a = angle.rem_euclid(TAU);
        let start = self.start_angle.rem_euclid(TAU);
        let end = self.end_angle.rem_euclid(TAU);

        if start <= end {
            a >= start && a <= end
        } else {
            a >= start || a <= end
        }
    }

    /// 离散为点列（含端点）
    pub fn flatten(&self, tolerance: f64) -> Vec<Point2> {
        sample_arc(
            self.center,
            self.radius,
            self.start_angle,
            self.sweep_angle(),
            tolerance,
        )
    }

    /// 相似变换：镜像会反转绕向，因此起止点对调
    fn transformed_conformal(&self, t: &Transform2D, k: f64) -> Arc {
        let center = t.apply_point(&self.center);
        let start = t.apply_point(&self.start_point()) - center;
        let end = t.apply_point(&self.end_point()) - center;
        let start_angle = start.y.atan2(start.x);
        let end_angle = end.y.atan2(end.x);

        if t.determinant() >= 0.0 {
            Arc::new(center, self.radius * k, start_angle, end_angle)
        } else {
            Arc::new(center, self.radius * k, end_angle, start_angle)
        }
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        let mut bbox = BoundingBox2::from_points([self.start_point(), self.end_point()]);

        // 检查象限点
        for angle in [0.0, FRAC_PI_2, 2.0 * FRAC_PI_2, 3.0 * FRAC_PI_2] {
            if self.contains_angle(angle) {
                bbox.expand_to_include(&Point2::new(
                    self.center.x + self.radius * angle.cos(),
                    self.center.y + self.radius * angle.sin(),
                ));
            }
        }

        bbox
    }
}

/// 多段线顶点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolylineVertex {
    pub point: Point2,
    /// 凸度（bulge）- 用于弧线段，0表示直线，正值为逆时针
    pub bulge: f64,
}

impl PolylineVertex {
    pub fn new(point: Point2) -> Self {
        Self { point, bulge: 0.0 }
    }

    pub fn with_bulge(point: Point2, bulge: f64) -> Self {
        Self { point, bulge }
    }
}

/// 多段线
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub vertices: Vec<PolylineVertex>,
    /// 是否闭合
    pub closed: bool,
}

impl Polyline {
    pub fn new(vertices: Vec<PolylineVertex>, closed: bool) -> Self {
        Self { vertices, closed }
    }

    /// 从点列表创建（所有顶点都是直线连接）
    pub fn from_points(points: impl IntoIterator<Item = Point2>, closed: bool) -> Self {
        Self {
            vertices: points.into_iter().map(PolylineVertex::new).collect(),
            closed,
        }
    }

    /// 左上角在原点的闭合矩形
    pub fn rectangle(width: f64, height: f64) -> Self {
        Self::from_points(
            [
                Point2::new(0.0, 0.0),
                Point2::new(width, 0.0),
                Point2::new(width, height),
                Point2::new(0.0, height),
            ],
            true,
        )
    }

    /// 线段数量
    pub fn segment_count(&self) -> usize {
        if self.vertices.len() < 2 {
            return 0;
        }
        if self.closed {
            self.vertices.len()
        } else {
            self.vertices.len() - 1
        }
    }

    pub fn has_bulges(&self) -> bool {
        self.vertices.iter().any(|v| v.bulge.abs() >= EPSILON)
    }

    /// 顶点逐个映射；镜像变换下凸度取反
    fn mapped(&self, t: &Transform2D) -> Polyline {
        let flip = if t.determinant() < 0.0 { -1.0 } else { 1.0 };
        Polyline {
            vertices: self
                .vertices
                .iter()
                .map(|v| PolylineVertex::with_bulge(t.apply_point(&v.point), v.bulge * flip))
                .collect(),
            closed: self.closed,
        }
    }

    /// 将凸度弧段离散为直线段
    pub fn flatten(&self, tolerance: f64) -> Polyline {
        if !self.has_bulges() {
            return self.clone();
        }

        let mut points = Vec::with_capacity(self.vertices.len() * 4);
        for i in 0..self.segment_count() {
            let v1 = &self.vertices[i];
            let v2 = &self.vertices[(i + 1) % self.vertices.len()];
            points.push(v1.point);

            if v1.bulge.abs() >= EPSILON {
                if let Some((center, radius, start_angle, sweep)) = bulge_arc(v1, v2) {
                    let samples = sample_arc(center, radius, start_angle, sweep, tolerance);
                    // 去掉首尾（首点已加入，尾点是下一个顶点）
                    let interior = samples.len().saturating_sub(1);
                    points.extend(samples.into_iter().take(interior).skip(1));
                }
            }
        }
        if !self.closed {
            if let Some(last) = self.vertices.last() {
                points.push(last.point);
            }
        }

        Polyline::from_points(points, self.closed)
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        if self.vertices.is_empty() {
            return BoundingBox2::empty();
        }
        if self.has_bulges() {
            return self.flatten(crate::math::DEFAULT_TOLERANCE).bounding_box();
        }
        BoundingBox2::from_points(self.vertices.iter().map(|v| v.point))
    }
}

/// 将顶点对的凸度段转换为 (圆心, 半径, 起始角, 带符号扫角)
fn bulge_arc(v1: &PolylineVertex, v2: &PolylineVertex) -> Option<(Point2, f64, f64, f64)> {
    let chord = v2.point - v1.point;
    let chord_len = chord.norm();

    if chord_len < EPSILON {
        return None;
    }

    let bulge = v1.bulge;
    let s = chord_len / 2.0;
    let h = s * bulge; // 弧高

    let mid = Point2::new(
        (v1.point.x + v2.point.x) / 2.0,
        (v1.point.y + v2.point.y) / 2.0,
    );

    let radius = (s * s + h * h) / (2.0 * h.abs());
    let d = radius - h.abs(); // 圆心到弦的距离

    // 弦的垂直方向
    let perp = if bulge > 0.0 {
        Vector2::new(-chord.y, chord.x).normalize()
    } else {
        Vector2::new(chord.y, -chord.x).normalize()
    };

    let center = mid + perp * d;
    let start_angle = (v1.point.y - center.y).atan2(v1.point.x - center.x);
    let sweep = 4.0 * bulge.atan();

    Some((center, radius, start_angle, sweep))
}

/// 命名子模型
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedModel {
    pub name: String,
    pub model: VectorModel,
}

/// 矢量模型：图元 + 命名子模型
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorModel {
    pub paths: Vec<Geometry>,
    pub models: Vec<NamedModel>,
}

impl VectorModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_paths(paths: Vec<Geometry>) -> Self {
        Self {
            paths,
            models: Vec::new(),
        }
    }

    /// 左上角在原点的矩形模型（占位用）
    pub fn rectangle(width: f64, height: f64) -> Self {
        Self::from_paths(vec![Geometry::Polyline(Polyline::rectangle(width, height))])
    }

    pub fn push(&mut self, geometry: Geometry) {
        self.paths.push(geometry);
    }

    /// 添加子模型，同层重名时自动追加序号，返回实际使用的名称
    pub fn add_model(&mut self, name: &str, model: VectorModel) -> String {
        let name = unique_name(name, |candidate| {
            self.models.iter().any(|m| m.name == candidate)
        });
        self.models.push(NamedModel {
            name: name.clone(),
            model,
        });
        name
    }

    /// 递归统计图元数量
    pub fn path_count(&self) -> usize {
        self.paths.len() + self.models.iter().map(|m| m.model.path_count()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.path_count() == 0
    }

    /// 递归收集所有图元
    pub fn all_paths(&self) -> Vec<&Geometry> {
        let mut out: Vec<&Geometry> = self.paths.iter().collect();
        for child in &self.models {
            out.extend(child.model.all_paths());
        }
        out
    }

    pub fn bounding_box(&self) -> BoundingBox2 {
        self.all_paths()
            .into_iter()
            .fold(BoundingBox2::empty(), |acc, g| acc.union(&g.bounding_box()))
    }

    pub fn is_finite(&self) -> bool {
        self.paths.iter().all(Geometry::is_finite)
            && self.models.iter().all(|m| m.model.is_finite())
    }

    /// 递归施加仿射变换
    pub fn transform(&mut self, t: &Transform2D, tolerance: f64) {
        for path in &mut self.paths {
            *path = path.transformed(t, tolerance);
        }
        for child in &mut self.models {
            child.model.transform(t, tolerance);
        }
    }

    /// 平移
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.transform(&Transform2D::translation(dx, dy), crate::math::DEFAULT_TOLERANCE);
    }

    /// 相对原点缩放；非等比时圆与圆弧按容差离散
    pub fn scale(&mut self, sx: f64, sy: f64, tolerance: f64) {
        self.transform(&Transform2D::scale(sx, sy), tolerance);
    }
}

/// 生成在 `is_taken` 下唯一的名称：`base`, `base_2`, `base_3`, ...
pub fn unique_name(base: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(base) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
