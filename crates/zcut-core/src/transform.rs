//! 二维仿射变换
//!
//! 使用 3x3 齐次矩阵表示平移/旋转/缩放的组合，并提供独立的分解例程：
//! 设计树中各层的局部变换先按父→子顺序相乘得到绝对矩阵，
//! 再分解为平移、旋转、缩放（以及剪切）分量供后续按步骤执行。
//!
//! 矩阵约定（列向量）：
//!
//! ```text
//! | a  c  e |
//! | b  d  f |
//! | 0  0  1 |
//! ```

use crate::error::{CoreError, CoreResult};
use crate::math::{Matrix3, Point2, Vector2, EPSILON};

/// 二维仿射变换
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform2D {
    pub matrix: Matrix3,
}

impl Transform2D {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
        }
    }

    pub fn from_matrix(matrix: Matrix3) -> Self {
        Self { matrix }
    }

    pub fn translation(dx: f64, dy: f64) -> Self {
        Self {
            matrix: Matrix3::new(1.0, 0.0, dx, 0.0, 1.0, dy, 0.0, 0.0, 1.0),
        }
    }

    /// 绕原点旋转（弧度，数学正方向：x 轴转向 y 轴）
    pub fn rotation(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self {
            matrix: Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0),
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            matrix: Matrix3::new(sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0),
        }
    }

    /// 先应用 self，再应用 next
    pub fn then(&self, next: &Transform2D) -> Transform2D {
        Transform2D {
            matrix: next.matrix * self.matrix,
        }
    }

    /// 父变换与子变换组合：结果 = parent · child
    pub fn compose(parent: &Transform2D, child: &Transform2D) -> Transform2D {
        Transform2D {
            matrix: parent.matrix * child.matrix,
        }
    }

    pub fn apply_point(&self, p: &Point2) -> Point2 {
        let m = &self.matrix;
        Point2::new(
            m[(0, 0)] * p.x + m[(0, 1)] * p.y + m[(0, 2)],
            m[(1, 0)] * p.x + m[(1, 1)] * p.y + m[(1, 2)],
        )
    }

    pub fn apply_vector(&self, v: &Vector2) -> Vector2 {
        let m = &self.matrix;
        Vector2::new(
            m[(0, 0)] * v.x + m[(0, 1)] * v.y,
            m[(1, 0)] * v.x + m[(1, 1)] * v.y,
        )
    }

    /// 线性部分的行列式（负值表示包含镜像）
    pub fn determinant(&self) -> f64 {
        let m = &self.matrix;
        m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)]
    }

    pub fn translation_part(&self) -> Vector2 {
        Vector2::new(self.matrix[(0, 2)], self.matrix[(1, 2)])
    }

    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite())
    }

    /// 若线性部分是相似变换（等比缩放 + 旋转 + 可能的镜像），返回缩放系数
    ///
    /// 圆和圆弧只有在相似变换下才仍是圆和圆弧。
    pub fn conformal_scale(&self) -> Option<f64> {
        let m = &self.matrix;
        let (a, b, c, d) = (m[(0, 0)], m[(1, 0)], m[(0, 1)], m[(1, 1)]);
        let col1 = a * a + b * b;
        let col2 = c * c + d * d;
        let tol = 1e-9 * col1.max(col2).max(1.0);
        if (a * c + b * d).abs() <= tol && (col1 - col2).abs() <= tol && col1 > EPSILON {
            Some(col1.sqrt())
        } else {
            None
        }
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

/// 分解结果：M = T · R · K · S
///
/// - `translation`: 平移
/// - `rotation`: 旋转（弧度）
/// - `skew`: 水平剪切角（弧度），正交变换下为 0
/// - `scale_x` / `scale_y`: 缩放；`scale_y` 为负表示变换含镜像
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposed {
    pub translation: Vector2,
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub skew: f64,
}

impl Decomposed {
    /// 旋转角（度）
    pub fn rotation_degrees(&self) -> f64 {
        self.rotation.to_degrees()
    }

    pub fn has_skew(&self) -> bool {
        self.skew.abs() > 1e-9
    }

    /// 按 T · R · K · S 重新组合
    pub fn compose(&self) -> Transform2D {
        let shear = Transform2D::from_matrix(Matrix3::new(
            1.0,
            self.skew.tan(),
            0.0,
            0.0,
            1.0,
            0.0,
            0.0,
            0.0,
            1.0,
        ));
        Transform2D::scale(self.scale_x, self.scale_y)
            .then(&shear)
            .then(&Transform2D::rotation(self.rotation))
            .then(&Transform2D::translation(self.translation.x, self.translation.y))
    }
}

/// 将仿射矩阵分解为平移/旋转/剪切/缩放（QR 分解）
///
/// 线性部分退化（任一轴缩放为 0）或含非有限值时返回 [`CoreError::Degenerate`]。
pub fn decompose(transform: &Transform2D) -> CoreResult<Decomposed> {
    if !transform.is_finite() {
        return Err(CoreError::Degenerate("matrix contains non-finite values".to_string()));
    }

    let m = &transform.matrix;
    let (a, b, c, d) = (m[(0, 0)], m[(1, 0)], m[(0, 1)], m[(1, 1)]);

    let scale_x = (a * a + b * b).sqrt();
    if scale_x < EPSILON {
        return Err(CoreError::Degenerate("zero horizontal scale".to_string()));
    }

    let det = a * d - b * c;
    if det.abs() < EPSILON {
        return Err(CoreError::Degenerate("zero vertical scale".to_string()));
    }

    let rotation = b.atan2(a);
    let scale_y = det / scale_x;
    let skew = ((a * c + b * d) / det).atan();

    Ok(Decomposed {
        translation: transform.translation_part(),
        rotation,
        scale_x,
        scale_y,
        skew,
    })
}
