//! 编辑区约束
//!
//! 部分元素必须留在设计者划定的矩形区域内。拖动/缩放过程中每一帧都会调用这里，
//! 纯算术，不做任何 I/O。

use crate::error::{CoreError, CoreResult};
use crate::scale::{to_pixels, CanvasFrame};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 编辑区：真实单位（英寸），从画布帧左上角量起，y 向下
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditZone {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl EditZone {
    pub fn new(id: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            width,
            height,
        }
    }

    /// 换算为画布像素矩形
    pub fn to_pixels(&self, scale: f64) -> CoreResult<PixelRect> {
        if !(self.width > 0.0 && self.height > 0.0) {
            return Err(CoreError::InvalidDimension {
                name: "zone size",
                value: self.width.min(self.height),
            });
        }
        Ok(PixelRect {
            left: to_pixels(self.x, scale)?,
            top: to_pixels(self.y, scale)?,
            width: to_pixels(self.width, scale)?,
            height: to_pixels(self.height, scale)?,
        })
    }
}

/// 像素矩形（左上角 + 尺寸）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl PixelRect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// 元素在画布上的包围盒
///
/// 显示尺寸 = 原始尺寸 × 缩放系数。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementBounds {
    pub left: f64,
    pub top: f64,
    pub natural_width: f64,
    pub natural_height: f64,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl ElementBounds {
    pub fn width(&self) -> f64 {
        self.natural_width * self.scale_x
    }

    pub fn height(&self) -> f64 {
        self.natural_height * self.scale_y
    }

    pub fn right(&self) -> f64 {
        self.left + self.width()
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height()
    }
}

/// 单轴约束：返回 (起点, 缩放)
fn constrain_axis(
    start: f64,
    natural: f64,
    scale: f64,
    zone_start: f64,
    zone_size: f64,
) -> (f64, f64) {
    let mut scale = scale;
    let mut size = natural * scale;
    if size > zone_size && natural > 0.0 {
        scale = zone_size / natural;
        size = zone_size;
    }

    let zone_end = zone_start + zone_size;
    let start = if start < zone_start {
        zone_start
    } else if start + size > zone_end {
        zone_end - size
    } else {
        start
    };
    (start, scale)
}

/// 将元素包围盒约束在编辑区内
///
/// 每个轴独立处理：超出尺寸时先把该轴缩放降到 `zone_size / natural_size`
/// （不保持宽高比），再把越界一侧的边对齐到编辑区边界。
pub fn constrain(bounds: ElementBounds, zone: &PixelRect) -> ElementBounds {
    let (left, scale_x) = constrain_axis(
        bounds.left,
        bounds.natural_width,
        bounds.scale_x,
        zone.left,
        zone.width,
    );
    let (top, scale_y) = constrain_axis(
        bounds.top,
        bounds.natural_height,
        bounds.scale_y,
        zone.top,
        zone.height,
    );
    ElementBounds {
        left,
        top,
        scale_x,
        scale_y,
        ..bounds
    }
}

/// 编辑区查找表
#[derive(Debug, Clone, Default)]
pub struct ZoneConstraintEngine {
    zones: HashMap<String, EditZone>,
}

impl ZoneConstraintEngine {
    pub fn new(zones: impl IntoIterator<Item = EditZone>) -> Self {
        Self {
            zones: zones.into_iter().map(|z| (z.id.clone(), z)).collect(),
        }
    }

    pub fn insert(&mut self, zone: EditZone) {
        self.zones.insert(zone.id.clone(), zone);
    }

    pub fn get(&self, id: &str) -> Option<&EditZone> {
        self.zones.get(id)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// 按元素的 zone_id 约束包围盒
    ///
    /// 没有 zone_id 或找不到对应编辑区的元素原样返回。
    pub fn apply(
        &self,
        zone_id: Option<&str>,
        bounds: ElementBounds,
        frame: &CanvasFrame,
    ) -> CoreResult<ElementBounds> {
        let Some(id) = zone_id else {
            return Ok(bounds);
        };
        let Some(zone) = self.zones.get(id) else {
            tracing::debug!("未知编辑区 {}，不做约束", id);
            return Ok(bounds);
        };
        let rect = zone.to_pixels(frame.scale()?)?;
        Ok(constrain(bounds, &rect))
    }
}
