//! 设计树与绝对变换
//!
//! 编辑画布交给导出管线的是一份不可变的设计快照：一棵由分组和元素组成的树，
//! 每个节点只携带自己的局部变换。这里显式地按父→子顺序做矩阵组合，
//! 求出每个元素的绝对变换，不依赖任何宿主场景图的隐式缓存。

use crate::element::DesignElement;
use crate::scale::CanvasFrame;
use crate::error::CoreResult;
use crate::transform::{decompose, Decomposed, Transform2D};
use crate::zone::EditZone;
use serde::{Deserialize, Serialize};

fn default_scale() -> f64 {
    1.0
}

/// 分组：自身的位置/旋转/缩放作用于所有子节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignGroup {
    #[serde(default)]
    pub id: Option<String>,
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
    pub children: Vec<DesignNode>,
}

impl DesignGroup {
    pub fn new(children: Vec<DesignNode>) -> Self {
        Self {
            id: None,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            children,
        }
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

    pub fn local_transform(&self) -> Transform2D {
        Transform2D::scale(self.scale_x, self.scale_y)
            .then(&Transform2D::rotation(self.rotation.to_radians()))
            .then(&Transform2D::translation(self.x, self.y))
    }
}

/// 设计树节点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum DesignNode {
    Group(DesignGroup),
    Element(DesignElement),
}

/// 背景/模板层（真实尺寸，左上角与画布帧左上角对齐）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundLayer {
    #[serde(default)]
    pub name: Option<String>,
    pub source: String,
    /// 真实宽度（英寸）
    pub real_width: f64,
    /// 真实高度（英寸）
    pub real_height: f64,
}

/// 设计快照：编辑画布与导出管线之间的交接物
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignSnapshot {
    /// 设计标识，决定导出文件名
    pub id: String,
    pub frame: CanvasFrame,
    #[serde(default)]
    pub nodes: Vec<DesignNode>,
    #[serde(default)]
    pub backgrounds: Vec<BackgroundLayer>,
    #[serde(default)]
    pub zones: Vec<EditZone>,
}

impl DesignSnapshot {
    pub fn new(id: impl Into<String>, frame: CanvasFrame) -> Self {
        Self {
            id: id.into(),
            frame,
            nodes: Vec::new(),
            backgrounds: Vec::new(),
            zones: Vec::new(),
        }
    }

    pub fn with_element(mut self, element: DesignElement) -> Self {
        self.nodes.push(DesignNode::Element(element));
        self
    }

    pub fn with_group(mut self, group: DesignGroup) -> Self {
        self.nodes.push(DesignNode::Group(group));
        self
    }

    pub fn with_background(mut self, layer: BackgroundLayer) -> Self {
        self.backgrounds.push(layer);
        self
    }

    /// 按 z 序展开的元素列表
    pub fn placed_elements(&self) -> Vec<PlacedElement<'_>> {
        flatten(&self.nodes)
    }
}

/// 已求出绝对变换的元素
#[derive(Debug, Clone)]
pub struct PlacedElement<'a> {
    pub element: &'a DesignElement,
    /// 画布像素坐标系下的绝对变换
    pub absolute: Transform2D,
    /// 元素在树中的先序位置
    pub order: usize,
}

impl PlacedElement<'_> {
    /// 将绝对变换分解为平移/旋转/缩放
    pub fn decompose(&self) -> CoreResult<Decomposed> {
        decompose(&self.absolute)
    }
}

/// 父→子矩阵组合，展开整棵树
///
/// 结果按 z 序稳定排序；z 序相同的元素保持树中的先序顺序。
pub fn flatten(nodes: &[DesignNode]) -> Vec<PlacedElement<'_>> {
    let mut out = Vec::new();
    visit(nodes, &Transform2D::identity(), &mut out);
    out.sort_by_key(|p| p.element.z_order);
    out
}

fn visit<'a>(nodes: &'a [DesignNode], parent: &Transform2D, out: &mut Vec<PlacedElement<'a>>) {
    for node in nodes {
        match node {
            DesignNode::Group(group) => {
                let absolute = Transform2D::compose(parent, &group.local_transform());
                visit(&group.children, &absolute, out);
            }
            DesignNode::Element(element) => {
                let absolute = Transform2D::compose(parent, &element.local_transform());
                let order = out.len();
                out.push(PlacedElement {
                    element,
                    absolute,
                    order,
                });
            }
        }
    }
}
