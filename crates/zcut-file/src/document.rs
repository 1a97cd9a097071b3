//! 加工文档
//!
//! 有序、命名唯一的矢量模型集合，单位英寸，y 向上，原点在画布帧左下角。

use serde::{Deserialize, Serialize};
use zcut_core::geometry::{unique_name, NamedModel, VectorModel};
use zcut_core::math::BoundingBox2;

/// 文档单位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DocumentUnits {
    #[default]
    Inches,
}

/// 清理模型名：只保留字母、数字、`-` 和 `_`
///
/// DXF 图层名不允许 `<>/\":;?*|=,` 等字符。
pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('_');
    if cleaned.is_empty() {
        "model".to_string()
    } else {
        cleaned.to_string()
    }
}

/// 加工文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManufacturingDocument {
    /// 设计标识
    pub name: String,
    pub units: DocumentUnits,
    /// 画布帧宽度（英寸）
    pub width: f64,
    /// 画布帧高度（英寸）
    pub height: f64,
    pub models: Vec<NamedModel>,
}

impl ManufacturingDocument {
    pub fn new(name: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            name: name.into(),
            units: DocumentUnits::Inches,
            width,
            height,
            models: Vec::new(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.iter().any(|m| m.name == name)
    }

    /// 添加模型，名称清理后保证唯一（`name`, `name_2`, ...），返回实际名称
    pub fn add_model(&mut self, name: &str, model: VectorModel) -> String {
        let name = unique_name(&sanitize_name(name), |candidate| self.contains(candidate));
        self.models.push(NamedModel {
            name: name.clone(),
            model,
        });
        name
    }

    pub fn get(&self, name: &str) -> Option<&VectorModel> {
        self.models.iter().find(|m| m.name == name).map(|m| &m.model)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// 全部几何的包围盒
    pub fn bounding_box(&self) -> BoundingBox2 {
        self.models
            .iter()
            .fold(BoundingBox2::empty(), |acc, m| acc.union(&m.model.bounding_box()))
    }
}
