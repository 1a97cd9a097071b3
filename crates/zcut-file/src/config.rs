//! 导出配置
//!
//! 以 JSON 文件保存；缺省字段使用默认值。命令行参数在此基础上覆盖。

use crate::error::{ExportError, ExportResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 字体来源
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FontSource {
    /// 远程字体服务：`{base_url}/{family}.{ext}`
    Http { base_url: String },
    /// 本地字体目录：`{path}/{family}.{ext}`
    Directory { path: PathBuf },
}

impl Default for FontSource {
    fn default() -> Self {
        FontSource::Directory {
            path: PathBuf::from("fonts"),
        }
    }
}

/// 文字尺寸语义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextSizing {
    /// 字号等于大写字母高度
    #[default]
    CapHeight,
    /// 字号等于 em 方框
    Em,
}

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Dxf,
    /// 预览用 SVG
    Svg,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Dxf => "dxf",
            ExportFormat::Svg => "svg",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dxf" => Ok(ExportFormat::Dxf),
            "svg" => Ok(ExportFormat::Svg),
            other => Err(ExportError::Config(format!("unknown export format: {}", other))),
        }
    }
}

/// 导出配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub font_source: FontSource,
    /// 字体文件扩展名
    pub font_extension: String,
    /// 网络请求超时（秒）
    pub http_timeout_secs: u64,
    pub user_agent: String,
    /// 曲线离散容差（英寸）
    pub curve_tolerance: f64,
    pub text_sizing: TextSizing,
    pub format: ExportFormat,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            font_source: FontSource::default(),
            font_extension: "ttf".to_string(),
            http_timeout_secs: 30,
            user_agent: concat!("zcut/", env!("CARGO_PKG_VERSION")).to_string(),
            curve_tolerance: 0.002,
            text_sizing: TextSizing::CapHeight,
            format: ExportFormat::Dxf,
        }
    }
}

impl ExportConfig {
    /// 从 JSON 文件加载
    pub fn load(path: &Path) -> ExportResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: ExportConfig = serde_json::from_str(&text)?;
        config.validate()?;
        tracing::debug!("已加载配置 {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> ExportResult<()> {
        if !(self.curve_tolerance.is_finite() && self.curve_tolerance > 0.0) {
            return Err(ExportError::Config(format!(
                "curve_tolerance must be positive, got {}",
                self.curve_tolerance
            )));
        }
        if self.font_extension.is_empty() {
            return Err(ExportError::Config("font_extension is empty".to_string()));
        }
        if let FontSource::Http { base_url } = &self.font_source {
            url::Url::parse(base_url).map_err(|e| {
                ExportError::Config(format!("invalid font base_url {}: {}", base_url, e))
            })?;
        }
        Ok(())
    }
}
