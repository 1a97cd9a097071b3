//! 导出错误定义

use thiserror::Error;
use zcut_core::error::CoreError;

#[derive(Error, Debug)]
pub enum ExportError {
    /// 画布帧尺寸或比例无效，整次导出终止
    #[error("Invalid dimension: {0}")]
    InvalidDimension(CoreError),

    #[error("Geometry error: {0}")]
    Core(#[from] CoreError),

    #[error("Font not loaded: {0}")]
    FontNotLoaded(String),

    #[error("Vector source fetch failed for {source_ref}: {reason}")]
    VectorSourceFetchFailed { source_ref: String, reason: String },

    #[error("Vector source parse failed for {source_ref}: {reason}")]
    VectorParseFailed { source_ref: String, reason: String },

    #[error("Model conversion failed for {id} ({kind}, source {source_ref}): {reason}")]
    ModelConversionFailed {
        id: String,
        kind: &'static str,
        source_ref: String,
        reason: String,
    },

    #[error("Document serialization failed: {0}")]
    DocumentSerializationFailed(String),

    #[error("An export is already in progress")]
    ExportInProgress,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;
