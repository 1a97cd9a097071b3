//! 核心计算错误定义

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("Invalid dimension: {name} = {value} (must be > 0)")]
    InvalidDimension { name: &'static str, value: f64 },

    #[error("Invalid scale: {0} (must be > 0)")]
    InvalidScale(f64),

    #[error("Degenerate transform: {0}")]
    Degenerate(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
