//! ZCUT 导出管线
//!
//! 把编辑画布上的设计快照转换为真实尺寸的加工文件：
//! - 文字 → 字形轮廓（`ttf-parser`）
//! - 矢量图稿 → 归一化几何（`usvg`）
//! - 像素/y 向下 → 英寸/y 向上
//! - `.dxf` 输出，另有 SVG 预览

pub mod assemble;
pub mod config;
pub mod convert;
pub mod document;
pub mod dxf_io;
pub mod error;
pub mod font;
pub mod glyph;
pub mod normalize;
pub mod outline;
pub mod pipeline;
pub mod source;
pub mod svg_io;

pub use assemble::{assemble, serialize, AssemblyReport, DegradedElement, SkippedElement};
pub use config::{ExportConfig, ExportFormat, FontSource, TextSizing};
pub use document::ManufacturingDocument;
pub use error::{ExportError, ExportResult};
pub use font::{
    DirectoryFontLoader, FontCache, FontLoader, FontResource, HttpFontLoader, LoadedFonts,
};
pub use glyph::{text_to_path, TextLayout, TextOptions};
pub use normalize::{normalize, normalize_bytes, Fallback, Normalized, NormalizeOptions};
pub use pipeline::{file_name_for, ExportOutcome, ExportPipeline};
pub use source::{HttpSourceFetcher, SourceCache, SourceFetcher};
