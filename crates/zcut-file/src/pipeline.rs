//! 导出任务
//!
//! 一次导出的完整流程：
//! 1. 校验画布帧（失败即终止，不做任何工作）
//! 2. 收集设计中用到的字体族，并发加载并等待全部完成
//! 3. 逐个转换元素并组装文档
//! 4. 序列化，返回文件名与字节，由宿主负责写文件
//!
//! 同一管线上不允许重叠导出，第二次调用立即返回 [`ExportError::ExportInProgress`]。

use crate::assemble::{assemble, serialize, AssemblyReport};
use crate::config::{ExportConfig, ExportFormat};
use crate::convert::ConvertContext;
use crate::document::sanitize_name;
use crate::error::{ExportError, ExportResult};
use crate::font::{loader_from_config, FontCache, FontLoader};
use crate::source::{HttpSourceFetcher, SourceCache, SourceFetcher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use zcut_core::scene::DesignSnapshot;

/// 导出结果
#[derive(Debug)]
pub struct ExportOutcome {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub report: AssemblyReport,
}

/// 由设计标识确定输出文件名
pub fn file_name_for(design_id: &str, format: ExportFormat) -> String {
    format!("{}.{}", sanitize_name(design_id), format.extension())
}

/// 导出进行中标志，离开作用域时清除
struct ExportGuard<'a>(&'a AtomicBool);

impl<'a> ExportGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> ExportResult<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(ExportError::ExportInProgress);
        }
        Ok(Self(flag))
    }
}

impl Drop for ExportGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// 导出管线
pub struct ExportPipeline {
    config: ExportConfig,
    fonts: Arc<FontCache>,
    sources: Arc<SourceCache>,
    running: AtomicBool,
}

impl ExportPipeline {
    pub fn new(config: ExportConfig, fonts: Arc<FontCache>, sources: Arc<SourceCache>) -> Self {
        Self {
            config,
            fonts,
            sources,
            running: AtomicBool::new(false),
        }
    }

    /// 使用指定的字体加载器和图稿来源
    pub fn with_loaders(
        config: ExportConfig,
        font_loader: Arc<dyn FontLoader>,
        fetcher: Arc<dyn SourceFetcher>,
    ) -> Self {
        Self::new(
            config,
            Arc::new(FontCache::new(font_loader)),
            Arc::new(SourceCache::new(fetcher)),
        )
    }

    /// 按配置构建网络/本地加载器
    pub fn from_config(config: ExportConfig) -> ExportResult<Self> {
        config.validate()?;
        let font_loader = loader_from_config(&config)?;
        let fetcher: Arc<dyn SourceFetcher> = Arc::new(HttpSourceFetcher::from_config(&config)?);
        Ok(Self::with_loaders(config, font_loader, fetcher))
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 执行一次导出
    pub async fn export(&self, snapshot: &DesignSnapshot) -> ExportResult<ExportOutcome> {
        let _guard = ExportGuard::acquire(&self.running)?;

        snapshot.frame.validate().map_err(ExportError::InvalidDimension)?;
        let scale = snapshot.frame.scale().map_err(ExportError::InvalidDimension)?;
        tracing::info!(
            "开始导出 {}: {}x{} 英寸, 比例 {} 像素/英寸",
            snapshot.id,
            snapshot.frame.real_width,
            snapshot.frame.real_height,
            scale
        );

        let placed = snapshot.placed_elements();
        let families: Vec<&str> = placed.iter().filter_map(|p| p.element.font_family()).collect();
        let fonts = self.fonts.preload(families).await;
        tracing::debug!("已解析 {} 个字体族", fonts.len());

        let ctx = ConvertContext {
            frame: &snapshot.frame,
            scale,
            fonts: &fonts,
            sources: &self.sources,
            text_sizing: self.config.text_sizing,
            tolerance: self.config.curve_tolerance,
        };
        let report = assemble(&ctx, &snapshot.id, &snapshot.backgrounds, &placed).await;

        let bytes = serialize(&report.document, self.config.format)?;
        let file_name = file_name_for(&snapshot.id, self.config.format);
        tracing::info!("导出完成 {} ({} 字节)", file_name, bytes.len());

        Ok(ExportOutcome {
            file_name,
            bytes,
            report,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use zcut_core::scale::CanvasFrame;

    struct Nothing;

    #[async_trait]
    impl FontLoader for Nothing {
        async fn load(&self, family: &str) -> ExportResult<Vec<u8>> {
            Err(ExportError::FontNotLoaded(family.to_string()))
        }
    }

    #[async_trait]
    impl SourceFetcher for Nothing {
        async fn fetch(&self, source_ref: &str) -> ExportResult<Vec<u8>> {
            Err(ExportError::VectorSourceFetchFailed {
                source_ref: source_ref.to_string(),
                reason: "offline".to_string(),
            })
        }
    }

    fn pipeline() -> ExportPipeline {
        ExportPipeline::with_loaders(ExportConfig::default(), Arc::new(Nothing), Arc::new(Nothing))
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name_for("order 1042", ExportFormat::Dxf), "order_1042.dxf");
        assert_eq!(file_name_for("plate", ExportFormat::Svg), "plate.svg");
    }

    #[tokio::test]
    async fn test_invalid_frame_is_fatal() {
        let snapshot = DesignSnapshot::new("bad", CanvasFrame::new(0.0, 18.0, 1200.0, 900.0));
        let err = pipeline().export(&snapshot).await.unwrap_err();
        assert!(matches!(err, ExportError::InvalidDimension(_)));
    }

    #[test]
    fn test_guard_blocks_overlap() {
        let flag = AtomicBool::new(false);
        let first = ExportGuard::acquire(&flag).unwrap();
        assert!(matches!(
            ExportGuard::acquire(&flag),
            Err(ExportError::ExportInProgress)
        ));
        drop(first);
        assert!(ExportGuard::acquire(&flag).is_ok());
    }

    #[tokio::test]
    async fn test_flag_cleared_after_export() {
        let p = pipeline();
        let snapshot = DesignSnapshot::new("empty", CanvasFrame::new(24.0, 18.0, 1200.0, 900.0));
        let outcome = p.export(&snapshot).await.unwrap();
        assert_eq!(outcome.file_name, "empty.dxf");
        assert!(outcome.report.document.is_empty());
        assert!(!p.is_running());
    }
}
