//! 图稿来源
//!
//! 图稿和背景层通过引用（URL 或路径）获取原始字节。获取结果按引用缓存，
//! 进程内共享，只在首次解析时写入。

use crate::config::ExportConfig;
use crate::error::{ExportError, ExportResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

/// 图稿字节来源
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, source_ref: &str) -> ExportResult<Vec<u8>>;
}

/// 支持 `http(s)://`、`file://` 与本地路径
pub struct HttpSourceFetcher {
    client: reqwest::Client,
}

impl HttpSourceFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> ExportResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ExportError::Config(format!("http client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &ExportConfig) -> ExportResult<Self> {
        Self::new(Duration::from_secs(config.http_timeout_secs), &config.user_agent)
    }
}

fn fetch_failed(source_ref: &str, reason: impl std::fmt::Display) -> ExportError {
    ExportError::VectorSourceFetchFailed {
        source_ref: source_ref.to_string(),
        reason: reason.to_string(),
    }
}

/// 引用的解析结果
#[derive(Debug, Clone, PartialEq)]
enum SourceLocation {
    Remote(url::Url),
    Local(PathBuf),
}

fn locate(source_ref: &str) -> ExportResult<SourceLocation> {
    match url::Url::parse(source_ref) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(SourceLocation::Remote(url)),
            "file" => url
                .to_file_path()
                .map(SourceLocation::Local)
                .map_err(|_| fetch_failed(source_ref, "invalid file url")),
            // Windows 盘符会被解析成单字母 scheme
            scheme if scheme.len() == 1 => Ok(SourceLocation::Local(PathBuf::from(source_ref))),
            scheme => Err(fetch_failed(source_ref, format!("unsupported scheme {}", scheme))),
        },
        Err(_) => Ok(SourceLocation::Local(PathBuf::from(source_ref))),
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, source_ref: &str) -> ExportResult<Vec<u8>> {
        match locate(source_ref)? {
            SourceLocation::Remote(url) => {
                tracing::debug!("请求图稿 {}", url);
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| fetch_failed(source_ref, e))?;
                let bytes = response.bytes().await.map_err(|e| fetch_failed(source_ref, e))?;
                Ok(bytes.to_vec())
            }
            SourceLocation::Local(path) => tokio::fs::read(&path)
                .await
                .map_err(|e| fetch_failed(source_ref, e)),
        }
    }
}

type SourceSlot = Arc<OnceCell<Result<Arc<Vec<u8>>, String>>>;

/// 图稿字节缓存
pub struct SourceCache {
    fetcher: Arc<dyn SourceFetcher>,
    slots: Mutex<HashMap<String, SourceSlot>>,
}

impl SourceCache {
    pub fn new(fetcher: Arc<dyn SourceFetcher>) -> Self {
        Self {
            fetcher,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// 获取图稿字节；同一引用只请求一次，失败同样缓存
    pub async fn get(&self, source_ref: &str) -> ExportResult<Arc<Vec<u8>>> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(source_ref.to_string()).or_default().clone()
        };
        let result = slot
            .get_or_init(|| async {
                self.fetcher
                    .fetch(source_ref)
                    .await
                    .map(Arc::new)
                    .map_err(|e| match e {
                        ExportError::VectorSourceFetchFailed { reason, .. } => reason,
                        other => other.to_string(),
                    })
            })
            .await;
        result.clone().map_err(|reason| fetch_failed(source_ref, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticFetcher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SourceFetcher for StaticFetcher {
        async fn fetch(&self, source_ref: &str) -> ExportResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if source_ref.ends_with(".svg") {
                Ok(b"<svg/>".to_vec())
            } else {
                Err(fetch_failed(source_ref, "404"))
            }
        }
    }

    #[test]
    fn test_locate() {
        assert!(matches!(
            locate("https://cdn.example.com/a.svg").unwrap(),
            SourceLocation::Remote(_)
        ));
        assert_eq!(
            locate("art/logo.svg").unwrap(),
            SourceLocation::Local(PathBuf::from("art/logo.svg"))
        );
        assert!(locate("ftp://example.com/a.svg").is_err());
    }

    #[tokio::test]
    async fn test_cache_fetches_once() {
        let fetcher = Arc::new(StaticFetcher {
            calls: AtomicUsize::new(0),
        });
        let cache = SourceCache::new(fetcher.clone());

        for _ in 0..3 {
            assert_eq!(cache.get("logo.svg").await.unwrap().as_slice(), b"<svg/>");
            assert!(matches!(
                cache.get("missing.png").await,
                Err(ExportError::VectorSourceFetchFailed { .. })
            ));
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shape.svg");
        std::fs::write(&path, b"<svg/>").unwrap();

        let fetcher = HttpSourceFetcher::new(Duration::from_secs(1), "zcut-test").unwrap();
        let bytes = fetcher.fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, b"<svg/>");

        let url = url::Url::from_file_path(&path).unwrap();
        assert_eq!(fetcher.fetch(url.as_str()).await.unwrap(), b"<svg/>");
    }
}
