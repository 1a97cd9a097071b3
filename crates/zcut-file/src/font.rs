//! 字体资源缓存
//!
//! 按字体族名缓存字体数据，进程内共享。每个族名只在首次解析时写入一次，
//! 会话内不失效；加载失败同样缓存，不会重复请求。
//! 同一设计中的所有字体族并发加载，全部完成后再开始转换元素。

use crate::config::{ExportConfig, FontSource};
use crate::error::{ExportError, ExportResult};
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

/// 已验证的字体资源
#[derive(Debug)]
pub struct FontResource {
    family: String,
    data: Vec<u8>,
    units_per_em: u16,
}

impl FontResource {
    /// 解析并验证字体数据
    pub fn from_bytes(family: impl Into<String>, data: Vec<u8>) -> ExportResult<Self> {
        let family = family.into();
        let units_per_em = ttf_parser::Face::parse(&data, 0)
            .map_err(|e| ExportError::FontNotLoaded(format!("{}: {}", family, e)))?
            .units_per_em();
        Ok(Self {
            family,
            data,
            units_per_em,
        })
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// 字体数据在加载时已验证，这里重新解析只借用字节
    pub fn face(&self) -> ExportResult<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, 0)
            .map_err(|e| ExportError::FontNotLoaded(format!("{}: {}", self.family, e)))
    }
}

/// 字体数据来源
#[async_trait]
pub trait FontLoader: Send + Sync {
    async fn load(&self, family: &str) -> ExportResult<Vec<u8>>;
}

/// 从远程字体服务加载：`{base_url}/{family}.{ext}`
pub struct HttpFontLoader {
    client: reqwest::Client,
    base_url: url::Url,
    extension: String,
}

impl HttpFontLoader {
    pub fn new(
        base_url: &str,
        extension: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> ExportResult<Self> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = url::Url::parse(&base).map_err(|e| {
            ExportError::Config(format!("invalid font base_url {}: {}", base_url, e))
        })?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ExportError::Config(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            extension: extension.to_string(),
        })
    }

    fn url_for(&self, family: &str) -> ExportResult<url::Url> {
        self.base_url
            .join(&format!("{}.{}", family, self.extension))
            .map_err(|e| ExportError::FontNotLoaded(format!("{}: {}", family, e)))
    }
}

#[async_trait]
impl FontLoader for HttpFontLoader {
    async fn load(&self, family: &str) -> ExportResult<Vec<u8>> {
        let url = self.url_for(family)?;
        tracing::debug!("请求字体 {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ExportError::FontNotLoaded(format!("{}: {}", family, e)))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExportError::FontNotLoaded(format!("{}: {}", family, e)))?;
        Ok(bytes.to_vec())
    }
}

/// 从本地目录加载：`{dir}/{family}.{ext}`
pub struct DirectoryFontLoader {
    dir: PathBuf,
    extension: String,
}

impl DirectoryFontLoader {
    pub fn new(dir: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.to_string(),
        }
    }
}

#[async_trait]
impl FontLoader for DirectoryFontLoader {
    async fn load(&self, family: &str) -> ExportResult<Vec<u8>> {
        let path = self.dir.join(format!("{}.{}", family, self.extension));
        tokio::fs::read(&path).await.map_err(|e| {
            ExportError::FontNotLoaded(format!("{} ({}): {}", family, path.display(), e))
        })
    }
}

/// 按配置构建字体加载器
pub fn loader_from_config(config: &ExportConfig) -> ExportResult<Arc<dyn FontLoader>> {
    let loader: Arc<dyn FontLoader> = match &config.font_source {
        FontSource::Http { base_url } => Arc::new(HttpFontLoader::new(
            base_url,
            &config.font_extension,
            Duration::from_secs(config.http_timeout_secs),
            &config.user_agent,
        )?),
        FontSource::Directory { path } => {
            Arc::new(DirectoryFontLoader::new(path.clone(), &config.font_extension))
        }
    };
    Ok(loader)
}

type FontSlot = Arc<OnceCell<Option<Arc<FontResource>>>>;

/// 字体资源缓存
pub struct FontCache {
    loader: Arc<dyn FontLoader>,
    slots: Mutex<HashMap<String, FontSlot>>,
}

impl FontCache {
    pub fn new(loader: Arc<dyn FontLoader>) -> Self {
        Self {
            loader,
            slots: Mutex::new(HashMap::new()),
        }
    }

    async fn slot(&self, family: &str) -> FontSlot {
        let mut slots = self.slots.lock().await;
        slots.entry(family.to_string()).or_default().clone()
    }

    /// 获取字体；首次调用时加载，之后直接返回缓存结果（包括失败）
    pub async fn get_or_load(&self, family: &str) -> Option<Arc<FontResource>> {
        let slot = self.slot(family).await;
        if let Some(cached) = slot.get() {
            tracing::debug!("字体缓存命中: {}", family);
            return cached.clone();
        }
        slot.get_or_init(|| async {
            match self.fetch(family).await {
                Ok(font) => {
                    tracing::info!("已加载字体 {}", family);
                    Some(Arc::new(font))
                }
                Err(e) => {
                    tracing::warn!("字体加载失败: {}", e);
                    None
                }
            }
        })
        .await
        .clone()
    }

    async fn fetch(&self, family: &str) -> ExportResult<FontResource> {
        let data = self.loader.load(family).await?;
        FontResource::from_bytes(family, data)
    }

    /// 并发加载一组字体族，全部完成后返回
    ///
    /// 某个族失败不影响其他族；失败的族不出现在结果中。
    pub async fn preload<I, S>(&self, families: I) -> LoadedFonts
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut unique: Vec<String> = Vec::new();
        for family in families {
            let family = family.as_ref();
            if !unique.iter().any(|f| f == family) {
                unique.push(family.to_string());
            }
        }

        let results = join_all(unique.iter().map(|family| async move {
            (family.clone(), self.get_or_load(family).await)
        }))
        .await;

        LoadedFonts {
            fonts: results
                .into_iter()
                .filter_map(|(family, font)| font.map(|f| (family, f)))
                .collect(),
        }
    }
}

/// 一次导出所用的已解析字体
#[derive(Debug, Clone, Default)]
pub struct LoadedFonts {
    fonts: HashMap<String, Arc<FontResource>>,
}

impl LoadedFonts {
    pub fn insert(&mut self, font: Arc<FontResource>) {
        self.fonts.insert(font.family().to_string(), font);
    }

    pub fn get(&self, family: &str) -> Option<&Arc<FontResource>> {
        self.fonts.get(family)
    }

    pub fn require(&self, family: &str) -> ExportResult<&Arc<FontResource>> {
        self.get(family)
            .ok_or_else(|| ExportError::FontNotLoaded(family.to_string()))
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}
