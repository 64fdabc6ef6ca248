use std::sync::Arc;

use log::info;

use crate::config::ConfDir;
use crate::error::{Error, Result};
use crate::extractor::ImageExtractor;
use crate::ingest::{FeatureExtractor, Ingestor, MAX_UPLOAD};
use crate::model::{HistoryItem, ImageRecord, SimilarityResult};
use crate::ranking::{MAX_LIMIT, Ranker};
use crate::store::{Backend, HistoryLedger, ImageStore, MemoryStore, SqliteStore};

/// 图片库
///
/// 组合存储、特征提取和搜索，HTTP 服务和命令行都只通过它访问数据。
#[derive(Clone)]
pub struct Gallery {
    images: Arc<dyn ImageStore>,
    history: Arc<dyn HistoryLedger>,
    ranker: Ranker,
    ingestor: Ingestor,
}

pub struct GalleryBuilder {
    conf_dir: ConfDir,
    backend: Backend,
    wal: bool,
    max_limit: usize,
    max_upload: usize,
    extractor: Option<Arc<dyn FeatureExtractor>>,
}

impl GalleryBuilder {
    pub fn new(conf_dir: ConfDir) -> Self {
        Self {
            conf_dir,
            backend: Backend::Sqlite,
            wal: true,
            max_limit: MAX_LIMIT,
            max_upload: MAX_UPLOAD,
            extractor: None,
        }
    }

    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// 是否使用 SQLite 的 WAL 模式
    pub fn wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    pub fn max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = max_limit;
        self
    }

    pub fn max_upload(mut self, max_upload: usize) -> Self {
        self.max_upload = max_upload;
        self
    }

    /// 替换默认的特征提取器
    pub fn extractor(mut self, extractor: Arc<dyn FeatureExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub async fn open(self) -> Result<Gallery> {
        let (images, history) = match self.backend {
            Backend::Memory => {
                info!("使用内存存储");
                let store = Arc::new(MemoryStore::new());
                (store.clone() as Arc<dyn ImageStore>, store as Arc<dyn HistoryLedger>)
            }
            Backend::Sqlite => {
                tokio::fs::create_dir_all(self.conf_dir.path()).await?;
                let store = Arc::new(SqliteStore::open(self.conf_dir.database(), self.wal).await?);
                (store.clone() as Arc<dyn ImageStore>, store as Arc<dyn HistoryLedger>)
            }
        };

        let extractor: Arc<dyn FeatureExtractor> = match self.extractor {
            Some(extractor) => extractor,
            None => Arc::new(ImageExtractor::default()),
        };

        Ok(Gallery {
            ranker: Ranker::new(images.clone(), history.clone()).max_limit(self.max_limit),
            ingestor: Ingestor::new(images.clone(), extractor).max_upload(self.max_upload),
            images,
            history,
        })
    }
}

impl Gallery {
    /// 校验并保存上传的图片
    pub async fn ingest(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        filename: &str,
    ) -> Result<Arc<ImageRecord>> {
        self.ingestor.ingest(bytes, mime_type, filename).await
    }

    pub async fn get(&self, id: i64) -> Result<Arc<ImageRecord>> {
        self.images.get(id).await?.ok_or(Error::NotFound(id))
    }

    /// 搜索相似图片，成功后记录一条搜索历史
    pub async fn find_similar(&self, id: i64, limit: Option<usize>) -> Result<Vec<SimilarityResult>> {
        self.ranker.find_similar(id, limit).await
    }

    pub async fn list_history(&self) -> Result<Vec<HistoryItem>> {
        self.history.list_all().await
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.history.clear().await
    }

    pub async fn count(&self) -> Result<u64> {
        self.images.count().await
    }
}
