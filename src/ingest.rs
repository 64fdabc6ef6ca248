//! 图片上传入库

use std::sync::Arc;

use anyhow::anyhow;
use log::{info, warn};
use tokio::task::spawn_blocking;

use crate::error::{Error, Result};
use crate::metrics;
use crate::model::{DEFAULT_SOURCE, FeatureVector, ImageRecord, MimeType, NewImage};
use crate::store::ImageStore;

/// 未提供文件名时使用的默认值
pub const DEFAULT_FILENAME: &str = "uploaded-image";
/// 默认的上传大小限制：10M
pub const MAX_UPLOAD: usize = 10 * 1024 * 1024;

/// 特征提取结果
#[derive(Debug, Clone)]
pub struct Extraction {
    pub width: u32,
    pub height: u32,
    pub vector: Vec<f32>,
    /// 重新编码后的图片，作为存储的图片数据
    pub image_data: Vec<u8>,
}

/// 特征提取器
///
/// 对相同的输入必须返回相同的结果。提取可能很慢，调用方会在阻塞线程池中执行。
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> anyhow::Result<Extraction>;
}

/// 校验上传的图片，提取特征并保存
#[derive(Clone)]
pub struct Ingestor {
    store: Arc<dyn ImageStore>,
    extractor: Arc<dyn FeatureExtractor>,
    max_upload: usize,
}

impl Ingestor {
    pub fn new(store: Arc<dyn ImageStore>, extractor: Arc<dyn FeatureExtractor>) -> Self {
        Self { store, extractor, max_upload: MAX_UPLOAD }
    }

    pub fn max_upload(mut self, max_upload: usize) -> Self {
        self.max_upload = max_upload;
        self
    }

    /// 按顺序检查：图片类型、大小、是否为空
    fn check(&self, bytes: &[u8], mime_type: &str) -> Result<MimeType> {
        let mime_type = mime_type.parse::<MimeType>()?;
        if bytes.len() > self.max_upload {
            return Err(Error::PayloadTooLarge { size: bytes.len(), limit: self.max_upload });
        }
        if bytes.is_empty() {
            return Err(Error::Validation("上传的图片为空".into()));
        }
        Ok(mime_type)
    }

    pub async fn ingest(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        filename: &str,
    ) -> Result<Arc<ImageRecord>> {
        let result = self.ingest_inner(bytes, mime_type, filename).await;
        match &result {
            Ok(record) => {
                metrics::inc_ingest();
                info!("保存图片 {} ({}): {}x{}", record.id, record.filename, record.width, record.height);
            }
            Err(e) => {
                record_rejection(e);
                warn!("拒绝图片 {filename}: {e}");
            }
        }
        result
    }

    async fn ingest_inner(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        filename: &str,
    ) -> Result<Arc<ImageRecord>> {
        let mime_type = self.check(&bytes, mime_type)?;

        let filename = match filename.trim() {
            "" => DEFAULT_FILENAME.to_string(),
            name => name.to_string(),
        };

        let extractor = self.extractor.clone();
        let (bytes, extraction) = spawn_blocking(move || {
            let extraction = extractor.extract(&bytes);
            (bytes, extraction)
        })
        .await
        // 提取器 panic 同样视为提取失败
        .map_err(|e| Error::ExtractionFailed(anyhow!("特征提取任务异常结束: {e}")))?;
        let extraction = extraction.map_err(Error::ExtractionFailed)?;

        let image = NewImage {
            filename,
            mime_type,
            width: extraction.width,
            height: extraction.height,
            size: bytes.len() as u64,
            source: Some(DEFAULT_SOURCE.to_string()),
            feature_vector: FeatureVector::new(extraction.vector)?,
            image_data: extraction.image_data,
        };

        self.store.save(image).await
    }
}

/// 记录一次被拒绝的上传
pub fn record_rejection(err: &Error) {
    metrics::inc_reject(reject_reason(err));
}

fn reject_reason(err: &Error) -> &'static str {
    match err {
        Error::UnsupportedMediaType(_) => "unsupported_media_type",
        Error::PayloadTooLarge { .. } => "payload_too_large",
        Error::Validation(_) => "validation",
        Error::ExtractionFailed(_) => "extraction_failed",
        Error::DimensionMismatch { .. } => "dimension_mismatch",
        _ => "internal",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::bail;

    use super::*;
    use crate::store::MemoryStore;

    /// 按第一个字节生成二维向量
    #[derive(Default)]
    struct FakeExtractor {
        calls: AtomicUsize,
    }

    impl FeatureExtractor for FakeExtractor {
        fn extract(&self, bytes: &[u8]) -> anyhow::Result<Extraction> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match bytes[0] {
                0 => bail!("corrupted image"),
                0xff => panic!("extractor crashed"),
                _ => {}
            }
            Ok(Extraction {
                width: 3,
                height: 2,
                vector: vec![bytes[0] as f32, 1.0],
                image_data: vec![0xff, 0xd8, bytes[0]],
            })
        }
    }

    fn setup() -> (Arc<MemoryStore>, Arc<FakeExtractor>, Ingestor) {
        let store = Arc::new(MemoryStore::new());
        let extractor = Arc::new(FakeExtractor::default());
        let ingestor = Ingestor::new(store.clone(), extractor.clone()).max_upload(8);
        (store, extractor, ingestor)
    }

    #[tokio::test]
    async fn test_ingest_commits_record() {
        let (store, _, ingestor) = setup();
        let record = ingestor.ingest(vec![7, 1, 2], "image/png", "cat.png").await.unwrap();

        assert_eq!(record.id, 1);
        assert_eq!(record.filename, "cat.png");
        assert_eq!(record.mime_type, MimeType::Png);
        assert_eq!((record.width, record.height, record.size), (3, 2, 3));
        assert_eq!(record.source, DEFAULT_SOURCE);
        assert_eq!(record.image_data, vec![0xff, 0xd8, 7]);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_filename_gets_default() {
        let (_, _, ingestor) = setup();
        let record = ingestor.ingest(vec![1], "image/jpeg", " ").await.unwrap();
        assert_eq!(record.filename, DEFAULT_FILENAME);
    }

    #[tokio::test]
    async fn test_gif_is_rejected_before_extraction() {
        let (store, extractor, ingestor) = setup();
        let err = ingestor.ingest(vec![1], "image/gif", "a.gif").await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(_)));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_first_failure_wins() {
        let (_, _, ingestor) = setup();
        // 类型和大小同时不合法时报告类型错误
        let err = ingestor.ingest(vec![1; 100], "text/plain", "a").await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(_)));

        let err = ingestor.ingest(vec![1; 9], "image/png", "a").await.unwrap_err();
        assert!(matches!(err, Error::PayloadTooLarge { size: 9, limit: 8 }));

        let err = ingestor.ingest(vec![], "image/png", "a").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_extraction_failure_commits_nothing() {
        let (store, _, ingestor) = setup();
        let err = ingestor.ingest(vec![0, 1], "image/png", "bad.png").await.unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));
        assert_eq!(store.count().await.unwrap(), 0);

        // 失败不影响之后的 ID 分配
        let record = ingestor.ingest(vec![1], "image/png", "ok.png").await.unwrap();
        assert_eq!(record.id, 1);
    }

    #[tokio::test]
    async fn test_extractor_panic_is_extraction_failure() {
        let (store, _, ingestor) = setup();
        let err = ingestor.ingest(vec![0xff], "image/png", "crash.png").await.unwrap_err();
        assert!(matches!(err, Error::ExtractionFailed(_)));
        assert_eq!(reject_reason(&err), "extraction_failed");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_identical_uploads_are_independent() {
        let (store, _, ingestor) = setup();
        let a = ingestor.ingest(vec![5], "image/png", "a.png").await.unwrap();
        let b = ingestor.ingest(vec![5], "image/png", "a.png").await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(store.count().await.unwrap(), 2);
    }
}
