use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryFutureExt, stream};
use tokio::sync::RwLock;

use super::{HistoryLedger, ImageStore, ImageStream};
use crate::error::{Error, Result};
use crate::model::{HistoryItem, ImageRecord, NewImage, SearchHistoryEntry};

#[derive(Default)]
struct ImageTable {
    records: BTreeMap<i64, Arc<ImageRecord>>,
    /// 第一张图片确定的特征向量维数
    dimension: Option<usize>,
    last_id: i64,
    last_uploaded_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct HistoryTable {
    entries: Vec<SearchHistoryEntry>,
    /// 清空历史后不会重置
    last_id: i64,
    last_searched_at: Option<DateTime<Utc>>,
}

/// 内存存储
///
/// NOTE: 需要同时持有两把锁时，总是先锁 images 再锁 history
#[derive(Default)]
pub struct MemoryStore {
    images: RwLock<ImageTable>,
    history: RwLock<HistoryTable>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 返回不早于上一次的当前时间
fn monotonic_now(last: &mut Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = match *last {
        Some(last) => Utc::now().max(last),
        None => Utc::now(),
    };
    *last = Some(now);
    now
}

#[async_trait]
impl ImageStore for MemoryStore {
    async fn save(&self, image: NewImage) -> Result<Arc<ImageRecord>> {
        image.validate()?;

        let mut images = self.images.write().await;
        let dim = image.feature_vector.dim();
        match images.dimension {
            Some(expected) if expected != dim => {
                return Err(Error::DimensionMismatch { expected, actual: dim });
            }
            Some(_) => {}
            None => images.dimension = Some(dim),
        }

        images.last_id += 1;
        let id = images.last_id;
        let uploaded_at = monotonic_now(&mut images.last_uploaded_at);
        let record = Arc::new(ImageRecord::from_new(image, id, uploaded_at));
        images.records.insert(id, record.clone());

        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<Option<Arc<ImageRecord>>> {
        Ok(self.images.read().await.records.get(&id).cloned())
    }

    fn get_all(&self) -> ImageStream<'_> {
        async move {
            // 只复制引用，特征向量本身不会被复制
            let snapshot = self.images.read().await.records.values().cloned().collect::<Vec<_>>();
            Ok::<_, Error>(stream::iter(snapshot.into_iter().map(Ok::<_, Error>)))
        }
        .try_flatten_stream()
        .boxed()
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.images.read().await.records.len() as u64)
    }
}

#[async_trait]
impl HistoryLedger for MemoryStore {
    async fn append(&self, source_image_id: i64, result_count: u32) -> Result<SearchHistoryEntry> {
        let images = self.images.read().await;
        if !images.records.contains_key(&source_image_id) {
            return Err(Error::DanglingReference(source_image_id));
        }

        let mut history = self.history.write().await;
        history.last_id += 1;
        let entry = SearchHistoryEntry {
            id: history.last_id,
            source_image_id,
            result_count,
            searched_at: monotonic_now(&mut history.last_searched_at),
        };
        history.entries.push(entry.clone());

        Ok(entry)
    }

    async fn list_all(&self) -> Result<Vec<HistoryItem>> {
        let images = self.images.read().await;
        let history = self.history.read().await;

        let mut entries = history.entries.clone();
        entries.sort_by(|a, b| b.searched_at.cmp(&a.searched_at).then(b.id.cmp(&a.id)));

        entries
            .into_iter()
            .map(|entry| match images.records.get(&entry.source_image_id) {
                Some(image) => Ok(HistoryItem { source_image: (**image).clone(), entry }),
                None => Err(Error::Integrity(format!(
                    "搜索历史 {} 引用的图片 {} 不存在",
                    entry.id, entry.source_image_id
                ))),
            })
            .collect()
    }

    async fn clear(&self) -> Result<()> {
        self.history.write().await.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;

    use super::*;
    use crate::model::{FeatureVector, MimeType};

    fn new_image(vector: Vec<f32>) -> NewImage {
        NewImage {
            filename: "a.jpg".into(),
            mime_type: MimeType::Jpeg,
            width: 4,
            height: 4,
            size: 100,
            source: None,
            feature_vector: FeatureVector::new(vector).unwrap(),
            image_data: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_save_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let a = store.save(new_image(vec![1.0, 0.0])).await.unwrap();
        let b = store.save(new_image(vec![0.0, 1.0])).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));
        assert!(a.uploaded_at <= b.uploaded_at);
        assert_eq!(a.source, "user-upload");
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_save_rejects_other_dimension() {
        let store = MemoryStore::new();
        store.save(new_image(vec![1.0, 0.0])).await.unwrap();
        let err = store.save(new_image(vec![1.0, 0.0, 0.0])).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_all_in_insertion_order() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.save(new_image(vec![i as f32, 1.0])).await.unwrap();
        }
        let ids = store.get_all().map_ok(|r| r.id).try_collect::<Vec<_>>().await.unwrap();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_history_ids_not_reused_after_clear() {
        let store = MemoryStore::new();
        let image = store.save(new_image(vec![1.0])).await.unwrap();
        let first = store.append(image.id, 0).await.unwrap();
        store.clear().await.unwrap();
        let second = store.append(image.id, 0).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_concurrent_saves_get_unique_ids() {
        let store = Arc::new(MemoryStore::new());
        let handles = (0..32)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.save(new_image(vec![1.0, 2.0])).await })
            })
            .collect::<Vec<_>>();

        let mut ids = vec![];
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=32).collect::<Vec<_>>());
    }
}
