use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};

use super::{HistoryLedger, ImageStore, ImageStream};
use crate::db::{self, Database, crud};
use crate::error::{Error, Result};
use crate::model::{HistoryItem, ImageRecord, NewImage, SearchHistoryEntry, from_micros, to_micros};

/// SQLite 存储
#[derive(Clone)]
pub struct SqliteStore {
    pool: Database,
}

impl SqliteStore {
    /// 打开数据库，不存在时自动创建并执行迁移
    pub async fn open(filename: impl AsRef<Path>, wal: bool) -> Result<Self> {
        Ok(Self { pool: db::init_db(filename, wal).await? })
    }
}

fn to_i64<T: TryInto<i64>>(value: T, field: &str) -> Result<i64> {
    value.try_into().map_err(|_| Error::Validation(format!("{field} 超出范围")))
}

#[async_trait]
impl ImageStore for SqliteStore {
    async fn save(&self, image: NewImage) -> Result<Arc<ImageRecord>> {
        image.validate()?;

        let source = image.source_or_default();
        let dimension = image.feature_vector.dim();
        let insert = crud::ImageInsert {
            filename: &image.filename,
            mime_type: image.mime_type.as_str(),
            width: image.width.into(),
            height: image.height.into(),
            size: to_i64(image.size, "size")?,
            source: &source,
            dimension: to_i64(dimension, "dimension")?,
            feature_vector: bytemuck::cast_slice(image.feature_vector.as_slice()),
            image_data: &image.image_data,
            uploaded_at: to_micros(Utc::now()),
        };

        let Some(inserted) = crud::add_image(&self.pool, &insert).await? else {
            let expected = crud::get_dimension(&self.pool).await?.unwrap_or_default();
            return Err(Error::DimensionMismatch { expected: expected as usize, actual: dimension });
        };

        let uploaded_at = from_micros(inserted.uploaded_at)?;
        Ok(Arc::new(ImageRecord::from_new(image, inserted.id, uploaded_at)))
    }

    async fn get(&self, id: i64) -> Result<Option<Arc<ImageRecord>>> {
        match crud::get_image(&self.pool, id).await? {
            Some(row) => Ok(Some(Arc::new(row.try_into()?))),
            None => Ok(None),
        }
    }

    fn get_all(&self) -> ImageStream<'_> {
        crud::stream_images(&self.pool)
            .map_err(Error::from)
            .and_then(|row| async move { ImageRecord::try_from(row).map(Arc::new) })
            .boxed()
    }

    async fn count(&self) -> Result<u64> {
        Ok(crud::count_images(&self.pool).await? as u64)
    }
}

#[async_trait]
impl HistoryLedger for SqliteStore {
    async fn append(&self, source_image_id: i64, result_count: u32) -> Result<SearchHistoryEntry> {
        let searched_at = to_micros(Utc::now());
        match crud::add_history(&self.pool, source_image_id, result_count.into(), searched_at).await? {
            Some(row) => row.try_into(),
            None => Err(Error::DanglingReference(source_image_id)),
        }
    }

    async fn list_all(&self) -> Result<Vec<HistoryItem>> {
        // 在同一个读事务中查询历史和图片，保证两者一致
        let mut tx = self.pool.begin().await?;
        let rows = crud::list_history(&mut *tx).await?;

        let mut images: HashMap<i64, ImageRecord> = HashMap::new();
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let entry = SearchHistoryEntry::try_from(row)?;
            let source_image = match images.get(&entry.source_image_id) {
                Some(image) => image.clone(),
                None => {
                    let Some(row) = crud::get_image(&mut *tx, entry.source_image_id).await? else {
                        return Err(Error::Integrity(format!(
                            "搜索历史 {} 引用的图片 {} 不存在",
                            entry.id, entry.source_image_id
                        )));
                    };
                    let image = ImageRecord::try_from(row)?;
                    images.insert(image.id, image.clone());
                    image
                }
            };
            items.push(HistoryItem { entry, source_image });
        }
        tx.commit().await?;

        Ok(items)
    }

    async fn clear(&self) -> Result<()> {
        crud::clear_history(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::model::{FeatureVector, MimeType};

    fn new_image(vector: Vec<f32>) -> NewImage {
        NewImage {
            filename: "b.png".into(),
            mime_type: MimeType::Png,
            width: 8,
            height: 6,
            size: 512,
            source: Some("crawler".into()),
            feature_vector: FeatureVector::new(vector).unwrap(),
            image_data: vec![9, 8, 7],
        }
    }

    #[tokio::test]
    async fn test_save_and_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("imsim.db"), true).await.unwrap();

        let saved = store.save(new_image(vec![0.5, -1.25, 3.0])).await.unwrap();
        let loaded = store.get(saved.id).await.unwrap().unwrap();
        assert_eq!(*saved, *loaded);
        assert_eq!(loaded.source, "crawler");
        assert!(store.get(saved.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_keeps_dimension_and_sequence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("imsim.db");

        let first = {
            let store = SqliteStore::open(&path, true).await.unwrap();
            store.save(new_image(vec![1.0, 2.0])).await.unwrap()
        };

        let store = SqliteStore::open(&path, true).await.unwrap();
        let err = store.save(new_image(vec![1.0])).await.unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 1 }));

        let second = store.save(new_image(vec![3.0, 4.0])).await.unwrap();
        assert_eq!(second.id, first.id + 1);
        assert!(second.uploaded_at >= first.uploaded_at);
    }

    #[tokio::test]
    async fn test_list_all_detects_missing_image() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path().join("imsim.db"), true).await.unwrap();
        let image = store.save(new_image(vec![1.0, 0.0])).await.unwrap();
        store.append(image.id, 0).await.unwrap();

        // 模拟外部程序破坏数据
        let mut conn = store.pool.acquire().await.unwrap();
        sqlx::query("PRAGMA foreign_keys = OFF").execute(&mut *conn).await.unwrap();
        sqlx::query("DELETE FROM image").execute(&mut *conn).await.unwrap();
        drop(conn);

        let err = store.list_all().await.unwrap_err();
        assert!(matches!(err, Error::Integrity(_)));
    }
}
