use sqlx::FromRow;

use crate::error::Error;
use crate::model::{FeatureVector, ImageRecord, SearchHistoryEntry, from_micros};

/// 图片记录
#[derive(FromRow)]
pub struct ImageRow {
    pub id: i64,
    pub filename: String,
    pub mime_type: String,
    pub width: i64,
    pub height: i64,
    pub size: i64,
    pub source: String,
    /// f32 数组的原始字节，长度为 4 * dimension
    pub feature_vector: Vec<u8>,
    pub image_data: Vec<u8>,
    pub uploaded_at: i64,
}

/// 插入图片后返回的字段
#[derive(FromRow)]
pub struct InsertedImage {
    pub id: i64,
    pub uploaded_at: i64,
}

/// 搜索历史记录
#[derive(FromRow)]
pub struct HistoryRow {
    pub id: i64,
    pub source_image_id: i64,
    pub result_count: i64,
    pub searched_at: i64,
}

fn integrity(id: i64, what: &str) -> Error {
    Error::Integrity(format!("图片 {id} 的 {what} 字段已损坏"))
}

impl TryFrom<ImageRow> for ImageRecord {
    type Error = Error;

    fn try_from(row: ImageRow) -> Result<Self, Error> {
        let id = row.id;
        if row.feature_vector.len() % size_of::<f32>() != 0 {
            return Err(integrity(id, "feature_vector"));
        }
        // NOTE: BLOB 不保证按 f32 对齐，不能直接 cast_slice
        let values: Vec<f32> = bytemuck::pod_collect_to_vec(&row.feature_vector);
        let feature_vector =
            FeatureVector::new(values).map_err(|_| integrity(id, "feature_vector"))?;

        Ok(Self {
            id,
            filename: row.filename,
            mime_type: row.mime_type.parse().map_err(|_| integrity(id, "mime_type"))?,
            width: row.width.try_into().map_err(|_| integrity(id, "width"))?,
            height: row.height.try_into().map_err(|_| integrity(id, "height"))?,
            size: row.size.try_into().map_err(|_| integrity(id, "size"))?,
            source: row.source,
            feature_vector,
            image_data: row.image_data,
            uploaded_at: from_micros(row.uploaded_at)?,
        })
    }
}

impl TryFrom<HistoryRow> for SearchHistoryEntry {
    type Error = Error;

    fn try_from(row: HistoryRow) -> Result<Self, Error> {
        Ok(Self {
            id: row.id,
            source_image_id: row.source_image_id,
            result_count: row.result_count.try_into().map_err(|_| {
                Error::Integrity(format!("搜索历史 {} 的 result_count 字段已损坏", row.id))
            })?,
            searched_at: from_micros(row.searched_at)?,
        })
    }
}
