use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::model::{HistoryItem, ImageRecord, SimilarityResult};
use crate::utils::data_url;

/// 上传表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct UploadForm {
    /// 上传的图片文件，仅支持 JPEG 和 PNG
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub image: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub image_id: i64,
}

/// 图片信息
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageView {
    pub id: i64,
    pub filename: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    /// 原始上传文件的字节数
    pub size: u64,
    pub source: String,
    #[schema(value_type = String, format = DateTime)]
    pub uploaded_at: DateTime<Utc>,
    /// 存储图片的 data URL
    pub image_data: String,
}

impl From<&ImageRecord> for ImageView {
    fn from(image: &ImageRecord) -> Self {
        Self {
            id: image.id,
            filename: image.filename.clone(),
            mime_type: image.mime_type.to_string(),
            width: image.width,
            height: image.height,
            size: image.size,
            source: image.source.clone(),
            uploaded_at: image.uploaded_at,
            image_data: data_url(&image.image_data),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SimilarQuery {
    /// 返回的结果数量
    pub limit: Option<usize>,
}

/// 相似图片
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SimilarImage {
    pub id: i64,
    pub filename: String,
    pub mime_type: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub source: String,
    /// 余弦相似度，保留两位小数
    pub similarity_score: f64,
    pub image_data: String,
}

impl From<SimilarityResult> for SimilarImage {
    fn from(result: SimilarityResult) -> Self {
        Self {
            id: result.id,
            filename: result.filename,
            mime_type: result.mime_type.to_string(),
            width: result.width,
            height: result.height,
            size: result.size,
            source: result.source,
            similarity_score: result.similarity_score,
            image_data: data_url(&result.image_data),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SimilarResponse {
    /// 被搜索的图片 ID
    pub source_image: i64,
    pub results: Vec<SimilarImage>,
}

/// 搜索历史
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub id: i64,
    pub source_image_id: i64,
    pub result_count: u32,
    #[schema(value_type = String, format = DateTime)]
    pub searched_at: DateTime<Utc>,
    pub source_image: ImageView,
}

impl From<HistoryItem> for HistoryView {
    fn from(item: HistoryItem) -> Self {
        Self {
            id: item.entry.id,
            source_image_id: item.entry.source_image_id,
            result_count: item.entry.result_count,
            searched_at: item.entry.searched_at,
            source_image: ImageView::from(&item.source_image),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}
