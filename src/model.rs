use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 未提供来源时使用的默认值
pub const DEFAULT_SOURCE: &str = "user-upload";

/// 支持的图片类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MimeType {
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/png")]
    Png,
}

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

impl FromStr for MimeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            _ => Err(Error::UnsupportedMediaType(s.to_string())),
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 图片特征向量
///
/// 构造时保证非空且所有分量都是有限值，维数由存储层统一校验。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector(Box<[f32]>);

impl FeatureVector {
    pub fn new(values: Vec<f32>) -> Result<Self> {
        if values.is_empty() {
            return Err(Error::Validation("特征向量不能为空".into()));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::Validation(format!("特征向量第 {pos} 维不是有限值")));
        }
        Ok(Self(values.into_boxed_slice()))
    }

    /// 向量维数
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl Deref for FeatureVector {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = Error;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        Self::new(values)
    }
}

/// 待保存的图片，尚未分配 ID
#[derive(Debug, Clone)]
pub struct NewImage {
    pub filename: String,
    pub mime_type: MimeType,
    pub width: u32,
    pub height: u32,
    /// 原始上传文件的字节数
    pub size: u64,
    pub source: Option<String>,
    pub feature_vector: FeatureVector,
    /// 经过重新编码后的图片数据
    pub image_data: Vec<u8>,
}

impl NewImage {
    /// 检查元数据是否完整
    pub fn validate(&self) -> Result<()> {
        if self.filename.trim().is_empty() {
            return Err(Error::Validation("文件名不能为空".into()));
        }
        if self.width == 0 || self.height == 0 {
            return Err(Error::Validation(format!(
                "图片尺寸非法: {}x{}",
                self.width, self.height
            )));
        }
        if self.size == 0 {
            return Err(Error::Validation("图片大小不能为 0".into()));
        }
        Ok(())
    }

    /// 返回实际使用的来源标记
    pub fn source_or_default(&self) -> String {
        match self.source.as_deref().map(str::trim) {
            Some(source) if !source.is_empty() => source.to_string(),
            _ => DEFAULT_SOURCE.to_string(),
        }
    }
}

/// 图片记录
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    pub id: i64,
    pub filename: String,
    pub mime_type: MimeType,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub source: String,
    pub feature_vector: FeatureVector,
    pub image_data: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
}

impl ImageRecord {
    /// 使用已分配的 ID 和时间戳完成一条记录
    pub fn from_new(image: NewImage, id: i64, uploaded_at: DateTime<Utc>) -> Self {
        let source = image.source_or_default();
        Self {
            id,
            filename: image.filename,
            mime_type: image.mime_type,
            width: image.width,
            height: image.height,
            size: image.size,
            source,
            feature_vector: image.feature_vector,
            image_data: image.image_data,
            uploaded_at,
        }
    }
}

/// 搜索历史记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryEntry {
    pub id: i64,
    pub source_image_id: i64,
    pub result_count: u32,
    pub searched_at: DateTime<Utc>,
}

/// 搜索历史与其引用的图片
#[derive(Debug, Clone)]
pub struct HistoryItem {
    pub entry: SearchHistoryEntry,
    pub source_image: ImageRecord,
}

/// 相似图片搜索结果
#[derive(Debug, Clone)]
pub struct SimilarityResult {
    pub id: i64,
    pub filename: String,
    pub mime_type: MimeType,
    pub width: u32,
    pub height: u32,
    pub size: u64,
    pub source: String,
    /// 保留两位小数的余弦相似度
    pub similarity_score: f64,
    pub image_data: Vec<u8>,
}

impl SimilarityResult {
    pub fn new(image: &ImageRecord, similarity_score: f64) -> Self {
        Self {
            id: image.id,
            filename: image.filename.clone(),
            mime_type: image.mime_type,
            width: image.width,
            height: image.height,
            size: image.size,
            source: image.source.clone(),
            similarity_score,
            image_data: image.image_data.clone(),
        }
    }
}

/// 时间戳以微秒整数保存，保证排序稳定
pub(crate) fn to_micros(time: DateTime<Utc>) -> i64 {
    time.timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| Error::Integrity(format!("时间戳越界: {micros}")))
}
