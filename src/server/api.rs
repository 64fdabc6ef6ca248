use std::sync::Arc;

use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use log::{info, warn};

use super::error::Result;
use super::state::AppState;
use super::types::*;
use crate::error::Error;
use crate::ingest::{DEFAULT_FILENAME, record_rejection};
use crate::model::MimeType;
use crate::utils::STORED_MIME_TYPE;

/// multipart 编码额外占用的空间
const MULTIPART_OVERHEAD: usize = 64 * 1024;

fn image_id(path: std::result::Result<Path<i64>, PathRejection>) -> Result<i64> {
    match path {
        Ok(Path(id)) => Ok(id),
        Err(e) => Err(Error::Validation(format!("无效的图片 ID: {e}")).into()),
    }
}

/// 上传的图片字段
struct UploadedImage {
    filename: String,
    mime_type: String,
    contents: Vec<u8>,
}

fn malformed(e: MultipartError) -> Error {
    Error::Validation(format!("无效的上传请求: {}", e.body_text()))
}

/// 读取 `image` 字段
///
/// 字段头中的图片类型先于内容检查，内容边读边检查大小，超出限制立即停止读取。
/// 其它字段的内容计入请求总大小后丢弃。
async fn read_image(
    multipart: &mut Multipart,
    max_upload: usize,
) -> crate::error::Result<UploadedImage> {
    let max_body = max_upload.saturating_add(MULTIPART_OVERHEAD);
    let mut total = 0usize;
    let mut image = None;

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some("image") || image.is_some() {
            while let Some(chunk) = field.chunk().await.map_err(malformed)? {
                total = total.saturating_add(chunk.len());
                if total > max_body {
                    return Err(Error::PayloadTooLarge { size: total, limit: max_upload });
                }
            }
            continue;
        }

        let filename = field.file_name().unwrap_or(DEFAULT_FILENAME).to_string();
        let mime_type = field.content_type().unwrap_or_default().to_string();
        mime_type.parse::<MimeType>()?;

        let mut contents = Vec::new();
        while let Some(chunk) = field.chunk().await.map_err(malformed)? {
            contents.extend_from_slice(&chunk);
            if contents.len() > max_upload {
                return Err(Error::PayloadTooLarge { size: contents.len(), limit: max_upload });
            }
        }
        total = total.saturating_add(contents.len());
        image = Some(UploadedImage { filename, mime_type, contents });
    }

    image.ok_or_else(|| Error::Validation("未上传图片".into()))
}

/// 上传一张图片
#[utoipa::path(
    post,
    path = "/api/images/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, body = UploadResponse),
        (status = 400, body = ErrorResponse),
        (status = 413, body = ErrorResponse),
        (status = 415, body = ErrorResponse),
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut multipart = multipart.map_err(|e| Error::Validation(format!("无效的上传请求: {e}")))?;
    let image = read_image(&mut multipart, state.max_upload).await.inspect_err(|e| {
        record_rejection(e);
        warn!("拒绝上传: {e}");
    })?;

    info!("收到上传图片: {} ({}, {} 字节)", image.filename, image.mime_type, image.contents.len());
    let record = state.gallery.ingest(image.contents, &image.mime_type, &image.filename).await?;

    Ok((StatusCode::CREATED, Json(UploadResponse { success: true, image_id: record.id })))
}

/// 获取图片信息
#[utoipa::path(
    get,
    path = "/api/images/{id}",
    params(("id" = i64, Path, description = "图片 ID")),
    responses(
        (status = 200, body = ImageView),
        (status = 404, body = ErrorResponse),
    )
)]
pub async fn image_handler(
    State(state): State<Arc<AppState>>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<Json<ImageView>> {
    let image = state.gallery.get(image_id(path)?).await?;
    Ok(Json(ImageView::from(&*image)))
}

/// 获取存储的图片数据
#[utoipa::path(
    get,
    path = "/api/images/{id}/data",
    params(("id" = i64, Path, description = "图片 ID")),
    responses(
        (status = 200, content_type = "image/jpeg", body = Vec<u8>),
        (status = 404, body = ErrorResponse),
    )
)]
pub async fn image_data_handler(
    State(state): State<Arc<AppState>>,
    path: std::result::Result<Path<i64>, PathRejection>,
) -> Result<impl IntoResponse> {
    let image = state.gallery.get(image_id(path)?).await?;
    Ok(([(header::CONTENT_TYPE, STORED_MIME_TYPE)], image.image_data.clone()))
}

/// 搜索相似图片
#[utoipa::path(
    get,
    path = "/api/images/{id}/similar",
    params(("id" = i64, Path, description = "图片 ID"), SimilarQuery),
    responses(
        (status = 200, body = SimilarResponse),
        (status = 404, body = ErrorResponse),
    )
)]
pub async fn similar_handler(
    State(state): State<Arc<AppState>>,
    path: std::result::Result<Path<i64>, PathRejection>,
    query: std::result::Result<Query<SimilarQuery>, QueryRejection>,
) -> Result<Json<SimilarResponse>> {
    let id = image_id(path)?;
    let Query(query) = query.map_err(|e| Error::Validation(format!("无效的查询参数: {e}")))?;

    let results = state.gallery.find_similar(id, Some(query.limit.unwrap_or(state.limit))).await?;

    Ok(Json(SimilarResponse {
        source_image: id,
        results: results.into_iter().map(SimilarImage::from).collect(),
    }))
}

/// 获取搜索历史
#[utoipa::path(
    get,
    path = "/api/history",
    responses(
        (status = 200, body = Vec<HistoryView>),
    )
)]
pub async fn history_handler(State(state): State<Arc<AppState>>) -> Result<Json<Vec<HistoryView>>> {
    let history = state.gallery.list_history().await?;
    Ok(Json(history.into_iter().map(HistoryView::from).collect()))
}

/// 清空搜索历史
#[utoipa::path(
    delete,
    path = "/api/history",
    responses(
        (status = 200, body = SuccessResponse),
    )
)]
pub async fn clear_history_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SuccessResponse>> {
    state.gallery.clear_history().await?;
    info!("搜索历史已清空");
    Ok(Json(SuccessResponse { success: true }))
}
