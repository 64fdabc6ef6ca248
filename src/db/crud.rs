use futures::stream::BoxStream;
use sqlx::{Executor, Result, Sqlite, SqlitePool};

use super::{HistoryRow, ImageRow, InsertedImage};

/// 图片记录的写入参数
pub struct ImageInsert<'a> {
    pub filename: &'a str,
    pub mime_type: &'a str,
    pub width: i64,
    pub height: i64,
    pub size: i64,
    pub source: &'a str,
    pub dimension: i64,
    pub feature_vector: &'a [u8],
    pub image_data: &'a [u8],
    pub uploaded_at: i64,
}

/// 添加图片记录
///
/// 维数与已有记录不一致时不插入，返回 `None`。
/// 上传时间不早于最后一条记录。
pub async fn add_image<'c, E>(executor: E, image: &ImageInsert<'_>) -> Result<Option<InsertedImage>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as::<_, InsertedImage>(
        r#"
        INSERT INTO image (
            filename, mime_type, width, height, size, source,
            dimension, feature_vector, image_data, uploaded_at
        )
        SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
            MAX(?10, COALESCE((SELECT uploaded_at FROM image ORDER BY id DESC LIMIT 1), 0))
        WHERE COALESCE((SELECT dimension FROM image ORDER BY id ASC LIMIT 1), ?7) = ?7
        RETURNING id, uploaded_at
        "#,
    )
    .bind(image.filename)
    .bind(image.mime_type)
    .bind(image.width)
    .bind(image.height)
    .bind(image.size)
    .bind(image.source)
    .bind(image.dimension)
    .bind(image.feature_vector)
    .bind(image.image_data)
    .bind(image.uploaded_at)
    .fetch_optional(executor)
    .await
}

/// 查询数据库使用的特征向量维数
pub async fn get_dimension(executor: &SqlitePool) -> Result<Option<i64>> {
    sqlx::query_scalar("SELECT dimension FROM image ORDER BY id ASC LIMIT 1")
        .fetch_optional(executor)
        .await
}

pub async fn get_image<'c, E>(executor: E, id: i64) -> Result<Option<ImageRow>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as::<_, ImageRow>(
        r#"
        SELECT id, filename, mime_type, width, height, size, source, feature_vector, image_data, uploaded_at
        FROM image WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
}

/// 按 ID 顺序遍历所有图片
///
/// 单条 SELECT 语句在 SQLite 中读取的是同一份快照
pub fn stream_images(executor: &SqlitePool) -> BoxStream<'_, Result<ImageRow>> {
    sqlx::query_as::<_, ImageRow>(
        r#"
        SELECT id, filename, mime_type, width, height, size, source, feature_vector, image_data, uploaded_at
        FROM image ORDER BY id ASC
        "#,
    )
    .fetch(executor)
}

/// 查询图片数量
pub async fn count_images(executor: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM image").fetch_one(executor).await
}

/// 添加搜索历史
///
/// 引用的图片不存在时不插入，返回 `None`
pub async fn add_history<'c, E>(
    executor: E,
    source_image_id: i64,
    result_count: i64,
    searched_at: i64,
) -> Result<Option<HistoryRow>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as::<_, HistoryRow>(
        r#"
        INSERT INTO search_history (source_image_id, result_count, searched_at)
        SELECT ?1, ?2,
            MAX(?3, COALESCE((SELECT searched_at FROM search_history ORDER BY id DESC LIMIT 1), 0))
        WHERE EXISTS (SELECT 1 FROM image WHERE id = ?1)
        RETURNING id, source_image_id, result_count, searched_at
        "#,
    )
    .bind(source_image_id)
    .bind(result_count)
    .bind(searched_at)
    .fetch_optional(executor)
    .await
}

/// 按搜索时间倒序获取所有历史，时间相同时后插入的在前
pub async fn list_history<'c, E>(executor: E) -> Result<Vec<HistoryRow>>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query_as::<_, HistoryRow>(
        r#"
        SELECT id, source_image_id, result_count, searched_at
        FROM search_history
        ORDER BY searched_at DESC, id DESC
        "#,
    )
    .fetch_all(executor)
    .await
}

/// 删除所有搜索历史
pub async fn clear_history(executor: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM search_history").execute(executor).await?;
    Ok(())
}
