//! 图片与搜索历史的存储抽象
//!
//! [`ImageStore`] 保存图片记录及其特征向量，[`HistoryLedger`] 保存只追加的搜索历史。
//! 两者各有内存与 SQLite 两种实现，对外行为一致。

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use clap::ValueEnum;
use futures::stream::BoxStream;

pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;
use crate::error::Result;
use crate::model::{HistoryItem, ImageRecord, NewImage, SearchHistoryEntry};

/// 按插入顺序输出的图片记录流
pub type ImageStream<'a> = BoxStream<'a, Result<Arc<ImageRecord>>>;

/// 图片记录存储
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// 分配 ID 与上传时间并保存图片
    async fn save(&self, image: NewImage) -> Result<Arc<ImageRecord>>;

    /// 根据 ID 查找图片，不存在时返回 `None`
    async fn get(&self, id: i64) -> Result<Option<Arc<ImageRecord>>>;

    /// 遍历所有图片，整个遍历过程观察到的是同一份快照
    fn get_all(&self) -> ImageStream<'_>;

    /// 图片总数
    async fn count(&self) -> Result<u64>;
}

/// 搜索历史记录
#[async_trait]
pub trait HistoryLedger: Send + Sync {
    /// 追加一条搜索历史，引用的图片必须存在
    async fn append(&self, source_image_id: i64, result_count: u32) -> Result<SearchHistoryEntry>;

    /// 按搜索时间倒序列出所有历史及其引用的图片
    async fn list_all(&self) -> Result<Vec<HistoryItem>>;

    /// 清空所有历史，不影响图片
    async fn clear(&self) -> Result<()>;
}

/// 存储后端类型
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// 进程内存储，进程退出后数据丢失
    Memory,
    /// SQLite 数据库
    Sqlite,
}
