use std::sync::Arc;

use crate::Gallery;

/// 应用状态
pub struct AppState {
    pub gallery: Gallery,
    /// 未指定 limit 时返回的结果数量
    pub limit: usize,
    /// 上传图片的最大字节数
    pub max_upload: usize,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(gallery: Gallery, limit: usize, max_upload: usize) -> Arc<Self> {
        Arc::new(AppState { gallery, limit, max_upload })
    }
}
