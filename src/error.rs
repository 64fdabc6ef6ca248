use thiserror::Error;

/// imsim 核心操作的错误类型
#[derive(Debug, Error)]
pub enum Error {
    /// 字段缺失或取值非法
    #[error("数据校验失败: {0}")]
    Validation(String),

    /// 查找的记录不存在
    #[error("图片不存在: {0}")]
    NotFound(i64),

    /// 两个特征向量维数不一致
    #[error("特征向量维数不一致: 期望 {expected}，实际 {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("不支持的图片类型: {0}")]
    UnsupportedMediaType(String),

    #[error("上传文件过大: {size} 字节，上限 {limit} 字节")]
    PayloadTooLarge { size: usize, limit: usize },

    /// 特征提取器执行失败
    #[error("特征提取失败")]
    ExtractionFailed(#[source] anyhow::Error),

    /// 搜索历史引用了不存在的图片
    #[error("搜索历史引用的图片不存在: {0}")]
    DanglingReference(i64),

    /// 存储数据已损坏
    #[error("存储数据不一致: {0}")]
    Integrity(String),

    /// 后台任务未能正常结束
    #[error("后台任务异常结束")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl Error {
    /// 是否为客户端输入导致的错误
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound(_)
                | Self::UnsupportedMediaType(_)
                | Self::PayloadTooLarge { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_display() {
        let err = Error::DimensionMismatch { expected: 128, actual: 64 };
        let msg = err.to_string();
        assert!(msg.contains("128"));
        assert!(msg.contains("64"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::UnsupportedMediaType("image/gif".into()).is_client_error());
        assert!(Error::PayloadTooLarge { size: 2, limit: 1 }.is_client_error());
        assert!(Error::NotFound(1).is_client_error());
        assert!(!Error::DanglingReference(1).is_client_error());
        assert!(!Error::Integrity("broken".into()).is_client_error());
        assert!(!Error::DimensionMismatch { expected: 1, actual: 2 }.is_client_error());
    }

    #[test]
    fn test_extraction_failed_keeps_source() {
        let err = Error::ExtractionFailed(anyhow::anyhow!("decoder exploded"));
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "decoder exploded");
    }
}
