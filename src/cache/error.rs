// ==========================================
// 仓储库存同步系统 - 缓存层错误类型
// ==========================================
// 职责: 定义缓存文档读写与聚合计算的错误类型
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 缓存层错误类型
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("缓存文件读写失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("缓存文档序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("仓储访问失败: {0}")]
    Repository(#[from] RepositoryError),

    #[error("配置读取失败: {0}")]
    Config(String),

    #[error("缓存键无效: {0}")]
    InvalidKey(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 缓存层结果类型
pub type CacheResult<T> = Result<T, CacheError>;
