//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的错误类型和处理机制。

use thiserror::Error;

/// 缓存系统错误类型枚举
///
/// 读路径上的错误（后端读取失败、反序列化失败）不会出现在调用方手中，
/// 编排层会将其降级为未命中；其余错误均同步返回给调用方。
#[derive(Error, Debug)]
pub enum CacheError {
    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// 后端错误
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Redis错误
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    /// 超时错误
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// 回源函数失败
    #[error("Fetch failed: {0}")]
    FetchError(String),

    /// 写回时序列化失败
    #[error("Encode failed for key {key}: {source}")]
    EncodeFailed {
        key: String,
        #[source]
        source: Box<CacheError>,
    },

    /// 写回后端失败
    #[error("Write failed for key {key}: {source}")]
    WriteFailed {
        key: String,
        #[source]
        source: Box<CacheError>,
    },

    /// 配置错误
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// IO错误
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CacheError {
    /// 返回写回失败时对应的后端键
    pub fn failed_key(&self) -> Option<&str> {
        match self {
            CacheError::EncodeFailed { key, .. } | CacheError::WriteFailed { key, .. } => {
                Some(key.as_str())
            }
            _ => None,
        }
    }
}

/// 缓存操作结果类型别名
///
/// 简化错误处理，所有缓存操作都返回此类型
pub type Result<T> = std::result::Result<T, CacheError>;
