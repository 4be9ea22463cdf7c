//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了存储后端接口以及内置的内存、Redis 实现。
//!
//! 编排层只把后端当作 `String -> Vec<u8>` 的不透明存储：
//! 淘汰、过期、并发安全都由后端自己负责。

pub mod memory;
pub mod redis_backend;

use crate::config::BackendConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use self::memory::MemoryBackend;
pub use self::redis_backend::RedisBackend;

/// 存储后端特征
///
/// 只要求单键的读己之写，不要求事务或顺序保证
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// 读取字节负载
    ///
    /// # 参数
    ///
    /// * `key` - 后端键
    ///
    /// # 返回值
    ///
    /// 键不存在时返回 `Ok(None)`，而不是错误
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// 写入字节负载（覆盖语义）
    ///
    /// 必须允许来自不同调用的并发写入
    async fn write(&self, key: &str, payload: Vec<u8>) -> Result<()>;
}

#[async_trait]
impl<B: StorageBackend + ?Sized> StorageBackend for Arc<B> {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).read(key).await
    }

    async fn write(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        (**self).write(key, payload).await
    }
}

/// 根据配置创建存储后端
///
/// # 参数
///
/// * `config` - 后端配置
///
/// # 返回值
///
/// 返回共享的后端实例，Redis 连接失败时返回错误
pub async fn build_backend(config: &BackendConfig) -> Result<Arc<dyn StorageBackend>> {
    match config {
        BackendConfig::Memory(memory) => Ok(Arc::new(MemoryBackend::from_config(memory))),
        BackendConfig::Redis(redis) => Ok(Arc::new(RedisBackend::new(redis).await?)),
    }
}
