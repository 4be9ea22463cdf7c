//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于内存的存储后端实现。

use super::StorageBackend;
use crate::config::MemoryConfig;
use crate::error::Result;
use crate::utils::redaction::redact_cache_key;
use async_trait::async_trait;
use moka::future::Cache;
use std::time::Duration;
use tracing::{debug, instrument};

/// 内存存储后端
///
/// 使用Moka作为底层缓存库，容量按条目数计算。
/// 超出容量后的淘汰和过期由 Moka 处理。
#[derive(Clone)]
pub struct MemoryBackend {
    cache: Cache<String, Vec<u8>>,
}

impl MemoryBackend {
    /// 创建新的内存后端实例
    ///
    /// # 参数
    ///
    /// * `capacity` - 最大条目数
    ///
    /// # 返回值
    ///
    /// 返回新的MemoryBackend实例
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// 创建带过期时间的内存后端实例
    ///
    /// # 参数
    ///
    /// * `capacity` - 最大条目数
    /// * `ttl` - 条目写入后的存活时间
    pub fn with_ttl(capacity: u64, ttl: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// 根据配置创建实例
    pub fn from_config(config: &MemoryConfig) -> Self {
        match config.ttl_secs {
            Some(ttl) => Self::with_ttl(config.max_capacity, Duration::from_secs(ttl)),
            None => Self::new(config.max_capacity),
        }
    }

    /// 删除缓存项
    #[instrument(skip(self, key), level = "debug", fields(key = %redact_cache_key(key)))]
    pub async fn remove(&self, key: &str) {
        self.cache.remove(key).await;
        debug!("memory remove: key={}", redact_cache_key(key));
    }

    /// 清空所有条目
    pub async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        debug!("memory clear: 缓存已清空");
    }

    /// 当前条目数
    ///
    /// 先执行挂起的维护任务，保证计数反映最近的写入
    pub async fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        self.cache.entry_count()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    #[instrument(skip(self, key), level = "debug", fields(key = %redact_cache_key(key)))]
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self.cache.get(key).await;
        debug!(
            "memory read: key={}, found={}",
            redact_cache_key(key),
            result.is_some()
        );
        Ok(result)
    }

    #[instrument(
        skip(self, key, payload),
        level = "debug",
        fields(key = %redact_cache_key(key), payload_len = payload.len())
    )]
    async fn write(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.cache.insert(key.to_string(), payload).await;
        debug!("memory write: key={}", redact_cache_key(key));
        Ok(())
    }
}
