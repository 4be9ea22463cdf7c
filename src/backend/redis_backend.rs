//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了基于Redis的存储后端实现。

use super::StorageBackend;
use crate::config::RedisConfig;
use crate::error::{CacheError, Result};
use crate::utils::redaction::{redact_cache_key, redact_connection_string};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use secrecy::ExposeSecret;
use std::future::Future;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, instrument};

/// Redis存储后端
///
/// 使用 `ConnectionManager` 自动重连；每条命令都带超时，
/// 超时返回 `CacheError::Timeout`，编排层在读路径上会把它当作未命中。
#[derive(Clone)]
pub struct RedisBackend {
    manager: ConnectionManager,
    command_timeout_ms: u64,
    ttl_secs: Option<u64>,
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("command_timeout_ms", &self.command_timeout_ms)
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

impl RedisBackend {
    /// 创建新的Redis后端实例
    ///
    /// # 参数
    ///
    /// * `config` - Redis配置
    ///
    /// # 返回值
    ///
    /// 返回新的RedisBackend实例，连接超时或失败时返回错误
    #[instrument(skip(config), level = "info", name = "init_redis_backend")]
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let raw = config.connection_string.expose_secret();
        let connection_string = if config.enable_tls && !raw.starts_with("rediss://") {
            raw.replace("redis://", "rediss://")
        } else {
            raw.to_string()
        };
        let redacted = redact_connection_string(&connection_string);

        let client = Client::open(connection_string.as_str())?;
        let manager = match timeout(
            Duration::from_millis(config.connection_timeout_ms),
            client.get_connection_manager(),
        )
        .await
        {
            Ok(res) => res?,
            Err(_) => {
                return Err(CacheError::Timeout(format!(
                    "Connection timed out after {}ms. Target: {}",
                    config.connection_timeout_ms, redacted
                )));
            }
        };

        info!("Redis backend connected: {}", redacted);
        Ok(Self {
            manager,
            command_timeout_ms: config.command_timeout_ms,
            ttl_secs: config.ttl_secs,
        })
    }

    /// 获取命令超时时间（毫秒）
    pub fn command_timeout_ms(&self) -> u64 {
        self.command_timeout_ms
    }

    /// 检查连接是否可用
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: String = self
            .with_timeout("PING", async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }

    /// 删除键
    #[instrument(skip(self, key), level = "debug", fields(key = %redact_cache_key(key)))]
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: i64 = self.with_timeout("DEL", conn.del(key)).await?;
        Ok(())
    }

    async fn with_timeout<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match timeout(Duration::from_millis(self.command_timeout_ms), fut).await {
            Ok(res) => res.map_err(CacheError::from),
            Err(_) => Err(CacheError::Timeout(format!(
                "Redis {} timed out after {}ms",
                op, self.command_timeout_ms
            ))),
        }
    }
}

#[async_trait]
impl StorageBackend for RedisBackend {
    #[instrument(skip(self, key), level = "debug")]
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = self.with_timeout("GET", conn.get(key)).await?;
        debug!(
            "redis read: key={}, found={}",
            redact_cache_key(key),
            value.is_some()
        );
        Ok(value)
    }

    #[instrument(skip(self, key, payload), level = "debug", fields(payload_len = payload.len()))]
    async fn write(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        let mut conn = self.manager.clone();
        match self.ttl_secs {
            Some(ttl) => {
                let _: () = self
                    .with_timeout("SETEX", conn.set_ex(key, payload, ttl))
                    .await?;
            }
            None => {
                let _: () = self.with_timeout("SET", conn.set(key, payload)).await?;
            }
        }
        debug!(
            "redis write: key={}, ttl={:?}",
            redact_cache_key(key),
            self.ttl_secs
        );
        Ok(())
    }
}
