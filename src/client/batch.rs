//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了批量缓存客户端的实现：批量读取、批量回源写入，
//! 以及“先读后补”的两阶段协议。

use super::CacheValue;
use crate::backend::{build_backend, StorageBackend};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::key::{build_key, dedup_ids, CacheId};
use crate::metrics::Metrics;
use crate::serialization::{Serializer, SerializerEnum};
use crate::utils::redaction::redact_cache_key;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// 批量缓存客户端
///
/// 给定一组标识符，优先返回后端中的缓存值，只对缺失的标识符调用回源函数，
/// 把回源结果写回后端，最后返回合并后的结果。
///
/// 读取路径是尽力而为的：后端读取失败或反序列化失败都会降级为未命中。
/// 回源失败和写回失败会返回给调用方，已经写入的条目不会回滚。
///
/// # 零值
///
/// `V::default()` 被当作“空”。回源函数返回零值（或者没有返回某个标识符）时，
/// 零值仍会被写入后端；之后读取到这个零值时，该标识符既不出现在结果中，
/// 也不会被再次回源。因此“从未计算过”和“计算结果就是空”在读取结果上无法区分，
/// 如果零值本身是有意义的数据，请用 `Option<T>` 之类的包装类型。
///
/// # 并发
///
/// 单次调用内的读写按去重后的顺序依次执行。不同调用之间没有协调：
/// 两个并发调用同时缺失同一个标识符时，都会执行回源并写入，以后写为准。
pub struct BatchCache<K, V> {
    /// 服务名称
    service_name: String,
    /// 存储后端
    backend: Arc<dyn StorageBackend>,
    /// 序列化器
    serializer: SerializerEnum,
    /// 指标收集器
    metrics: Option<Metrics>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for BatchCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            service_name: self.service_name.clone(),
            backend: self.backend.clone(),
            serializer: self.serializer.clone(),
            metrics: self.metrics.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K, V> BatchCache<K, V>
where
    K: CacheId,
    V: CacheValue,
{
    /// 创建新的批量缓存客户端
    ///
    /// # 参数
    ///
    /// * `service_name` - 服务名称，用于日志和指标
    /// * `backend` - 存储后端
    /// * `serializer` - 序列化器
    pub fn new(
        service_name: impl Into<String>,
        backend: Arc<dyn StorageBackend>,
        serializer: SerializerEnum,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            backend,
            serializer,
            metrics: Some(Metrics::new()),
            _marker: PhantomData,
        }
    }

    /// 根据配置创建客户端
    ///
    /// # 参数
    ///
    /// * `config` - 缓存配置
    ///
    /// # 返回值
    ///
    /// 配置无效或后端初始化失败时返回错误
    #[instrument(skip(config), level = "info", fields(service = %config.service_name))]
    pub async fn from_config(config: &CacheConfig) -> Result<Self> {
        config.validate().map_err(CacheError::ConfigError)?;

        let backend = build_backend(&config.backend).await?;
        let serializer = SerializerEnum::from_config(&config.serialization, config.compression);
        let cache = Self::new(config.service_name.clone(), backend, serializer);

        if config.enable_metrics {
            Ok(cache)
        } else {
            Ok(cache.without_metrics())
        }
    }

    /// 使用外部共享的指标收集器
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 关闭指标收集
    pub fn without_metrics(mut self) -> Self {
        self.metrics = None;
        self
    }

    /// 服务名称
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// 指标收集器
    pub fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// 存储后端
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// 批量读取缓存
    ///
    /// 标识符先去重；读取失败、不存在、反序列化失败的标识符都不会出现在结果中，
    /// 值为零值的标识符同样不会出现。此操作不会返回错误。
    ///
    /// # 参数
    ///
    /// * `namespace` - 命名空间
    /// * `ids` - 标识符列表
    ///
    /// # 返回值
    ///
    /// 返回命中的标识符到值的映射
    pub async fn get_batch(&self, namespace: &str, ids: &[K]) -> HashMap<K, V> {
        let (found, _) = self.lookup(namespace, ids).await;
        found
    }

    /// 读取单个缓存值
    pub async fn get(&self, namespace: &str, id: &K) -> Option<V> {
        self.get_batch(namespace, std::slice::from_ref(id))
            .await
            .remove(id)
    }

    /// 批量回源并写入缓存
    ///
    /// `ids` 为空时直接返回。否则以去重后的完整列表调用一次 `fetch`，
    /// 再逐个写入后端；`fetch` 没有返回的标识符写入零值。
    ///
    /// # 参数
    ///
    /// * `namespace` - 命名空间
    /// * `ids` - 标识符列表
    /// * `fetch` - 回源函数
    ///
    /// # 返回值
    ///
    /// `fetch` 失败时原样返回其错误且不写入任何条目；
    /// 第一个序列化或写入失败会中止写入并返回，之前的条目保持已写入状态
    pub async fn set_batch<F, Fut>(&self, namespace: &str, ids: &[K], fetch: F) -> Result<()>
    where
        F: FnOnce(Vec<K>) -> Fut,
        Fut: Future<Output = Result<HashMap<K, V>>>,
    {
        let mut merged = HashMap::new();
        self.fill(namespace, dedup_ids(ids), fetch, &mut merged).await
    }

    /// 写入单个缓存值
    pub async fn set<F, Fut>(&self, namespace: &str, id: K, fetch: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        self.set_batch(namespace, &[id.clone()], move |_| async move {
            let value = fetch().await?;
            Ok::<_, CacheError>(HashMap::from([(id, value)]))
        })
        .await
    }

    /// 批量读取缓存，缺失部分回源并写入
    ///
    /// 第一阶段读取缓存并得到缺失列表；缺失列表非空时，第二阶段只用缺失的标识符调用
    /// `fetch`，把回源结果合并进结果并写回后端。全部命中时不会调用 `fetch`。
    ///
    /// # 参数
    ///
    /// * `namespace` - 命名空间
    /// * `ids` - 标识符列表
    /// * `fetch` - 回源函数，只会收到缺失的标识符
    ///
    /// # 返回值
    ///
    /// 返回合并后的结果；第二阶段失败时只返回其错误，
    /// 需要同时拿到已有结果时使用 [`BatchCache::get_and_set_batch_partial`]
    pub async fn get_and_set_batch<F, Fut>(
        &self,
        namespace: &str,
        ids: &[K],
        fetch: F,
    ) -> Result<HashMap<K, V>>
    where
        F: FnOnce(Vec<K>) -> Fut,
        Fut: Future<Output = Result<HashMap<K, V>>>,
    {
        match self.get_and_set_batch_partial(namespace, ids, fetch).await {
            (merged, None) => Ok(merged),
            (_, Some(e)) => Err(e),
        }
    }

    /// 批量读取缓存，缺失部分回源并写入，同时返回结果和错误
    ///
    /// 与 `get_and_set_batch` 执行相同的两阶段协议，但第二阶段失败时不丢弃结果：
    ///
    /// * 回源失败：结果只包含第一阶段的命中
    /// * 序列化或写入失败：回源得到的条目已经合并进结果，即使它们没有全部写入后端
    ///
    /// # 参数
    ///
    /// * `namespace` - 命名空间
    /// * `ids` - 标识符列表
    /// * `fetch` - 回源函数，只会收到缺失的标识符
    ///
    /// # 返回值
    ///
    /// 返回合并后的结果，以及第二阶段的错误（如果有）
    pub async fn get_and_set_batch_partial<F, Fut>(
        &self,
        namespace: &str,
        ids: &[K],
        fetch: F,
    ) -> (HashMap<K, V>, Option<CacheError>)
    where
        F: FnOnce(Vec<K>) -> Fut,
        Fut: Future<Output = Result<HashMap<K, V>>>,
    {
        let (mut merged, missing) = self.lookup(namespace, ids).await;
        match self.fill(namespace, missing, fetch, &mut merged).await {
            Ok(()) => (merged, None),
            Err(e) => (merged, Some(e)),
        }
    }

    /// 读取单个缓存值，缺失时回源并写入
    ///
    /// 缓存中是零值时返回 `None`；刚回源得到的值原样返回
    pub async fn get_and_set<F, Fut>(&self, namespace: &str, id: K, fetch: F) -> Result<Option<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let lookup_id = id.clone();
        let mut result = self
            .get_and_set_batch(namespace, &[id.clone()], move |_| async move {
                let value = fetch().await?;
                Ok::<_, CacheError>(HashMap::from([(id, value)]))
            })
            .await?;
        Ok(result.remove(&lookup_id))
    }

    /// 读取阶段：返回命中结果和缺失列表
    ///
    /// 缺失列表保持请求中首次出现的顺序；零值条目既不算命中也不算缺失
    #[instrument(
        skip(self, ids),
        level = "debug",
        fields(service = %self.service_name, requested = ids.len())
    )]
    async fn lookup(&self, namespace: &str, ids: &[K]) -> (HashMap<K, V>, Vec<K>) {
        let unique = dedup_ids(ids);
        let mut found = HashMap::with_capacity(unique.len());
        let mut missing = Vec::new();

        for id in unique {
            let key = build_key(namespace, &id);
            match self.backend.read(&key).await {
                Ok(Some(bytes)) => match self.serializer.deserialize::<V>(&bytes) {
                    Ok(value) if value.is_zero() => {
                        debug!("cache negative entry: key={}", redact_cache_key(&key));
                        self.record(namespace, "get", "negative");
                    }
                    Ok(value) => {
                        self.record(namespace, "get", "hit");
                        found.insert(id, value);
                    }
                    Err(e) => {
                        error!(
                            service = %self.service_name,
                            namespace,
                            key = %redact_cache_key(&key),
                            error = %e,
                            "cache decode failed, treating as miss"
                        );
                        self.record(namespace, "get", "error");
                        missing.push(id);
                    }
                },
                Ok(None) => {
                    self.record(namespace, "get", "miss");
                    missing.push(id);
                }
                Err(e) => {
                    warn!(
                        service = %self.service_name,
                        namespace,
                        key = %redact_cache_key(&key),
                        error = %e,
                        "cache read failed, treating as miss"
                    );
                    self.record(namespace, "get", "error");
                    missing.push(id);
                }
            }
        }

        debug!(
            "cache lookup: namespace={}, hits={}, misses={}",
            namespace,
            found.len(),
            missing.len()
        );
        (found, missing)
    }

    /// 写回阶段：调用一次回源函数并逐个写入
    ///
    /// 回源成功后，返回的全部条目先合并进 `merged`，再按请求顺序写回；
    /// 额外返回的条目只合并，不写回
    #[instrument(
        skip(self, ids, fetch, merged),
        level = "debug",
        fields(service = %self.service_name, count = ids.len())
    )]
    async fn fill<F, Fut>(
        &self,
        namespace: &str,
        ids: Vec<K>,
        fetch: F,
        merged: &mut HashMap<K, V>,
    ) -> Result<()>
    where
        F: FnOnce(Vec<K>) -> Fut,
        Fut: Future<Output = Result<HashMap<K, V>>>,
    {
        if ids.is_empty() {
            return Ok(());
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_fetched(&self.service_name, namespace, ids.len());
        }

        let fetched = match fetch(ids.clone()).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(
                    service = %self.service_name,
                    namespace,
                    ids = %describe_ids(&ids),
                    error = %e,
                    "cache fetch failed"
                );
                self.record(namespace, "fetch", "error");
                return Err(e);
            }
        };
        self.record(namespace, "fetch", "success");

        merged.extend(fetched);

        for id in &ids {
            let key = build_key(namespace, id);
            // 回源没有返回的标识符写入零值
            let encoded = match merged.get(id) {
                Some(value) => self.serializer.serialize(value),
                None => self.serializer.serialize(&V::default()),
            };

            let payload = match encoded {
                Ok(payload) => payload,
                Err(e) => {
                    error!(
                        service = %self.service_name,
                        namespace,
                        key = %redact_cache_key(&key),
                        error = %e,
                        "cache encode failed"
                    );
                    self.record(namespace, "write", "error");
                    return Err(CacheError::EncodeFailed {
                        key,
                        source: Box::new(e),
                    });
                }
            };

            if let Err(e) = self.backend.write(&key, payload).await {
                error!(
                    service = %self.service_name,
                    namespace,
                    key = %redact_cache_key(&key),
                    error = %e,
                    "cache write failed"
                );
                self.record(namespace, "write", "error");
                return Err(CacheError::WriteFailed {
                    key,
                    source: Box::new(e),
                });
            }
            self.record(namespace, "write", "success");
        }

        Ok(())
    }

    fn record(&self, namespace: &str, op: &str, result: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_request(&self.service_name, namespace, op, result);
        }
    }
}

/// 把标识符列表拼成适合写入日志的字符串
fn describe_ids<K: Display>(ids: &[K]) -> String {
    let joined = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    redact_cache_key(&format!("[{}]", joined))
}
