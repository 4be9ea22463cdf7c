//! batchcache - 批量缓存编排库
//!
//! 在不透明的键值存储之前提供“先读缓存、只为缺失项回源、写回并合并结果”的批量语义，
//! 支持标识符去重、部分命中以及零值空缓存。

#![doc(html_root_url = "https://docs.rs/batchcache/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use tokio;

pub mod backend;
pub mod client;
pub mod config;
pub mod error;
pub mod key;
pub mod metrics;
pub mod serialization;
pub mod telemetry;
pub mod utils;

// Re-export commonly used items
pub use backend::{build_backend, MemoryBackend, RedisBackend, StorageBackend};
pub use client::{BatchCache, CacheValue};
pub use config::{CacheConfig, ConfigSource};
pub use error::{CacheError, Result};
pub use key::{build_key, CacheId};
pub use metrics::Metrics;

/// batchcache 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
