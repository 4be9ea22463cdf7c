//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了批量缓存客户端及其值类型约束。

pub mod batch;

use serde::{de::DeserializeOwned, Serialize};

pub use batch::BatchCache;

/// 缓存值约束
///
/// 值必须可序列化，并且以 `Default::default()` 作为“零值”。
/// 零值永远不会作为命中返回：写入的零值在读取时被视为“已缓存但为空”，
/// 既不出现在结果里，也不会触发回源。
pub trait CacheValue: Serialize + DeserializeOwned + Default + PartialEq + Send + Sync {
    /// 是否为零值
    fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl<T> CacheValue for T where
    T: Serialize + DeserializeOwned + Default + PartialEq + Send + Sync
{
}
