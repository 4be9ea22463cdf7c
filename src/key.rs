//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了后端键的生成规则和标识符去重。

use std::collections::HashSet;
use std::fmt::Display;
use std::hash::Hash;

/// 命名空间与标识符之间的分隔符
pub const KEY_SEPARATOR: char = ':';

/// 缓存标识符约束
///
/// 标识符需要可比较、可哈希，并且有稳定的字符串形式（`Display`），
/// 后端键由该字符串形式派生。
pub trait CacheId: Eq + Hash + Clone + Display + Send + Sync {}

impl<T> CacheId for T where T: Eq + Hash + Clone + Display + Send + Sync {}

/// 生成后端键
///
/// 键的格式为 `namespace:id`。相同的 (namespace, id) 总是得到相同的键；
/// 如果标识符的字符串形式本身含有分隔符，不同的组合可能产生相同的键，
/// 这一点编排层无法检测，需要调用方保证。
///
/// # 参数
///
/// * `namespace` - 命名空间
/// * `id` - 逻辑标识符
///
/// # 返回值
///
/// 返回后端键
pub fn build_key<K: Display + ?Sized>(namespace: &str, id: &K) -> String {
    format!("{}{}{}", namespace, KEY_SEPARATOR, id)
}

/// 对标识符去重，保留首次出现的顺序
pub fn dedup_ids<K: CacheId>(ids: &[K]) -> Vec<K> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter()
        .filter(|id| seen.insert(*id))
        .cloned()
        .collect()
}
