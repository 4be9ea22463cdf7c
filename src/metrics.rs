//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的指标收集功能。
//!
//! 指标由每个 `BatchCache` 实例自己持有，不存在全局计数器。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{span, Level};

/// 指标收集器
///
/// 用于收集和存储缓存系统的各种运行时指标
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    /// 请求总数统计
    requests_total: Arc<Mutex<BTreeMap<RequestLabels, u64>>>,
    /// 回源函数收到的标识符总数
    fetched_ids: Arc<Mutex<BTreeMap<(String, String), u64>>>,
}

/// (service, namespace, op, result)
type RequestLabels = (String, String, String, String);

fn request_labels(service: &str, namespace: &str, op: &str, result: &str) -> RequestLabels {
    (
        service.to_string(),
        namespace.to_string(),
        op.to_string(),
        result.to_string(),
    )
}

/// 计数器锁中毒时仍然继续使用内部数据，指标不应影响主流程
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Metrics {
    /// 创建新的指标收集器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录请求指标
    ///
    /// # 参数
    ///
    /// * `service` - 服务名称
    /// * `namespace` - 命名空间
    /// * `op` - 操作类型（get/fetch/write）
    /// * `result` - 操作结果（hit/miss/negative/error/success）
    pub fn record_request(&self, service: &str, namespace: &str, op: &str, result: &str) {
        let span = span!(Level::TRACE, "cache_request", service, namespace, op, result);
        let _enter = span.enter();
        let key = request_labels(service, namespace, op, result);
        *lock(&self.requests_total).entry(key).or_insert(0) += 1;
    }

    /// 记录一次回源涉及的标识符数量
    pub fn record_fetched(&self, service: &str, namespace: &str, count: usize) {
        let key = (service.to_string(), namespace.to_string());
        *lock(&self.fetched_ids).entry(key).or_insert(0) += count as u64;
    }

    /// 读取某个请求计数
    pub fn request_count(&self, service: &str, namespace: &str, op: &str, result: &str) -> u64 {
        let key = request_labels(service, namespace, op, result);
        lock(&self.requests_total).get(&key).copied().unwrap_or(0)
    }

    /// 读取回源标识符总数
    pub fn fetched_count(&self, service: &str, namespace: &str) -> u64 {
        let key = (service.to_string(), namespace.to_string());
        lock(&self.fetched_ids).get(&key).copied().unwrap_or(0)
    }

    /// 将所有指标格式化为文本，用于监控系统采集
    pub fn render(&self) -> String {
        let mut output = String::new();
        for ((service, namespace, op, result), v) in lock(&self.requests_total).iter() {
            output.push_str(&format!(
                "cache_requests_total{{service=\"{}\", namespace=\"{}\", op=\"{}\", result=\"{}\"}} {}\n",
                service, namespace, op, result, v
            ));
        }
        for ((service, namespace), v) in lock(&self.fetched_ids).iter() {
            output.push_str(&format!(
                "cache_fetched_ids_total{{service=\"{}\", namespace=\"{}\"}} {}\n",
                service, namespace, v
            ));
        }
        output
    }
}
