//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的日志和链路追踪初始化。

use crate::error::{CacheError, Result};
use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// 初始化日志与 OpenTelemetry Tracing
///
/// 此函数应该在应用程序启动时调用一次。缓存本身只通过 `tracing` 输出事件，
/// 是否安装订阅者由应用层决定，这里仅作为库提供的辅助函数。
///
/// # 参数
///
/// * `service_name` - 服务名称，用作 tracer 名称
/// * `default_filter` - 未设置 `RUST_LOG` 时使用的过滤规则，例如 `"batchcache=debug"`
///
/// # 返回值
///
/// 已经存在全局订阅者时返回配置错误
pub fn init_tracing(service_name: &str, default_filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // 未配置导出器的 provider 只负责生成 span 上下文
    let provider = SdkTracerProvider::builder().build();
    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer(service_name.to_string());
    let telemetry = tracing_opentelemetry::layer().with_tracer(tracer);

    Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .try_init()
        .map_err(|e| CacheError::ConfigError(format!("failed to install subscriber: {}", e)))
}
