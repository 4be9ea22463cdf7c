//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存系统的配置结构和解析逻辑。
//!
//! 除了 `CacheConfig` 本身，还提供 `ConfigSource`：把一份完整的 TOML
//! 应用配置加载进来，按点分路径读取单个值或反序列化某个子表，
//! 方便把缓存配置嵌在更大的配置文件里。

use crate::error::{CacheError, Result};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

pub const CONFIG_VERSION: u32 = 1;

/// 服务名称最大长度
const MAX_SERVICE_NAME_LEN: usize = 64;
/// TTL 上限：30天
const MAX_TTL_SECS: u64 = 86400 * 30;

/// 缓存配置
///
/// 描述一个 `BatchCache` 实例：服务名、编解码方式以及存储后端
#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default)]
    pub config_version: Option<u32>,
    /// 服务名称，用作日志和指标的标签
    pub service_name: String,
    /// 是否启用指标收集
    #[serde(default = "default_enable_metrics")]
    pub enable_metrics: bool,
    /// 序列化类型
    #[serde(default)]
    pub serialization: SerializationType,
    /// 是否对序列化结果进行 gzip 压缩
    #[serde(default)]
    pub compression: bool,
    /// 存储后端配置
    #[serde(default)]
    pub backend: BackendConfig,
}

fn default_enable_metrics() -> bool {
    true
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            config_version: Some(CONFIG_VERSION),
            service_name: "default".to_string(),
            enable_metrics: true,
            serialization: SerializationType::Json,
            compression: false,
            backend: BackendConfig::default(),
        }
    }
}

/// 序列化类型枚举
#[derive(Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SerializationType {
    /// JSON序列化
    #[default]
    Json,
}

/// 存储后端配置
#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// 进程内存储（moka）
    Memory(MemoryConfig),
    /// Redis 存储
    Redis(RedisConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Memory(MemoryConfig::default())
    }
}

/// 内存后端配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct MemoryConfig {
    /// 最大条目数
    pub max_capacity: u64,
    /// 过期时间（秒），None 表示不过期
    pub ttl_secs: Option<u64>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10000,
            ttl_secs: None,
        }
    }
}

/// Redis后端配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RedisConfig {
    /// 连接字符串
    pub connection_string: SecretString,
    /// 连接超时时间（毫秒）
    pub connection_timeout_ms: u64,
    /// 命令执行超时时间（毫秒）
    pub command_timeout_ms: u64,
    /// 是否启用 TLS
    pub enable_tls: bool,
    /// 写入时的过期时间（秒），None 表示不过期
    pub ttl_secs: Option<u64>,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            connection_string: SecretString::new("redis://localhost:6379".into()),
            connection_timeout_ms: 5000,
            command_timeout_ms: 3000,
            enable_tls: false,
            ttl_secs: Some(3600),
        }
    }
}

impl CacheConfig {
    /// 从 TOML 字符串解析并验证配置
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: CacheConfig =
            toml::from_str(s).map_err(|e| CacheError::ConfigError(e.to_string()))?;
        config.validate().map_err(CacheError::ConfigError)?;
        Ok(config)
    }

    /// 从 TOML 文件解析并验证配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// 验证配置
    ///
    /// 检查配置的有效性，确保所有必需的字段都已设置，并且值在合理范围内
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(version) = &self.config_version {
            if *version > CONFIG_VERSION {
                return Err(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        if self.service_name.is_empty() {
            return Err("Service name cannot be empty".to_string());
        }

        if self.service_name.len() > MAX_SERVICE_NAME_LEN {
            return Err(format!(
                "Service name '{}' exceeds maximum length of {} characters",
                self.service_name, MAX_SERVICE_NAME_LEN
            ));
        }

        match &self.backend {
            BackendConfig::Memory(memory) => {
                if memory.max_capacity == 0 {
                    return Err(format!(
                        "Service '{}' memory max_capacity cannot be zero",
                        self.service_name
                    ));
                }
                validate_ttl(&self.service_name, memory.ttl_secs)?;
            }
            BackendConfig::Redis(redis) => {
                if !(100..=30000).contains(&redis.connection_timeout_ms) {
                    return Err(format!(
                        "Service '{}' connection_timeout_ms must be between 100 and 30000 ms",
                        self.service_name
                    ));
                }
                if !(100..=60000).contains(&redis.command_timeout_ms) {
                    return Err(format!(
                        "Service '{}' command_timeout_ms must be between 100 and 60000 ms",
                        self.service_name
                    ));
                }
                validate_ttl(&self.service_name, redis.ttl_secs)?;
            }
        }

        Ok(())
    }
}

fn validate_ttl(service: &str, ttl: Option<u64>) -> std::result::Result<(), String> {
    match ttl {
        Some(0) => Err(format!("Service '{}' TTL cannot be zero", service)),
        Some(ttl) if ttl > MAX_TTL_SECS => Err(format!(
            "Service '{}' TTL cannot exceed 30 days ({} seconds)",
            service, MAX_TTL_SECS
        )),
        _ => Ok(()),
    }
}

/// 已加载的 TOML 配置文档
///
/// 通过点分路径访问嵌套的表，例如 `server.http.addr.port`
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    root: toml::Table,
}

impl ConfigSource {
    /// 从字符串加载
    pub fn load_from_str(s: &str) -> Result<Self> {
        let root: toml::Table =
            toml::from_str(s).map_err(|e| CacheError::ConfigError(e.to_string()))?;
        Ok(Self { root })
    }

    /// 从任意读取器加载
    pub fn load_from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        Self::load_from_str(&content)
    }

    /// 从文件加载
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    /// 按点分路径查找值
    ///
    /// 路径中任意一段不存在或者中间节点不是表时返回 None
    pub fn get(&self, path: &str) -> Option<&toml::Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_table()?.get(segment)?;
        }
        Some(current)
    }

    /// 读取整数
    pub fn get_int(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(toml::Value::as_integer)
    }

    /// 读取字符串
    pub fn get_string(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(toml::Value::as_str)
    }

    /// 读取布尔值
    pub fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path).and_then(toml::Value::as_bool)
    }

    /// 将某个路径下的值反序列化为指定类型
    ///
    /// # 参数
    ///
    /// * `path` - 点分路径
    ///
    /// # 返回值
    ///
    /// 路径不存在或类型不匹配时返回配置错误
    pub fn unmarshal_key<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self
            .get(path)
            .ok_or_else(|| CacheError::ConfigError(format!("Key '{}' not found", path)))?;
        value
            .clone()
            .try_into()
            .map_err(|e| CacheError::ConfigError(format!("Key '{}': {}", path, e)))
    }

    /// 读取并验证嵌在文档中的缓存配置
    pub fn cache_config(&self, path: &str) -> Result<CacheConfig> {
        let config: CacheConfig = self.unmarshal_key(path)?;
        config.validate().map_err(CacheError::ConfigError)?;
        Ok(config)
    }
}
