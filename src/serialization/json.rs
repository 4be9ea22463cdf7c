//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了JSON序列化器的实现。

use super::Serializer;
use crate::error::{CacheError, Result};
use serde::{de::DeserializeOwned, Serialize};

/// gzip 流的魔数
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// JSON序列化器
///
/// 启用压缩后写出 gzip 包裹的 JSON。读取时按魔数识别负载，
/// 所以开启压缩前写入的明文条目依然可读。
#[derive(Clone, Debug)]
pub struct JsonSerializer {
    /// 是否启用压缩
    compress: bool,
}

impl JsonSerializer {
    /// 创建新的JSON序列化器
    pub fn new() -> Self {
        Self { compress: false }
    }

    /// 创建启用压缩的JSON序列化器
    pub fn with_compression() -> Self {
        Self { compress: true }
    }

    /// 是否启用压缩
    pub fn is_compressed(&self) -> bool {
        self.compress
    }

    #[cfg(feature = "flate2")]
    fn compress(json_bytes: Vec<u8>) -> Result<Vec<u8>> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder
            .write_all(&json_bytes)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        encoder
            .finish()
            .map_err(|e| CacheError::Serialization(e.to_string()))
    }

    #[cfg(not(feature = "flate2"))]
    fn compress(json_bytes: Vec<u8>) -> Result<Vec<u8>> {
        Ok(json_bytes)
    }

    #[cfg(feature = "flate2")]
    fn decompress(data: &[u8]) -> Result<Vec<u8>> {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let mut decoder = GzDecoder::new(data);
        let mut decoded = Vec::new();
        decoder
            .read_to_end(&mut decoded)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        Ok(decoded)
    }

    #[cfg(not(feature = "flate2"))]
    fn decompress(_data: &[u8]) -> Result<Vec<u8>> {
        Err(CacheError::Serialization(
            "gzip payload found but the flate2 feature is disabled".to_string(),
        ))
    }
}

impl Default for JsonSerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer for JsonSerializer {
    /// 序列化值为JSON字节数组
    ///
    /// # 参数
    ///
    /// * `value` - 要序列化的值
    ///
    /// # 返回值
    ///
    /// 返回序列化后的字节数组或错误
    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        let json_bytes =
            serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;

        if self.compress {
            Self::compress(json_bytes)
        } else {
            Ok(json_bytes)
        }
    }

    /// 从JSON字节数组反序列化值
    ///
    /// # 参数
    ///
    /// * `data` - 要反序列化的字节数组
    ///
    /// # 返回值
    ///
    /// 返回反序列化后的值或错误
    fn deserialize<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        if data.starts_with(&GZIP_MAGIC) {
            let decoded = Self::decompress(data)?;
            return serde_json::from_slice(&decoded)
                .map_err(|e| CacheError::Serialization(e.to_string()));
        }

        serde_json::from_slice(data).map_err(|e| CacheError::Serialization(e.to_string()))
    }
}
