//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 读路径降级与写路径失败的集成测试

#[path = "../common/mod.rs"]
mod common;

use async_trait::async_trait;
use batchcache::backend::{MemoryBackend, StorageBackend};
use batchcache::error::{CacheError, Result};
use batchcache::serialization::SerializerEnum;
use batchcache::BatchCache;
use common::{generate_unique_namespace, setup_logging, RecordingBackend};
use mockall::mock;
use std::collections::HashMap;
use std::sync::Arc;

mock! {
    pub Backend {}

    #[async_trait]
    impl StorageBackend for Backend {
        async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;
        async fn write(&self, key: &str, payload: Vec<u8>) -> Result<()>;
    }
}

fn string_cache(backend: Arc<dyn StorageBackend>) -> BatchCache<&'static str, String> {
    BatchCache::new("failure", backend, SerializerEnum::default())
}

/// 回源失败时不写入任何条目，错误原样返回
#[tokio::test]
async fn test_fetch_failure_skips_all_writes() {
    setup_logging();
    let mut backend = MockBackend::new();
    backend.expect_read().times(2).returning(|_| Ok(None));
    backend.expect_write().never();

    let cache = string_cache(Arc::new(backend));
    let result = cache
        .get_and_set_batch("n", &["A", "B"], |_| async {
            Err::<HashMap<&'static str, String>, _>(CacheError::FetchError(
                "database unavailable".to_string(),
            ))
        })
        .await;

    match result {
        Err(CacheError::FetchError(msg)) => assert_eq!(msg, "database unavailable"),
        other => panic!("unexpected result: {:?}", other),
    }

    let metrics = cache.metrics().unwrap();
    assert_eq!(metrics.request_count("failure", "n", "fetch", "error"), 1);
    assert_eq!(metrics.request_count("failure", "n", "write", "success"), 0);
}

/// set_batch 回源失败时同样不写入
#[tokio::test]
async fn test_set_batch_fetch_failure_skips_all_writes() {
    let mut backend = MockBackend::new();
    backend.expect_read().never();
    backend.expect_write().never();

    let cache = string_cache(Arc::new(backend));
    let result = cache
        .set_batch("n", &["A"], |_| async {
            Err::<HashMap<&'static str, String>, _>(CacheError::FetchError("boom".to_string()))
        })
        .await;
    assert!(matches!(result, Err(CacheError::FetchError(_))));
}

/// 写入中途失败：之前的条目保留，错误指向失败的键
#[tokio::test]
async fn test_partial_write_failure_keeps_earlier_entries() {
    setup_logging();
    let backend = Arc::new(RecordingBackend::new());
    let ns = generate_unique_namespace("partial");
    backend.fail_writes_for(&format!("{}:B", ns));
    let cache = string_cache(backend.clone());

    let result = cache
        .set_batch(&ns, &["A", "B", "C"], |_| async {
            Ok::<_, CacheError>(HashMap::from([
                ("A", "a".to_string()),
                ("B", "b".to_string()),
                ("C", "c".to_string()),
            ]))
        })
        .await;

    let err = result.expect_err("write of B must fail");
    let failed_key = format!("{}:B", ns);
    assert_eq!(err.failed_key(), Some(failed_key.as_str()));
    assert!(matches!(err, CacheError::WriteFailed { .. }));
    assert!(err.to_string().contains(&failed_key));

    // C 在 B 之后，写入被中止
    assert_eq!(
        backend.writes(),
        vec![format!("{}:A", ns), format!("{}:B", ns)]
    );
    assert_eq!(cache.get(&ns, &"A").await.as_deref(), Some("a"));
    assert_eq!(cache.get(&ns, &"B").await, None);
    assert_eq!(cache.get(&ns, &"C").await, None);
}

/// get_and_set_batch 写入失败时返回错误
#[tokio::test]
async fn test_get_and_set_batch_surfaces_write_failure() {
    let backend = Arc::new(RecordingBackend::new());
    let ns = generate_unique_namespace("gas_write");
    backend.fail_writes_for(&format!("{}:B", ns));
    let cache = string_cache(backend.clone());

    let result = cache
        .get_and_set_batch(&ns, &["A", "B"], |ids| async move {
            Ok::<_, CacheError>(
                ids.into_iter()
                    .map(|id| (id, id.to_string()))
                    .collect::<HashMap<_, _>>(),
            )
        })
        .await;

    assert!(matches!(result, Err(CacheError::WriteFailed { ref key, .. }) if key.ends_with(":B")));
    assert_eq!(cache.get(&ns, &"A").await.as_deref(), Some("A"));
}

/// 后端读取失败降级为未命中
#[tokio::test]
async fn test_read_failure_fails_open() {
    setup_logging();
    let mut backend = MockBackend::new();
    backend
        .expect_read()
        .times(2)
        .returning(|_| Err(CacheError::BackendError("connection refused".to_string())));
    backend.expect_write().times(2).returning(|_, _| Ok(()));

    let cache = string_cache(Arc::new(backend));
    let result = cache
        .get_and_set_batch("n", &["A", "B"], |ids| async move {
            assert_eq!(ids, vec!["A", "B"]);
            Ok::<_, CacheError>(HashMap::from([("A", "a".to_string()), ("B", "b".to_string())]))
        })
        .await
        .unwrap();
    assert_eq!(result.len(), 2);
}

/// get_batch 读取失败时不返回错误
#[tokio::test]
async fn test_get_batch_never_errors() {
    let backend = Arc::new(RecordingBackend::new());
    let ns = generate_unique_namespace("get_batch");
    let cache = string_cache(backend.clone());

    cache
        .set_batch(&ns, &["A", "B"], |_| async {
            Ok::<_, CacheError>(HashMap::from([("A", "a".to_string()), ("B", "b".to_string())]))
        })
        .await
        .unwrap();
    backend.fail_reads_for(&format!("{}:A", ns));

    let found = cache.get_batch(&ns, &["A", "B"]).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found.get("B").map(String::as_str), Some("b"));
}

/// 反序列化失败降级为未命中，并由回源覆盖
#[tokio::test]
async fn test_decode_failure_is_treated_as_miss() {
    setup_logging();
    let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new(100));
    backend
        .write("n:A", b"not json at all".to_vec())
        .await
        .unwrap();
    let cache = string_cache(backend.clone());

    assert!(cache.get_batch("n", &["A"]).await.is_empty());

    let result = cache
        .get_and_set_batch("n", &["A"], |ids| async move {
            assert_eq!(ids, vec!["A"]);
            Ok::<_, CacheError>(HashMap::from([("A", "repaired".to_string())]))
        })
        .await
        .unwrap();
    assert_eq!(result.get("A").map(String::as_str), Some("repaired"));
    assert_eq!(cache.get("n", &"A").await.as_deref(), Some("repaired"));

    let metrics = cache.metrics().unwrap();
    assert_eq!(metrics.request_count("failure", "n", "get", "error"), 2);
}

/// 序列化失败中止写入并指向失败的键
#[tokio::test]
async fn test_encode_failure_aborts_writes() {
    // JSON 对象的键必须是字符串，元组键无法序列化
    type Pairs = HashMap<(u32, u32), u32>;

    let backend = Arc::new(RecordingBackend::new());
    let cache: BatchCache<u32, Pairs> =
        BatchCache::new("failure", backend.clone(), SerializerEnum::default());

    let result = cache
        .set_batch("pairs", &[1, 2], |_| async {
            Ok::<_, CacheError>(HashMap::from([(1, HashMap::from([((1, 2), 3)]))]))
        })
        .await;

    let err = result.expect_err("tuple keys cannot be encoded as JSON");
    assert!(matches!(err, CacheError::EncodeFailed { .. }));
    assert_eq!(err.failed_key(), Some("pairs:1"));
    assert!(backend.writes().is_empty());
}

/// 回源失败时仍然返回第一阶段的命中
#[tokio::test]
async fn test_partial_result_keeps_hits_when_fetch_fails() {
    setup_logging();
    let cache: BatchCache<u32, String> = BatchCache::new(
        "failure",
        Arc::new(MemoryBackend::new(100)),
        SerializerEnum::default(),
    );
    cache
        .set("n", 1, || async { Ok::<_, CacheError>("cached".to_string()) })
        .await
        .unwrap();

    let (found, err) = cache
        .get_and_set_batch_partial("n", &[1, 2], |ids| async move {
            assert_eq!(ids, vec![2]);
            Err::<HashMap<u32, String>, _>(CacheError::FetchError("boom".to_string()))
        })
        .await;

    assert!(matches!(err, Some(CacheError::FetchError(ref msg)) if msg == "boom"));
    assert_eq!(found.len(), 1);
    assert_eq!(found.get(&1).map(String::as_str), Some("cached"));

    let result = cache
        .get_and_set_batch("n", &[1, 2], |_| async {
            Err::<HashMap<u32, String>, _>(CacheError::FetchError("boom".to_string()))
        })
        .await;
    assert!(matches!(result, Err(CacheError::FetchError(_))));
}

/// 写入失败时回源结果已经合并进返回值
#[tokio::test]
async fn test_partial_result_includes_fetched_entries_when_write_fails() {
    let backend = Arc::new(RecordingBackend::new());
    let ns = generate_unique_namespace("partial_write");
    let cache = string_cache(backend.clone());
    cache
        .set(&ns, "A", || async { Ok::<_, CacheError>("cached".to_string()) })
        .await
        .unwrap();
    backend.fail_writes_for(&format!("{}:B", ns));

    let (found, err) = cache
        .get_and_set_batch_partial(&ns, &["A", "B", "C"], |ids| async move {
            Ok::<_, CacheError>(
                ids.into_iter()
                    .map(|id| (id, format!("fresh-{}", id)))
                    .collect::<HashMap<_, _>>(),
            )
        })
        .await;

    let err = err.expect("write of B must fail");
    let failed_key = format!("{}:B", ns);
    assert_eq!(err.failed_key(), Some(failed_key.as_str()));
    assert_eq!(found.get("A").map(String::as_str), Some("cached"));
    assert_eq!(found.get("B").map(String::as_str), Some("fresh-B"));
    assert_eq!(found.get("C").map(String::as_str), Some("fresh-C"));

    // C 在 B 之后，没有写入后端
    assert_eq!(cache.get(&ns, &"C").await, None);
}

/// 没有错误时两种接口返回相同的结果
#[tokio::test]
async fn test_partial_result_without_error() {
    let cache = string_cache(Arc::new(MemoryBackend::new(100)));
    let (found, err) = cache
        .get_and_set_batch_partial("n", &["A"], |_| async {
            Ok::<_, CacheError>(HashMap::from([("A", "a".to_string())]))
        })
        .await;
    assert!(err.is_none());
    assert_eq!(found, HashMap::from([("A", "a".to_string())]));
}
