//! End-to-end behavior as seen by a link lookup handler: pick a backend for
//! the request, read `link:<slug>` with metadata, record the access.

use serde_json::{json, Value};
use sinkkv::backend::{BackendSelector, RequestContext};
use sinkkv::config::StorageConfig;
use sinkkv::kv::{link_key, KvValue, ListOptions, PutOptions, ValueType};
use sinkkv::storage::AccessEvent;
use sinkkv::SharedStorage;
use tempfile::TempDir;

/// Merges metadata and link the way the lookup endpoint presents them.
fn merged(metadata: Option<Value>, link: Value) -> Value {
    let mut out = metadata.unwrap_or_else(|| json!({}));
    if let (Some(out), Some(link)) = (out.as_object_mut(), link.as_object()) {
        for (k, v) in link {
            out.insert(k.clone(), v.clone());
        }
    }
    out
}

#[tokio::test]
async fn test_lookup_lifecycle() {
    let tmp = TempDir::new().unwrap();
    let storage = SharedStorage::new(StorageConfig::with_data_dir(tmp.path()));
    let selector = BackendSelector::new(storage.clone());
    let ctx = RequestContext::new();

    let kv = selector.select(&ctx).await.unwrap();
    let key = link_key("abc");

    kv.put(
        &key,
        r#"{"url":"https://example.com"}"#,
        PutOptions::new().metadata(json!({"slug": "abc"})),
    )
    .await
    .unwrap();

    let found = kv.get_with_metadata(&key, ValueType::Json).await.unwrap();
    let link = found.value.and_then(KvValue::into_json).unwrap();
    assert_eq!(
        merged(found.metadata, link),
        json!({"slug": "abc", "url": "https://example.com"})
    );

    // Record the access without blocking the response
    let logger = storage.access_logger().await.unwrap();
    let mut event = AccessEvent::new("abc");
    event.browser = Some("Firefox".into());
    logger.log_access_detached(event).await.unwrap();

    // Expire the link in place
    kv.put(
        &key,
        r#"{"url":"https://example.com"}"#,
        PutOptions::new().expiration_ttl(0),
    )
    .await
    .unwrap();
    assert_eq!(kv.get(&key, ValueType::Json).await.unwrap(), None);
    let gone = kv.get_with_metadata(&key, ValueType::Json).await.unwrap();
    assert!(gone.value.is_none() && gone.metadata.is_none());

    // History outlives the link
    let history = logger.get_analytics_async("abc".into(), 100).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].browser.as_deref(), Some("Firefox"));
}

#[tokio::test]
async fn test_listing_across_requests() {
    let tmp = TempDir::new().unwrap();
    let selector = BackendSelector::new(SharedStorage::new(StorageConfig::with_data_dir(
        tmp.path(),
    )));

    let kv = selector.select(&RequestContext::new()).await.unwrap();
    for slug in ["a", "b", "c"] {
        kv.put(&link_key(slug), "{}", PutOptions::new()).await.unwrap();
    }
    kv.put("settings:theme", "dark", PutOptions::new())
        .await
        .unwrap();
    kv.put(&link_key("old"), "{}", PutOptions::new().expiration(1))
        .await
        .unwrap();

    // A second request sees the same data through a fresh selection
    let kv = selector.select(&RequestContext::new()).await.unwrap();
    let listed = kv.list(ListOptions::new().prefix("link:")).await.unwrap();
    let names: Vec<&str> = listed.keys.iter().map(|k| k.name.as_str()).collect();
    assert_eq!(names, vec!["link:c", "link:b", "link:a"]);
    assert!(listed.list_complete);
}

#[tokio::test]
async fn test_data_survives_restart() {
    let tmp = TempDir::new().unwrap();

    {
        let storage = SharedStorage::new(StorageConfig::with_data_dir(tmp.path()));
        let kv = BackendSelector::new(storage)
            .select(&RequestContext::new())
            .await
            .unwrap();
        kv.put(&link_key("keep"), "payload", PutOptions::new())
            .await
            .unwrap();
    }

    let storage = SharedStorage::new(StorageConfig::with_data_dir(tmp.path()));
    let kv = BackendSelector::new(storage)
        .select(&RequestContext::new())
        .await
        .unwrap();
    assert_eq!(
        kv.get(&link_key("keep"), ValueType::Text).await.unwrap(),
        Some(KvValue::Text("payload".into()))
    );
}
