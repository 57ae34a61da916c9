use std::sync::Arc;

use confbridge::Aggregator;
use confbridge::AggregatorConfig;
use confbridge::Backends;
use confbridge::ConfigFormat;
use confbridge::SourceSpec;
use parking_lot::Mutex;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::common::eventually;
use crate::common::MemoryKv;

fn kv_spec(path: &str) -> SourceSpec {
    serde_json::from_value(json!({
        "provider": "etcd",
        "properties": { "endpoint": "http://127.0.0.1:2379", "path": path },
        "config_type": "json"
    }))
    .unwrap()
}

#[tokio::test]
async fn sources_should_merge_and_stay_live() {
    let kv = MemoryKv::default();
    kv.put("/base", r#"{"db": {"host": "db.local", "port": 5432}, "x": 1}"#);
    kv.put("/override", r#"{"db": {"host": "db.prod"}, "x": 2, "y": 3}"#);
    let token = CancellationToken::new();
    let aggregator = Aggregator::new(
        token.clone(),
        AggregatorConfig::default(),
        Backends::new().with_remote_kv(Arc::new(kv.clone())),
    );
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = changes.clone();
    aggregator.set_hook(move |key, _| sink.lock().push(key.to_string()));

    aggregator.register_spec("base", &kv_spec("/base")).await.unwrap();
    aggregator.register_spec("override", &kv_spec("/override")).await.unwrap();

    assert_eq!(aggregator.get("x"), Some(json!(2)));
    assert_eq!(aggregator.get("y"), Some(json!(3)));
    assert_eq!(aggregator.get("db.host"), Some(json!("db.prod")));
    assert_eq!(aggregator.get("db.port"), Some(json!(5432)));
    assert!(changes.lock().is_empty());

    kv.put("/base", r#"{"db": {"host": "db.local", "port": 6432}, "x": 1}"#);
    eventually("base change to be aggregated", || {
        aggregator.get("db.port") == Some(json!(6432))
    })
    .await;

    assert_eq!(aggregator.get("db.host"), Some(json!("db.prod")));
    assert_eq!(*changes.lock(), vec!["base"]);

    let exported: serde_json::Value =
        serde_json::from_slice(&aggregator.export(ConfigFormat::Json).unwrap()).unwrap();
    assert_eq!(exported["db"]["port"], json!(6432));

    token.cancel();
}

#[tokio::test]
async fn invalid_registration_should_not_disturb_live_sources() {
    let kv = MemoryKv::default();
    kv.put("/app", r#"{"x": 1}"#);
    let aggregator = Aggregator::new(
        CancellationToken::new(),
        AggregatorConfig::default(),
        Backends::new().with_remote_kv(Arc::new(kv.clone())),
    );
    aggregator.register_spec("app", &kv_spec("/app")).await.unwrap();

    let missing_path: SourceSpec = serde_json::from_value(json!({
        "provider": "consul",
        "properties": { "endpoint": "127.0.0.1:8500" }
    }))
    .unwrap();
    assert!(aggregator.register_spec("bad", &missing_path).await.unwrap_err().is_config_error());

    let absent = kv_spec("/absent");
    assert!(aggregator.register_spec("absent", &absent).await.is_err());

    assert_eq!(aggregator.keys(), vec!["app"]);
    assert_eq!(aggregator.get("x"), Some(json!(1)));
}
