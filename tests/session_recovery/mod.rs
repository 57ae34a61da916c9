use std::sync::Arc;
use std::time::Duration;

use confbridge::Aggregator;
use confbridge::AggregatorConfig;
use confbridge::Backends;
use confbridge::SourceSpec;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::common::eventually;
use crate::common::MemoryCoordination;

const PATH: &str = "/apps/billing";

fn zk_spec() -> SourceSpec {
    serde_json::from_value(json!({
        "provider": "zookeeper",
        "properties": {
            "endpoint": "zk1:2181,zk2:2181",
            "path": PATH,
            "timeout": "3s"
        },
        "config_type": "yaml"
    }))
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn aggregate_should_follow_node_across_session_expiry() {
    let zk = MemoryCoordination::default();
    let aggregator = Aggregator::new(
        CancellationToken::new(),
        AggregatorConfig::default(),
        Backends::new().with_session(Arc::new(zk.clone())),
    );

    // Registered before the node exists.
    aggregator.register_spec("billing", &zk_spec()).await.unwrap();
    assert!(aggregator.all().is_empty());

    // Let the adapter arm its first watch.
    tokio::time::sleep(Duration::from_millis(50)).await;
    zk.write(PATH, "rate: 10\n", true);
    eventually("first write to be aggregated", || {
        aggregator.get("rate") == Some(json!(10))
    })
    .await;

    zk.expire().await;
    zk.write(PATH, "rate: 12\ncurrency: EUR\n", false);
    eventually("post-reconnect fetch to be aggregated", || {
        aggregator.get("rate") == Some(json!(12))
    })
    .await;

    assert_eq!(zk.connects(), 2);
    assert_eq!(aggregator.get("currency"), Some(json!("EUR")));

    zk.write(PATH, "rate: 15\ncurrency: EUR\n", true);
    eventually("watch on the new session to fire", || {
        aggregator.get("rate") == Some(json!(15))
    })
    .await;
}
