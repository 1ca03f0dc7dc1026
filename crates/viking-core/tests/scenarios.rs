//! Tenant backfill, freshness, and cascading removal scenarios.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{alice, memory_engine, DRAIN};
use md5::{Digest, Md5};
use tokio::sync::Notify;
use viking_core::{
    Context, EmbeddingMsgConverter, LsRequest, VikingConfig, VikingEngine, VikingError,
};
use viking_db::object::MemoryObjectStore;
use viking_db::vector::{SimpleVectorIndex, VectorIndexBackend, VectorMetric};
use viking_model::{EmbeddingProvider, ModelResult};

/// Context with tenant fields blanked, as a legacy writer would produce.
fn blanked(uri: &str) -> Context {
    let mut context = Context::new(uri, Some(alice()));
    context.account_id.clear();
    context.owner_space.clear();
    context.abstract_text = "some text".to_string();
    context
}

#[test]
fn scenario_a_user_memory_backfills_user_space() {
    let msg = EmbeddingMsgConverter::from_context(&blanked("viking://user/memories/preferences/me.md"))
        .expect("non-empty text");
    assert_eq!(msg.context.account_id, "acme");
    assert_eq!(msg.context.owner_space, "alice");
}

#[test]
fn scenario_b_agent_memory_backfills_agent_space() {
    let msg = EmbeddingMsgConverter::from_context(&blanked("viking://agent/memories/cases/me.md"))
        .expect("non-empty text");
    let digest = hex::encode(Md5::digest(b"alicehelper"));
    assert_eq!(msg.context.owner_space, &digest[..12]);
    assert_eq!(msg.context.account_id, "acme");
}

#[test]
fn scenario_c_resource_backfills_shared_space() {
    let msg = EmbeddingMsgConverter::from_context(&blanked("viking://resources/doc.md"))
        .expect("non-empty text");
    assert_eq!(msg.context.owner_space, "");
    assert_eq!(msg.context.account_id, "acme");
}

/// Provider whose calls never finish until released.
#[derive(Debug)]
struct GatedProvider {
    gate: Arc<Notify>,
}

#[async_trait]
impl EmbeddingProvider for GatedProvider {
    async fn embed(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        self.gate.notified().await;
        Ok(texts.iter().map(|_| vec![1.0; 8]).collect())
    }

    fn dimension(&self) -> usize {
        8
    }

    fn model_id(&self) -> &str {
        "gated"
    }
}

#[tokio::test]
async fn scenario_d_zero_timeout_returns_immediately() {
    let provider = Arc::new(GatedProvider {
        gate: Arc::new(Notify::new()),
    });
    let engine = VikingEngine::from_parts(
        VikingConfig::default_for_testing(),
        Arc::new(MemoryObjectStore::new()),
        Arc::new(SimpleVectorIndex::in_memory(8, VectorMetric::Cosine)),
        provider.clone(),
        None,
    )
    .await
    .unwrap();

    let me = alice();
    engine
        .service()
        .write("viking://resources/a.md", "alpha", &me)
        .await
        .unwrap();
    engine
        .service()
        .write("viking://resources/b.md", "beta", &me)
        .await
        .unwrap();

    let remaining = tokio::time::timeout(
        Duration::from_secs(1),
        engine.wait_processed(Duration::ZERO),
    )
    .await
    .expect("wait_processed(0) must not block");
    assert!(remaining > 0);

    // A short timeout reports partial progress rather than failing.
    let remaining = engine.wait_processed(Duration::from_millis(20)).await;
    assert!(remaining > 0);

    // Releasing the provider lets the queue drain.
    for _ in 0..2 {
        provider.gate.notify_one();
    }
    let drained = tokio::time::timeout(DRAIN, async {
        loop {
            provider.gate.notify_waiters();
            if engine.wait_processed(Duration::from_millis(50)).await == 0 {
                break;
            }
        }
    })
    .await;
    assert!(drained.is_ok());
    assert_eq!(engine.queue_status().processed, 2);
}

#[tokio::test]
async fn scenario_e_remove_requires_recursive_and_cascades() {
    let engine = memory_engine().await;
    let fs = engine.service();
    let me = alice();

    fs.write("viking://resources/proj/a.md", "alpha document", &me)
        .await
        .unwrap();
    fs.write("viking://resources/proj/sub/b.md", "beta document", &me)
        .await
        .unwrap();
    fs.write_abstract("viking://resources/proj", "project digest", &me)
        .await
        .unwrap();
    fs.write("viking://resources/keep.md", "unrelated document", &me)
        .await
        .unwrap();
    assert_eq!(engine.wait_processed(DRAIN).await, 0);
    assert_eq!(engine.vector_index().len().await.unwrap(), 4);

    let err = fs.rm("viking://resources/proj", false, &me).await.unwrap_err();
    assert!(matches!(err, VikingError::NotEmpty(ref uri) if uri == "viking://resources/proj"));
    assert_eq!(
        fs.read("viking://resources/proj/a.md", &me, 0, -1).await.unwrap(),
        "alpha document"
    );

    let removed = fs.rm("viking://resources/proj", true, &me).await.unwrap();
    assert_eq!(removed, 3);
    assert!(matches!(
        fs.stat("viking://resources/proj/sub/b.md", &me).await,
        Err(VikingError::NotFound(_))
    ));
    let listing = fs
        .ls("viking://resources", &me, &LsRequest { simple: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(listing.uris(), vec!["viking://resources/keep.md"]);

    assert_eq!(engine.vector_index().len().await.unwrap(), 1);
    let hits = fs.find("alpha document", &me, None, None).await.unwrap();
    assert!(hits
        .merged()
        .iter()
        .all(|m| !m.uri.starts_with("viking://resources/proj")));
}

#[tokio::test]
async fn test_removed_node_is_not_resurrected_by_queued_message() {
    let engine = memory_engine().await;
    let fs = engine.service();
    let me = alice();

    fs.write("viking://resources/tmp.md", "short lived", &me)
        .await
        .unwrap();
    fs.rm("viking://resources/tmp.md", false, &me).await.unwrap();

    assert_eq!(engine.wait_processed(DRAIN).await, 0);
    assert!(engine.vector_index().is_empty().await.unwrap());
}
