//! Local backends: state and queued embeddings survive a restart.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{alice, DRAIN};
use tempfile::TempDir;
use viking_core::{LsRequest, VikingConfig, VikingEngine};
use viking_db::object::{open_object_store, ObjectStore};
use viking_db::vector::open_vector_index;
use viking_model::{EmbeddingProvider, ModelError, ModelResult};

fn local_config(dir: &TempDir) -> VikingConfig {
    let yaml = format!(
        r#"
storage:
  backend: local
  path: {root}/objects
vector:
  backend: simple
  path: {root}/vectors
embedding:
  dimension: 32
pipeline:
  concurrency: 2
  maxAttempts: 2
  initialBackoffMs: 1
  maxBackoffMs: 2
"#,
        root = dir.path().display()
    );
    VikingConfig::from_yaml(&yaml).unwrap()
}

/// Always fails, so messages stay queued.
#[derive(Debug)]
struct DownProvider;

#[async_trait]
impl EmbeddingProvider for DownProvider {
    async fn embed(&self, _texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(ModelError::embedding_failed("down", "unreachable"))
    }

    fn dimension(&self) -> usize {
        32
    }

    fn model_id(&self) -> &str {
        "down"
    }
}

#[tokio::test]
async fn test_content_and_vectors_persist() {
    let dir = TempDir::new().unwrap();
    let config = local_config(&dir);
    let me = alice();

    {
        let engine = VikingEngine::from_config(&config).await.unwrap();
        engine
            .service()
            .write("viking://resources/kept.md", "persistent knowledge", &me)
            .await
            .unwrap();
        engine.shutdown(DRAIN).await.unwrap();
    }

    let engine = VikingEngine::from_config(&config).await.unwrap();
    let fs = engine.service();
    let listing = fs
        .ls("viking://resources", &me, &LsRequest { simple: true, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(listing.uris(), vec!["viking://resources/kept.md"]);

    let hits = fs.find("persistent knowledge", &me, Some(1), None).await.unwrap();
    assert_eq!(hits.resources[0].uri, "viking://resources/kept.md");
}

#[tokio::test]
async fn test_pending_messages_replay_after_restart() {
    let dir = TempDir::new().unwrap();
    let config = local_config(&dir);
    let me = alice();

    {
        let store = open_object_store(&config.storage.to_object_store_config())
            .await
            .unwrap();
        let index = open_vector_index(&config.vector.to_index_config(32)).await.unwrap();
        let engine = VikingEngine::from_parts(
            config.clone(),
            store.clone(),
            index,
            Arc::new(DownProvider),
            None,
        )
        .await
        .unwrap();
        engine
            .service()
            .write("viking://resources/late.md", "indexed after restart", &me)
            .await
            .unwrap();
        assert_eq!(engine.wait_processed(Duration::ZERO).await, 1);
        let pending = store
            .list(viking_core::pipeline::PENDING_DIR)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        // Dropped without draining; the persisted message stays behind.
    }

    let engine = VikingEngine::from_config(&config).await.unwrap();
    assert_eq!(engine.wait_processed(DRAIN).await, 0);
    assert_eq!(engine.queue_status().processed, 1);

    let hits = engine
        .service()
        .find("indexed after restart", &me, Some(1), None)
        .await
        .unwrap();
    assert_eq!(hits.resources[0].uri, "viking://resources/late.md");
}
