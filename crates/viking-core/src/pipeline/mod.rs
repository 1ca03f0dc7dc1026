//! Asynchronous embedding pipeline.
//!
//! Writers hand contexts to [`EmbeddingPipeline::enqueue_context`] and return
//! immediately. A pool of workers drains the shared queue, calls the embedding
//! provider, and upserts vectors keyed by context id. Provider failures are
//! retried with capped exponential backoff; exhausted messages are
//! dead-lettered. Writers never see indexing errors; they only observe them
//! through [`QueueStatus`] and [`EmbeddingPipeline::wait_processed`].
//!
//! Rewriting a node enqueues a new message under the same context id. Only
//! the newest message per context id may reach the index; older ones still
//! in flight are completed as superseded, whatever order the provider
//! answers in.
//!
//! ```text
//! ContextFs::write ──► converter ──► DurableQueue (object store) ──► mpsc
//!                                                                      │
//!                                     worker 1..N ◄────────────────────┘
//!                                        │  embed (provider) + retry/backoff
//!                                        ▼
//!                                   VectorIndexBackend::upsert
//! ```

mod converter;
mod msg;
mod queue;

pub use converter::EmbeddingMsgConverter;
pub use msg::EmbeddingMsg;
pub use queue::{DurableQueue, QueueStatus, DEAD_DIR, PENDING_DIR};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use viking_db::object::ObjectStore;
use viking_db::vector::{VectorId, VectorIndexBackend, VectorInsert};
use viking_model::EmbeddingProvider;

use crate::config::PipelineConfig;
use crate::context::Context;
use crate::errors::{VikingError, VikingResult};
use crate::uri::VikingUri;

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<EmbeddingMsg>>>;

/// Everything a worker needs.
struct WorkerContext {
    store: Arc<dyn ObjectStore>,
    index: Arc<dyn VectorIndexBackend>,
    provider: Arc<dyn EmbeddingProvider>,
    queue: Arc<DurableQueue>,
    generations: Arc<Generations>,
    config: PipelineConfig,
    cancel: CancellationToken,
}

/// Result of processing one message.
enum Outcome {
    Indexed,
    Stale,
    Superseded,
}

// ============================================================================
// Generations
// ============================================================================

/// Newest outstanding message for one context id.
#[derive(Debug)]
struct Generation {
    latest: String,
    outstanding: usize,
}

/// Per-context-id record of the newest enqueued message.
///
/// An entry lives while any message for its context id is outstanding, so
/// a slow older message always finds the newer id it lost to.
#[derive(Debug, Default)]
struct Generations {
    entries: tokio::sync::Mutex<HashMap<String, Generation>>,
}

impl Generations {
    /// Make `msg` the newest message for its context id.
    async fn register(&self, msg: &EmbeddingMsg) {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(msg.context.id.clone())
            .or_insert_with(|| Generation {
                latest: msg.id.clone(),
                outstanding: 0,
            });
        entry.latest = msg.id.clone();
        entry.outstanding += 1;
    }

    /// Forget `msg` once it has left the worker pool.
    async fn retire(&self, msg: &EmbeddingMsg) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&msg.context.id) {
            entry.outstanding = entry.outstanding.saturating_sub(1);
            if entry.outstanding == 0 {
                entries.remove(&msg.context.id);
            }
        }
    }

    async fn is_current(&self, msg: &EmbeddingMsg) -> bool {
        is_current(&*self.entries.lock().await, msg)
    }
}

fn is_current(entries: &HashMap<String, Generation>, msg: &EmbeddingMsg) -> bool {
    entries
        .get(&msg.context.id)
        .map(|entry| entry.latest == msg.id)
        .unwrap_or(true)
}

// ============================================================================
// EmbeddingPipeline
// ============================================================================

/// Durable queue plus bounded worker pool.
pub struct EmbeddingPipeline {
    index: Arc<dyn VectorIndexBackend>,
    queue: Arc<DurableQueue>,
    generations: Arc<Generations>,
    sender: mpsc::UnboundedSender<EmbeddingMsg>,
    cancel: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for EmbeddingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingPipeline")
            .field("status", &self.queue.status())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl EmbeddingPipeline {
    /// Start the pipeline: recover persisted messages and spawn
    /// `config.concurrency` workers.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn start(
        store: Arc<dyn ObjectStore>,
        index: Arc<dyn VectorIndexBackend>,
        provider: Arc<dyn EmbeddingProvider>,
        config: PipelineConfig,
    ) -> VikingResult<Self> {
        if config.concurrency == 0 || config.max_attempts == 0 {
            return Err(VikingError::config(
                "pipeline concurrency and maxAttempts must be positive",
                "Use the defaults (4 and 3)",
            ));
        }

        let queue = Arc::new(DurableQueue::new(store.clone()));
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver: SharedReceiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let cancel = CancellationToken::new();
        let generations = Arc::new(Generations::default());

        // Oldest first, so the newest persisted message per node wins.
        let recovered = queue.recover().await?;
        if !recovered.is_empty() {
            info!("Replaying {} pending embedding messages", recovered.len());
        }
        for msg in recovered {
            generations.register(&msg).await;
            if let Err(mpsc::error::SendError(msg)) = sender.send(msg) {
                generations.retire(&msg).await;
                queue.abandon();
            }
        }

        let worker_ctx = Arc::new(WorkerContext {
            store,
            index: index.clone(),
            provider,
            queue: queue.clone(),
            generations: generations.clone(),
            config: config.clone(),
            cancel: cancel.clone(),
        });

        let workers = (0..config.concurrency)
            .map(|n| {
                let ctx = worker_ctx.clone();
                let receiver = receiver.clone();
                tokio::spawn(async move { run_worker(n, ctx, receiver).await })
            })
            .collect();

        debug!(concurrency = config.concurrency, "embedding pipeline started");
        Ok(Self {
            index,
            queue,
            generations,
            sender,
            cancel,
            workers: Mutex::new(workers),
        })
    }

    /// Convert and enqueue a context. Contexts with no vectorizable text are
    /// skipped and `Ok(false)` is returned.
    pub async fn enqueue_context(&self, context: &Context) -> VikingResult<bool> {
        match EmbeddingMsgConverter::from_context(context) {
            Some(msg) => {
                self.enqueue(msg).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Persist and dispatch a message.
    pub async fn enqueue(&self, msg: EmbeddingMsg) -> VikingResult<()> {
        if self.cancel.is_cancelled() {
            return Err(VikingError::NotInitialized);
        }
        self.queue.push(&msg).await?;
        trace!(msg_id = %msg.id, uri = %msg.context.uri, "enqueued embedding");
        self.generations.register(&msg).await;
        if let Err(mpsc::error::SendError(msg)) = self.sender.send(msg) {
            // Persisted copy is replayed on next start.
            self.generations.retire(&msg).await;
            self.queue.abandon();
            return Err(VikingError::NotInitialized);
        }
        Ok(())
    }

    /// Record an access to an indexed node: bump `active_count` and refresh
    /// `updated_at` in its stored record.
    ///
    /// Returns the updated context, or `None` when the node has no vector
    /// yet. Serialized with worker upserts, so concurrent accesses are never
    /// lost and a re-index never rolls the count back.
    pub async fn record_activity(&self, context_id: &str) -> VikingResult<Option<Context>> {
        let _entries = self.generations.entries.lock().await;
        let Some(mut stored) = self.index.get(&VectorId::new(context_id)).await? else {
            return Ok(None);
        };
        let mut context = Context::from_record(stored.payload)?;
        context.update_activity();
        stored.payload = context.to_record()?;
        self.index.upsert(&[stored]).await?;
        trace!(uri = %context.uri, active_count = context.active_count, "recorded activity");
        Ok(Some(context))
    }

    /// Current queue counters.
    pub fn status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Block until the queue drains or `timeout` elapses; returns the number
    /// of unprocessed messages (pending plus dead-lettered).
    pub async fn wait_processed(&self, timeout: Duration) -> usize {
        self.queue.wait_drained(timeout).await
    }

    /// Stop the workers. Items already being processed finish first; queued
    /// items stay persisted and are replayed on the next start.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handles: Vec<JoinHandle<()>> = match self.workers.lock() {
            Ok(mut workers) => workers.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("embedding worker ended abnormally: {}", e);
            }
        }
        debug!("embedding pipeline stopped");
    }
}

impl Drop for EmbeddingPipeline {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ============================================================================
// Workers
// ============================================================================

async fn run_worker(n: usize, ctx: Arc<WorkerContext>, receiver: SharedReceiver) {
    trace!(worker = n, "embedding worker started");
    loop {
        let next = tokio::select! {
            _ = ctx.cancel.cancelled() => None,
            msg = async { receiver.lock().await.recv().await } => msg,
        };
        let Some(msg) = next else {
            break;
        };
        process_message(&ctx, msg).await;
    }
    trace!(worker = n, "embedding worker stopped");
}

async fn process_message(ctx: &WorkerContext, msg: EmbeddingMsg) {
    drive_message(ctx, &msg).await;
    ctx.generations.retire(&msg).await;
}

/// Run one message to completion: success, stale or superseded skip, or
/// dead letter.
async fn drive_message(ctx: &WorkerContext, msg: &EmbeddingMsg) {
    let mut attempt = 1;
    loop {
        match index_message(ctx, msg).await {
            Ok(Outcome::Indexed) => {
                trace!(msg_id = %msg.id, uri = %msg.context.uri, attempt, "indexed");
                ctx.queue.complete(msg).await;
                return;
            }
            Ok(Outcome::Stale) => {
                debug!(uri = %msg.context.uri, "node no longer exists, skipping embedding");
                ctx.queue.complete(msg).await;
                return;
            }
            Ok(Outcome::Superseded) => {
                debug!(msg_id = %msg.id, uri = %msg.context.uri, "superseded by a newer write");
                ctx.queue.complete(msg).await;
                return;
            }
            Err(e) => {
                ctx.queue.record_error();
                if attempt >= ctx.config.max_attempts {
                    ctx.queue.dead_letter(msg, &e).await;
                    return;
                }

                let delay = ctx.config.backoff_for(attempt);
                warn!(
                    uri = %msg.context.uri,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "embedding attempt failed, retrying: {}",
                    e
                );
                tokio::select! {
                    _ = ctx.cancel.cancelled() => {
                        // Left persisted for replay.
                        ctx.queue.abandon();
                        return;
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}

/// Embed and upsert a single message.
async fn index_message(ctx: &WorkerContext, msg: &EmbeddingMsg) -> VikingResult<Outcome> {
    let record = &msg.context;
    if !ctx.generations.is_current(msg).await {
        return Ok(Outcome::Superseded);
    }

    // A node removed while its message was queued must not be resurrected.
    let node_path = VikingUri::parse(&record.uri)
        .ok()
        .map(|uri| uri.physical_path(&record.account_id));
    if let Some(path) = &node_path {
        if !ctx.store.exists(path).await? {
            return Ok(Outcome::Stale);
        }
    }

    let vector = ctx
        .provider
        .embed_one(&msg.message)
        .await
        .map_err(|e| VikingError::provider(ctx.provider.model_id(), e.to_string()))?;

    {
        // Held across the upsert so a newer message cannot land in between.
        let entries = ctx.generations.entries.lock().await;
        if !is_current(&entries, msg) {
            return Ok(Outcome::Superseded);
        }

        // Activity recorded against the previous version carries over.
        let mut payload = record.clone();
        if let Some(previous) = ctx.index.get(&VectorId::new(record.id.clone())).await? {
            if let Ok(previous) = Context::from_record(previous.payload) {
                payload.active_count = payload.active_count.max(previous.active_count);
                payload.updated_at = payload.updated_at.max(previous.updated_at);
            }
        }

        let insert = VectorInsert::new(
            record.id.clone(),
            vector,
            record.account_id.clone(),
            record.uri.clone(),
        )
        .with_owner_space(record.owner_space.clone())
        .with_context_type(record.context_type.as_str())
        .with_level(record.level.as_u8())
        .with_payload(payload.to_record()?);
        ctx.index.upsert(&[insert]).await?;
    }

    // Removed or moved while the provider call was in flight.
    if let Some(path) = &node_path {
        if !ctx.store.exists(path).await? {
            ctx.index.delete(&[VectorId::new(record.id.clone())]).await?;
            return Ok(Outcome::Stale);
        }
    }
    Ok(Outcome::Indexed)
}
