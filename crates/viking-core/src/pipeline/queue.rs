//! Durable embedding queue bookkeeping.
//!
//! Messages are written to the object store before dispatch and removed once
//! indexed, so anything still under `pending/` after a crash is replayed on the
//! next start. Messages that exhaust their retries are moved to `dead/` and
//! stay counted as unprocessed.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, warn};
use viking_db::object::ObjectStore;

use super::msg::EmbeddingMsg;
use crate::errors::{VikingError, VikingResult};

/// Object-store directory holding messages awaiting indexing.
///
/// The leading `.` keeps it disjoint from account roots, whose ids cannot
/// contain dots.
pub const PENDING_DIR: &str = "/.system/queue/embedding/pending";

/// Object-store directory holding dead-lettered messages.
pub const DEAD_DIR: &str = "/.system/queue/embedding/dead";

// ============================================================================
// QueueStatus
// ============================================================================

/// Snapshot of queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    /// Enqueued and not yet finished (includes in-flight and retrying items).
    pub pending: usize,

    /// Successfully indexed (or skipped as stale) since start.
    pub processed: u64,

    /// Parked after exhausting retries.
    pub dead_lettered: usize,

    /// Failed attempts since start, including ones that later succeeded.
    pub errors: u64,
}

impl QueueStatus {
    /// Items that are not (yet) searchable: pending plus dead-lettered.
    pub fn unprocessed(&self) -> usize {
        self.pending + self.dead_lettered
    }
}

// ============================================================================
// DurableQueue
// ============================================================================

/// Persistence and counters for the shared embedding queue.
pub struct DurableQueue {
    store: Arc<dyn ObjectStore>,
    status: Mutex<QueueStatus>,
    changed: Notify,
}

impl std::fmt::Debug for DurableQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableQueue")
            .field("status", &self.status())
            .finish()
    }
}

impl DurableQueue {
    /// Create queue bookkeeping over `store`.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            status: Mutex::new(QueueStatus::default()),
            changed: Notify::new(),
        }
    }

    fn pending_path(id: &str) -> String {
        format!("{}/{}.json", PENDING_DIR, id)
    }

    fn dead_path(id: &str) -> String {
        format!("{}/{}.json", DEAD_DIR, id)
    }

    fn update(&self, f: impl FnOnce(&mut QueueStatus)) {
        match self.status.lock() {
            Ok(mut status) => f(&mut status),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
        self.changed.notify_waiters();
    }

    /// Current counters.
    pub fn status(&self) -> QueueStatus {
        match self.status.lock() {
            Ok(status) => *status,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Persist a message and count it as pending.
    pub async fn push(&self, msg: &EmbeddingMsg) -> VikingResult<()> {
        self.store
            .write(&Self::pending_path(&msg.id), &msg.to_bytes()?)
            .await?;
        self.update(|s| s.pending += 1);
        Ok(())
    }

    /// Load persisted pending messages and count them, plus existing dead
    /// letters. Call once at startup, before any [`push`](Self::push).
    pub async fn recover(&self) -> VikingResult<Vec<EmbeddingMsg>> {
        let mut messages = Vec::new();
        for entry in self.list_dir(PENDING_DIR).await? {
            if entry.is_dir {
                continue;
            }
            match self.store.read(&entry.path).await {
                Ok(bytes) => match EmbeddingMsg::from_bytes(&bytes) {
                    Ok(msg) => messages.push(msg),
                    Err(e) => warn!(path = %entry.path, "dropping unreadable queue entry: {}", e),
                },
                Err(e) => warn!(path = %entry.path, "failed to read queue entry: {}", e),
            }
        }
        messages.sort_by(|a, b| a.enqueued_at.cmp(&b.enqueued_at));

        let dead = self
            .list_dir(DEAD_DIR)
            .await?
            .into_iter()
            .filter(|e| !e.is_dir)
            .count();

        let recovered = messages.len();
        self.update(|s| {
            s.pending += recovered;
            s.dead_lettered += dead;
        });
        if recovered > 0 || dead > 0 {
            debug!(recovered, dead, "recovered embedding queue");
        }
        Ok(messages)
    }

    async fn list_dir(&self, dir: &str) -> VikingResult<Vec<viking_db::object::ObjectEntry>> {
        match self.store.list(dir).await {
            Ok(entries) => Ok(entries),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Mark a message done: drop its persisted copy and count it processed.
    pub async fn complete(&self, msg: &EmbeddingMsg) {
        if let Err(e) = self.store.remove(&Self::pending_path(&msg.id), false).await {
            if !e.is_not_found() {
                warn!(msg_id = %msg.id, "failed to remove queue entry: {}", e);
            }
        }
        self.update(|s| {
            s.pending = s.pending.saturating_sub(1);
            s.processed += 1;
        });
    }

    /// Count one failed attempt.
    pub fn record_error(&self) {
        self.update(|s| s.errors += 1);
    }

    /// Park a message that exhausted its retries.
    pub async fn dead_letter(&self, msg: &EmbeddingMsg, error: &VikingError) {
        let moved = self
            .store
            .rename(&Self::pending_path(&msg.id), &Self::dead_path(&msg.id))
            .await;
        if let Err(e) = moved {
            warn!(msg_id = %msg.id, "failed to move queue entry to dead letters: {}", e);
        }
        warn!(
            msg_id = %msg.id,
            uri = %msg.context.uri,
            account = %msg.context.account_id,
            "embedding dead-lettered: {}",
            error
        );
        self.update(|s| {
            s.pending = s.pending.saturating_sub(1);
            s.dead_lettered += 1;
        });
    }

    /// Forget a pending message without indexing it (e.g. the dispatcher was
    /// closed). Its persisted copy stays for replay.
    pub fn abandon(&self) {
        self.update(|s| s.pending = s.pending.saturating_sub(1));
    }

    /// Wait until nothing is pending or `timeout` elapses.
    ///
    /// Returns the unprocessed count at that moment. Never spins: it sleeps on
    /// a notification that every counter change fires.
    pub async fn wait_drained(&self, timeout: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // Register before reading the counters so a change in between is
            // not missed.
            notified.as_mut().enable();

            let status = self.status();
            if status.pending == 0 {
                return status.unprocessed();
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.status().unprocessed();
            }
        }
    }
}
