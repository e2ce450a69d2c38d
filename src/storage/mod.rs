pub mod envelope;
pub mod tier;

pub use envelope::Envelope;
pub use tier::{EmbeddedTier, FileTier, MemoryTier, StorageError, StorageTier, TierKind};

use crate::constants::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// A committed mutation, surfaced to subscribers and queued for
/// replication to the non-active tiers.
#[derive(Debug, Clone)]
pub struct StorageChange {
    pub key: String,
    pub old: Option<serde_json::Value>,
    pub new: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
struct SyncOp {
    key: String,
    /// None replicates a removal
    value: Option<String>,
}

/// Uniform get/set/remove/clear over a ranked chain of backends.
///
/// The active tier is chosen by probing at init. Operations retry against
/// the active tier up to a fixed budget, then fall through the remaining
/// tiers; the memory tier at the end of the chain cannot fail, so callers
/// never see an error — the worst case is "operation not durable".
/// Committed writes are queued and replicated to the other available tiers
/// on a fixed flush interval.
pub struct StorageManager {
    tiers: Vec<Arc<dyn StorageTier>>,
    active: AtomicUsize,
    queue: Mutex<VecDeque<SyncOp>>,
    changes: broadcast::Sender<StorageChange>,
}

impl StorageManager {
    pub fn new(tiers: Vec<Arc<dyn StorageTier>>) -> Self {
        let (changes, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tiers,
            active: AtomicUsize::new(0),
            queue: Mutex::new(VecDeque::new()),
            changes,
        }
    }

    /// The standard four-tier chain for a namespace, ranked persistent →
    /// session → embedded → memory.
    pub fn default_tiers(namespace: &str) -> Vec<Arc<dyn StorageTier>> {
        let mut tiers: Vec<Arc<dyn StorageTier>> = Vec::new();
        if let Some(persistent) = FileTier::persistent(namespace) {
            tiers.push(Arc::new(persistent));
        }
        tiers.push(Arc::new(FileTier::session(namespace)));
        if let Some(embedded) = EmbeddedTier::in_dir(namespace) {
            tiers.push(Arc::new(embedded));
        }
        tiers.push(Arc::new(MemoryTier::new()));
        tiers
    }

    /// Probe the chain and activate the first available tier. Falls back to
    /// in-memory-only without raising when nothing else is usable.
    pub fn select_active(&self) {
        for (index, tier) in self.tiers.iter().enumerate() {
            if tier.available() {
                debug!("storage tier selected: {:?}", tier.kind());
                self.active.store(index, Ordering::SeqCst);
                return;
            }
        }
        // The chain should always end in a memory tier; degrade to the last
        // entry regardless so operations keep succeeding in-process.
        warn!("no storage tier available, state will not persist");
        self.active
            .store(self.tiers.len().saturating_sub(1), Ordering::SeqCst);
    }

    pub fn active_kind(&self) -> Option<TierKind> {
        self.tiers
            .get(self.active.load(Ordering::SeqCst))
            .map(|tier| tier.kind())
    }

    pub fn is_durable(&self) -> bool {
        !matches!(self.active_kind(), Some(TierKind::Memory) | None)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<SyncOp>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tiers from the active one onward, ranked.
    fn fallback_chain(&self) -> impl Iterator<Item = &Arc<dyn StorageTier>> {
        let start = self.active.load(Ordering::SeqCst).min(self.tiers.len());
        self.tiers[start..].iter()
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        for tier in self.fallback_chain() {
            if !tier.available() {
                continue;
            }
            for attempt in 0..=STORAGE_RETRY_BUDGET {
                match tier.get(key).await {
                    Ok(Some(text)) => return Envelope::decode(&text),
                    Ok(None) => return None,
                    Err(err) => {
                        debug!(
                            "read of '{key}' failed on {:?} (attempt {attempt}): {err}",
                            tier.kind()
                        );
                    }
                }
            }
            warn!(
                "read of '{key}' exhausted retries on {:?}, trying next tier",
                tier.kind()
            );
        }
        None
    }

    pub async fn set(&self, key: &str, value: serde_json::Value) {
        let old = self.get(key).await;
        let text = match Envelope::wrap(value.clone()).encode() {
            Ok(text) => text,
            Err(err) => {
                warn!("could not encode value for '{key}': {err}");
                return;
            }
        };

        if self.write_with_fallback(key, Some(&text)).await {
            self.lock_queue().push_back(SyncOp {
                key: key.to_string(),
                value: Some(text),
            });
            let _ = self.changes.send(StorageChange {
                key: key.to_string(),
                old,
                new: Some(value),
            });
        } else {
            warn!("write of '{key}' failed on every tier, value not durable");
        }
    }

    pub async fn remove(&self, key: &str) {
        let old = self.get(key).await;
        if self.write_with_fallback(key, None).await {
            self.lock_queue().push_back(SyncOp {
                key: key.to_string(),
                value: None,
            });
            let _ = self.changes.send(StorageChange {
                key: key.to_string(),
                old,
                new: None,
            });
        }
    }

    /// Best-effort clear of every available tier; also empties the
    /// replication queue since queued writes are now stale.
    pub async fn clear(&self) {
        self.lock_queue().clear();
        for tier in &self.tiers {
            if tier.available() {
                if let Err(err) = tier.clear().await {
                    debug!("clear failed on {:?}: {err}", tier.kind());
                }
            }
        }
    }

    async fn write_with_fallback(&self, key: &str, value: Option<&str>) -> bool {
        for tier in self.fallback_chain() {
            if !tier.available() {
                continue;
            }
            for attempt in 0..=STORAGE_RETRY_BUDGET {
                let result = match value {
                    Some(text) => tier.set(key, text).await,
                    None => tier.remove(key).await,
                };
                match result {
                    Ok(()) => return true,
                    Err(err) => {
                        debug!(
                            "write of '{key}' failed on {:?} (attempt {attempt}): {err}",
                            tier.kind()
                        );
                    }
                }
            }
            warn!(
                "write of '{key}' exhausted retries on {:?}, trying next tier",
                tier.kind()
            );
        }
        false
    }

    /// Drain the replication queue into every available tier other than the
    /// active one. Driven by a single interval task; one flush at a time.
    pub async fn flush_replication(&self) {
        let ops: Vec<SyncOp> = self.lock_queue().drain(..).collect();
        if ops.is_empty() {
            return;
        }
        let active = self.active.load(Ordering::SeqCst);
        for op in ops {
            for (index, tier) in self.tiers.iter().enumerate() {
                if index == active || !tier.available() {
                    continue;
                }
                let result = match &op.value {
                    Some(text) => tier.set(&op.key, text).await,
                    None => tier.remove(&op.key).await,
                };
                if let Err(err) = result {
                    debug!(
                        "replication of '{}' to {:?} failed: {err}",
                        op.key,
                        tier.kind()
                    );
                }
            }
        }
    }
}
