//! Time-bounded, per-key message history.
//!
//! Each key owns an append-only sequence plus the time it was last appended
//! to. A cleanup pass drops every key whose last append is older than the
//! configured lifetime, discarding its whole sequence at once.
//!
//! All access goes through one mutex, so `add`, `elements` and cleanup are
//! mutually exclusive and `elements` always sees a consistent prefix.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

/// Default retention for a silent key.
pub const DEFAULT_LIFETIME: Duration = Duration::from_secs(60);

/// Shortest interval the eviction task will tick at.
pub const MIN_EVICTION_INTERVAL: Duration = Duration::from_millis(1);

/// Default cleanup interval: a third of the lifetime.
pub fn default_cleanup_interval(lifetime: Duration) -> Duration {
    lifetime / 3
}

struct History<V> {
    items: Vec<V>,
    touched: Instant,
}

fn push<K: Eq + Hash, V>(
    entries: &mut HashMap<K, History<V>>,
    key: K,
    value: V,
    now: Instant,
) -> &mut History<V> {
    let history = entries.entry(key).or_insert_with(|| History {
        items: Vec::new(),
        touched: now,
    });
    history.items.push(value);
    history.touched = now;
    history
}

/// Per-key ordered sequences that expire as a whole.
pub struct ExpiringStore<K, V> {
    lifetime: Duration,
    entries: Mutex<HashMap<K, History<V>>>,
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new(lifetime: Duration) -> Self {
        ExpiringStore {
            lifetime,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Append `value` to the sequence for `key` and refresh its touch time.
    pub fn add(&self, key: K, value: V) {
        self.add_at(key, value, Instant::now());
    }

    /// `add` with an explicit clock reading.
    pub fn add_at(&self, key: K, value: V, now: Instant) {
        let mut entries = self.entries.lock();
        push(&mut entries, key, value, now);
    }

    /// Snapshot of the sequence for `key`, in insertion order. Empty if absent.
    pub fn elements(&self, key: &K) -> Vec<V> {
        self.entries
            .lock()
            .get(key)
            .map(|h| h.items.clone())
            .unwrap_or_default()
    }

    /// Append and return the resulting snapshot under a single lock.
    pub fn add_and_snapshot(&self, key: K, value: V) -> Vec<V> {
        let mut entries = self.entries.lock();
        push(&mut entries, key, value, Instant::now()).items.clone()
    }

    /// Drop expired keys. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    /// `cleanup` with an explicit clock reading.
    pub fn cleanup_at(&self, now: Instant) -> usize {
        let lifetime = self.lifetime;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, h| now.saturating_duration_since(h.touched) <= lifetime);
        before - entries.len()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// All keys currently held, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        self.entries.lock().keys().cloned().collect()
    }
}

impl<K, V> ExpiringStore<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    /// Run `cleanup` every `interval` until `cancel` fires.
    ///
    /// Intervals below `MIN_EVICTION_INTERVAL` are raised to it.
    pub fn spawn_eviction(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let interval = interval.max(MIN_EVICTION_INTERVAL);
        tokio::spawn(
            async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // Skip the first tick (immediate execution)
                ticker.tick().await;

                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!("eviction stopped");
                            break;
                        }
                        _ = ticker.tick() => {
                            let evicted = self.cleanup();
                            if evicted > 0 {
                                debug!(evicted, remaining = self.len(), "evicted expired histories");
                            }
                        }
                    }
                }
            }
            .instrument(tracing::info_span!("store_eviction")),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
