//! Bounded in-memory session cache.
//!
//! Holds at most `capacity` loaded sessions. Inserting a new key into a full
//! cache evicts the least recently used loaded one; sessions still loading
//! stay put, so the cache can briefly hold more. Concurrent requests for the same key
//! share a single load, and a failed load leaves nothing behind so the next
//! request retries.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{EventInfo, SessionData, SessionKey, SessionSource, validate_year};
use crate::error::SessionError;

type Slot = Arc<OnceCell<Arc<SessionData>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Entry {
    slot: Slot,
    last_used: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<SessionKey, Entry>,
    tick: u64,
    stats: CacheStats,
}

pub struct SessionCache {
    source: Arc<dyn SessionSource>,
    capacity: usize,
    state: Mutex<CacheState>,
}

impl SessionCache {
    /// A capacity of zero is treated as one.
    pub fn new(source: Arc<dyn SessionSource>, capacity: usize) -> Self {
        Self {
            source,
            capacity: capacity.max(1),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Returns the session for `key`, loading it from the source on a miss.
    pub async fn get(&self, key: SessionKey) -> Result<Arc<SessionData>, SessionError> {
        key.validate()?;
        let slot = self.slot_for(key);

        let result = slot
            .get_or_try_init(|| async {
                info!(key = %key, "Loading session");
                self.source.load_session(&key).await.map(Arc::new)
            })
            .await;

        match result {
            Ok(data) => Ok(Arc::clone(data)),
            Err(e) => {
                self.forget_failed(key, &slot);
                Err(e)
            }
        }
    }

    /// Season schedule, straight from the source.
    pub async fn schedule(&self, year: i32) -> Result<Vec<EventInfo>, SessionError> {
        validate_year(year)?;
        self.source.load_schedule(year).await
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().stats
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Finds or creates the slot for `key` and marks it as most recently used.
    fn slot_for(&self, key: SessionKey) -> Slot {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.tick += 1;
        let tick = state.tick;

        if let Some(entry) = state.entries.get_mut(&key) {
            entry.last_used = tick;
            if entry.slot.initialized() {
                state.stats.hits += 1;
            } else {
                state.stats.misses += 1;
            }
            return Arc::clone(&entry.slot);
        }

        state.stats.misses += 1;
        // loads in flight are never evicted; the cache may overshoot until they finish
        while state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .filter(|(_, e)| e.slot.initialized())
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| *k);
            let Some(oldest) = oldest else {
                debug!(len = state.entries.len(), "Cache over capacity while loading");
                break;
            };
            state.entries.remove(&oldest);
            state.stats.evictions += 1;
            debug!(evicted = %oldest, "Session evicted from cache");
        }

        let slot: Slot = Arc::new(OnceCell::new());
        state.entries.insert(
            key,
            Entry {
                slot: Arc::clone(&slot),
                last_used: tick,
            },
        );
        slot
    }

    fn forget_failed(&self, key: SessionKey, slot: &Slot) {
        let mut state = self.state.lock();
        let stale = state
            .entries
            .get(&key)
            .is_some_and(|e| Arc::ptr_eq(&e.slot, slot) && !e.slot.initialized());
        if stale {
            state.entries.remove(&key);
        }
    }
}
