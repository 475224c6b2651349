//! Read-through cache for task reads.
//!
//! Holds two independent kinds of entry: the full newest-first list, and
//! one entry per task id. Any write clears *all* of them at once.
//!
//! Populating is guarded by a generation number. A reader takes a
//! [`Generation`] before going to the store and hands it back when it fills
//! the cache; if an eviction happened in between, the fill is dropped. This
//! keeps a slow read from re-inserting data that a concurrent write has
//! already superseded. Two concurrent fills under the same generation are
//! harmless: both carry the same store state, and the last one wins.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Serialize;
use taskpulse_proto::task::{Task, TaskId};

/// Eviction epoch observed by a reader before it reads through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// Cumulative cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to go to the store.
    pub misses: u64,
    /// Whole-cache evictions.
    pub evictions: u64,
}

#[derive(Default)]
struct CacheState {
    generation: u64,
    list: Option<Vec<Task>>,
    by_id: HashMap<TaskId, Task>,
}

/// Whole-cache-eviction task cache.
///
/// Thread-safe via a [`parking_lot::RwLock`]; no lock is held across an
/// `.await`.
#[derive(Default)]
pub struct TaskCache {
    state: RwLock<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl TaskCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current generation; take it before reading through to the store.
    #[must_use]
    pub fn generation(&self) -> Generation {
        Generation(self.state.read().generation)
    }

    /// Looks up a single task.
    pub fn get(&self, id: TaskId) -> Option<Task> {
        let found = self.state.read().by_id.get(&id).cloned();
        self.record_lookup(found.is_some());
        found
    }

    /// Looks up the full task list.
    pub fn list(&self) -> Option<Vec<Task>> {
        let found = self.state.read().list.clone();
        self.record_lookup(found.is_some());
        found
    }

    /// Stores a single task read under `generation`.
    ///
    /// Returns `false` (and stores nothing) if the cache was evicted since.
    pub fn put(&self, generation: Generation, task: Task) -> bool {
        let mut state = self.state.write();
        if state.generation != generation.0 {
            return false;
        }
        state.by_id.insert(task.id, task);
        true
    }

    /// Stores the full list read under `generation`.
    ///
    /// Returns `false` (and stores nothing) if the cache was evicted since.
    pub fn put_list(&self, generation: Generation, tasks: Vec<Task>) -> bool {
        let mut state = self.state.write();
        if state.generation != generation.0 {
            return false;
        }
        state.list = Some(tasks);
        true
    }

    /// Drops every entry and starts a new generation.
    pub fn invalidate_all(&self) {
        let mut state = self.state.write();
        state.generation = state.generation.wrapping_add(1);
        state.list = None;
        state.by_id.clear();
        drop(state);
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of per-id entries currently held.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.state.read().by_id.len()
    }

    /// Whether the full list is currently cached.
    #[must_use]
    pub fn has_list(&self) -> bool {
        self.state.read().list.is_some()
    }

    /// Snapshot of the hit/miss/eviction counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    fn record_lookup(&self, hit: bool) {
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }
}
