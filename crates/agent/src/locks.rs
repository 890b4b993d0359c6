//! Per-user serialization.
//!
//! Processing for one user must never overlap: a turn reads, mutates, and
//! persists the conversation record, then spends real time pacing message
//! sends. The lock keys critical sections by user id; queued work for one
//! key drains in arrival order while other keys proceed independently.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

struct KeyEntry {
    mutex: Arc<Mutex<()>>,
    /// Holders plus waiters. The map entry is dropped when this reaches
    /// zero, so idle keys cost no memory.
    pending: usize,
}

/// Mutual exclusion keyed by an arbitrary string.
#[derive(Default)]
pub struct KeyedSerialLock {
    entries: Mutex<HashMap<String, KeyEntry>>,
}

impl KeyedSerialLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` while holding the key's lock.
    ///
    /// Actions for the same key run one at a time, FIFO (tokio's mutex queue
    /// is fair). The lock is released when the action finishes, whether it
    /// succeeded or returned an error, so queued actions always proceed.
    pub async fn with_lock<F, Fut, T>(&self, key: &str, action: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mutex = {
            let mut entries = self.entries.lock().await;
            let entry = entries
                .entry(key.to_owned())
                .or_insert_with(|| KeyEntry { mutex: Arc::new(Mutex::new(())), pending: 0 });
            entry.pending += 1;
            Arc::clone(&entry.mutex)
        };

        let guard = mutex.lock().await;
        let output = action().await;
        drop(guard);

        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(key) {
            entry.pending -= 1;
            if entry.pending == 0 {
                entries.remove(key);
            }
        }

        output
    }

    /// Number of keys with live queues. Test hook for the memory bound.
    pub async fn key_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}
