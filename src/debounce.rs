//! Keyed, cancellable delays on tokio timers.
//!
//! Scheduling work under a key aborts whatever is still waiting under that key, so only the last
//! request inside the delay window runs. Once the delay has elapsed the work is no longer pending
//! and runs to completion even if the same key is scheduled again.

use std::{
    collections::BTreeMap,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct Debouncer<K> {
    delay: Duration,
    pending: Arc<Mutex<BTreeMap<K, Pending>>>,
    generation: Arc<AtomicU64>,
}

impl<K> std::fmt::Debug for Debouncer<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.pending.lock().len())
            .finish()
    }
}

impl<K> Debouncer<K>
where
    K: Ord + Clone + Send + 'static,
{
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            pending: Arc::new(Mutex::new(BTreeMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `work` after the delay unless `key` is scheduled again or cancelled first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, key: K, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let delay = self.delay;
        let shared = self.pending.clone();
        let task_key = key.clone();
        // Held until the entry is in place so the task cannot look for it too early.
        let mut pending = self.pending.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = shared.lock();
                if pending
                    .get(&task_key)
                    .is_some_and(|entry| entry.generation == generation)
                {
                    pending.remove(&task_key);
                }
            }
            work.await;
        });
        if let Some(previous) = pending.insert(key, Pending { generation, handle }) {
            previous.handle.abort();
        }
    }

    /// Abort pending work for `key`. Returns whether anything was waiting.
    pub fn cancel(&self, key: &K) -> bool {
        match self.pending.lock().remove(key) {
            Some(previous) => {
                previous.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.lock().contains_key(key)
    }

    pub fn cancel_all(&self) {
        let mut pending = self.pending.lock();
        for (_, entry) in std::mem::take(&mut *pending) {
            entry.handle.abort();
        }
    }
}
