use std::hash::Hash;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;
use tracing::trace;

/// Number of keys the queue is sized for by [`DedupQueue::new`].
pub const DEFAULT_CAPACITY: usize = 64;

/// Key de-duplicating queue with peek retrieval.
///
/// Holds at most one element per key, where the key is derived from the element by the extractor
/// supplied at construction. Elements are served in the order their keys were first offered.
/// Offering an element whose key is already present replaces the stored element without moving
/// it.
///
/// Retrieval ([`try_take`](Self::try_take), [`take`](Self::take), [`poll`](Self::poll)) returns a
/// clone of the earliest element and leaves it in the queue. Use [`remove`](Self::remove) or
/// [`remove_by_key`](Self::remove_by_key) once the element has been dealt with.
pub struct DedupQueue<X, K, E>
where
    X: Fn(&E) -> K,
    K: Eq + Hash,
{
    extractor: X,
    entries: Mutex<IndexMap<K, E>>,
    offered: Notify,
}

impl<X, K, E> DedupQueue<X, K, E>
where
    X: Fn(&E) -> K,
    K: Eq + Hash,
    E: Clone,
{
    /// Create a new queue for the provided key extractor, sized for [`DEFAULT_CAPACITY`] keys.
    pub fn new(extractor: X) -> Self {
        Self::with_capacity(extractor, DEFAULT_CAPACITY)
    }

    /// Create a new queue for the provided key extractor, sized for `capacity` keys.
    pub fn with_capacity(extractor: X, capacity: usize) -> Self {
        Self {
            extractor,
            entries: Mutex::new(IndexMap::with_capacity(capacity)),
            offered: Notify::new(),
        }
    }

    /// Return the number of distinct keys in the queue.
    pub fn size(&self) -> usize {
        self.entries.lock().len()
    }

    /// Alias for [`size`](Self::size).
    pub fn len(&self) -> usize {
        self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Return true if an element is stored for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Add `element` to the queue, replacing in place any element with the same key.
    ///
    /// Every retriever waiting in [`take`](Self::take) or [`poll`](Self::poll) is woken.
    pub fn offer(&self, element: E) {
        let key = (self.extractor)(&element);
        let (position, replaced) = self.entries.lock().insert_full(key, element);
        if replaced.is_some() {
            trace!(position, "replaced queued element");
        } else {
            trace!(position, "appended element");
        }
        // Retrieval doesn't consume, so every waiter can make progress.
        self.offered.notify_waiters();
    }

    /// Remove the element stored for `key`. Returns false if there was none.
    pub fn remove_by_key(&self, key: &K) -> bool {
        let removed = self.entries.lock().shift_remove(key).is_some();
        trace!(removed, "remove by key");
        removed
    }

    /// Remove the element stored under the key of `element`. Returns false if there was none.
    pub fn remove(&self, element: &E) -> bool {
        let key = (self.extractor)(element);
        self.remove_by_key(&key)
    }

    /// Remove the element stored under the key of `element`, but only if it is still equal to
    /// `element`. Returns false if the key is absent or was replaced by a different element since
    /// it was taken, in which case the newer element stays queued.
    pub fn remove_matching(&self, element: &E) -> bool
    where
        E: PartialEq,
    {
        let key = (self.extractor)(element);
        let mut entries = self.entries.lock();
        let unchanged = entries.get(&key).is_some_and(|stored| stored == element);
        let removed = unchanged && entries.shift_remove(&key).is_some();
        trace!(removed, "remove matching element");
        removed
    }

    /// Return the earliest element, or None if the queue is empty. The element stays queued.
    pub fn try_take(&self) -> Option<E> {
        self.entries
            .lock()
            .first()
            .map(|(_key, element)| element.clone())
    }

    /// Return the earliest element, waiting for one to be offered if the queue is empty. The
    /// element stays queued.
    ///
    /// Cancel by dropping the future (or aborting its task).
    pub async fn take(&self) -> E {
        loop {
            // Created before the check: notify_waiters reaches every Notified that exists when
            // it is called, so an offer landing between the check and the await is not lost.
            let notified = self.offered.notified();
            if let Some(element) = self.try_take() {
                return element;
            }
            trace!("queue empty, waiting for an offer");
            notified.await;
        }
    }

    /// Like [`take`](Self::take), but gives up and returns None once `timeout` has elapsed.
    pub async fn poll(&self, timeout: Duration) -> Option<E> {
        debug!(?timeout, "polling for element");
        match tokio::time::timeout(timeout, self.take()).await {
            Ok(element) => Some(element),
            Err(_) => {
                debug!(?timeout, "poll timed out");
                None
            }
        }
    }
}
