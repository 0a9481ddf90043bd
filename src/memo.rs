use crate::store::Store;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Weak;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;
use tracing::trace;

/// Boxed Future yielding a computed value or the reason it could not be computed.
pub type ComputeFuture<V, E> = Pin<Box<dyn Future<Output = Result<V, E>> + Send>>;

// Completion of one computation is announced on its sender. Waiters only hold a weak reference in
// the flight map, so a computation that vanishes leaves a dead entry behind rather than a hang.
type Completion = broadcast::Sender<()>;
type FlightMap<K> = Arc<DashMap<K, Weak<Completion>>>;

/// Number of keys the store is sized for by [`MemoCache::new`].
pub const DEFAULT_CAPACITY: usize = 512;

/// Memoization errors.
#[derive(Debug, Error)]
pub enum MemoError<E> {
    /// The computation triggered by this call failed. Nothing was stored.
    #[error("value computation failed: {0}")]
    Compute(E),
    /// The task running the computation was cancelled before it finished.
    #[error("value computation was cancelled")]
    Cancelled,
    /// The computation panicked.
    #[error("value computation panicked")]
    Panicked,
}

enum Role<V> {
    Ready(V),
    Wait(broadcast::Receiver<()>),
    Lead(Arc<Completion>),
}

/// Clears the in-flight marker for a key and wakes its waiters, however the computation ends.
struct Flight<K: Hash + Eq> {
    key: K,
    sender: Arc<Completion>,
    in_flight: FlightMap<K>,
}

impl<K: Hash + Eq> Drop for Flight<K> {
    fn drop(&mut self) {
        let sender = Arc::as_ptr(&self.sender);
        self.in_flight
            .remove_if(&self.key, |_, weak| std::ptr::eq(weak.as_ptr(), sender));
        // Waiters re-check the store whatever they receive, so a failed send is fine.
        let _ = self.sender.send(());
    }
}

/// Single-flight memoizing cache.
///
/// Each key is computed at most once: concurrent callers for the same key share one computation,
/// and a successful result is kept for the lifetime of the cache.
pub struct MemoCache<G, K, V, E>
where
    G: Fn(K) -> ComputeFuture<V, E>,
    K: Clone + Send + Sync + Eq + Hash,
    V: Clone + Send + Sync,
{
    compute: G,
    storage: Store<K, V>,
    in_flight: FlightMap<K>,
    request_deduplicated_counter: AtomicU64,
    request_total_counter: AtomicU64,
    computation_counter: AtomicU64,
}

impl<G, K, V, E> MemoCache<G, K, V, E>
where
    G: Fn(K) -> ComputeFuture<V, E>,
    K: Clone + Send + Sync + Eq + Hash + 'static,
    V: Clone + Send + Sync + 'static,
    E: Send + 'static,
{
    /// Create a new cache for the provided computation, sized for [`DEFAULT_CAPACITY`] keys.
    pub fn new(compute: G) -> Self {
        Self::with_capacity(compute, DEFAULT_CAPACITY)
    }

    /// Create a new cache for the provided computation, sized for `capacity` keys.
    /// Note: capacity is an allocation hint. The cache grows without bound.
    pub fn with_capacity(compute: G, capacity: usize) -> Self {
        Self {
            compute,
            storage: Store::with_capacity(capacity),
            in_flight: Arc::new(DashMap::new()),
            request_deduplicated_counter: AtomicU64::new(0),
            request_total_counter: AtomicU64::new(0),
            computation_counter: AtomicU64::new(0),
        }
    }

    /// Return the number of stored values.
    pub fn len(&self) -> usize {
        self.storage.count()
    }

    /// Return true if no value has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return true if a value is stored for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.storage.contains_key(key)
    }

    /// Return the number of keys whose computation is currently running.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Return the number of requests answered without starting a computation.
    pub fn request_deduplicated_count(&self) -> u64 {
        self.request_deduplicated_counter.load(Ordering::SeqCst)
    }

    /// Return the total request count.
    pub fn request_count(&self) -> u64 {
        self.request_total_counter.load(Ordering::SeqCst)
    }

    /// Return the number of computations started.
    pub fn computation_count(&self) -> u64 {
        self.computation_counter.load(Ordering::SeqCst)
    }

    /// Get the value for `key`, computing it if no value is stored.
    ///
    /// Many concurrent accessors can attempt to get the same key, but the computation will only
    /// run once. Accessors of other keys never wait on it. If the computation fails, the caller
    /// which started it receives [`MemoError::Compute`] and any concurrent accessors retry, so
    /// one of them starts a fresh computation.
    ///
    /// The computation runs on its own task. Dropping this future does not abort it: the result
    /// is still stored and handed to concurrent accessors.
    pub async fn get(&self, key: K) -> Result<V, MemoError<E>> {
        self.request_total_counter.fetch_add(1, Ordering::SeqCst);
        loop {
            if let Some(value) = self.storage.get(&key) {
                self.request_deduplicated_counter
                    .fetch_add(1, Ordering::SeqCst);
                return Ok(value);
            }
            match self.join_or_lead(&key) {
                Role::Ready(value) => {
                    self.request_deduplicated_counter
                        .fetch_add(1, Ordering::SeqCst);
                    return Ok(value);
                }
                Role::Wait(mut receiver) => {
                    trace!("waiting for in-flight computation");
                    // A value, a closed channel and a lag all mean the same thing here: the
                    // computation is over, so look in the store again.
                    let _ = receiver.recv().await;
                }
                Role::Lead(sender) => return self.lead(key, sender).await,
            }
        }
    }

    // Atomically test-and-mark the key while holding its flight map shard.
    fn join_or_lead(&self, key: &K) -> Role<V> {
        let entry = self.in_flight.entry(key.clone());
        // Values are stored before their marker is removed, so this cannot miss a commit.
        if let Some(value) = self.storage.get(key) {
            return Role::Ready(value);
        }
        if let Entry::Occupied(occupied) = &entry {
            if let Some(sender) = occupied.get().upgrade() {
                return Role::Wait(sender.subscribe());
            }
        }
        let (sender, _) = broadcast::channel(1);
        let sender = Arc::new(sender);
        entry.insert(Arc::downgrade(&sender));
        Role::Lead(sender)
    }

    async fn lead(&self, key: K, sender: Arc<Completion>) -> Result<V, MemoError<E>> {
        self.computation_counter.fetch_add(1, Ordering::SeqCst);
        debug!("computing value for missing key");
        // The guard exists before the callback runs, so even a panicking callback clears the marker.
        let flight = Flight {
            key,
            sender,
            in_flight: self.in_flight.clone(),
        };
        let fut = (self.compute)(flight.key.clone());
        let storage = self.storage.clone();
        let handle = tokio::spawn(async move {
            let outcome = fut.await;
            let outcome = outcome.map(|value| storage.insert(flight.key.clone(), value));
            // Store first, then clear the marker and wake waiters.
            drop(flight);
            outcome
        });
        match handle.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                debug!("value computation failed, waiters will retry");
                Err(MemoError::Compute(err))
            }
            Err(err) if err.is_cancelled() => {
                debug!("value computation cancelled, waiters will retry");
                Err(MemoError::Cancelled)
            }
            Err(_) => {
                debug!("value computation panicked, waiters will retry");
                Err(MemoError::Panicked)
            }
        }
    }
}
