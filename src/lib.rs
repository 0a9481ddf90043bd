//! Provides two safe, asynchronous (tokio based), key-indexed coordination primitives.
//!
//! [`MemoCache`] computes the value for a key at most once, however many tasks ask for it at the
//! same time, and keeps it for the lifetime of the cache. [`DedupQueue`] holds at most one element
//! per key, serves elements in the order their keys were first offered and lets any number of
//! consumers wait for the next one.
//!
//! Let's imagine we have a mechanism for computing data that is slow. Our data is keyed by
//! `usize` and consists of a `String`. We represent the computation as a function (or closure)
//! which takes the key and returns a boxed future yielding either the value or an error.
//!
//! Example 1
//! ```
//! use keyway::ComputeFuture;
//! use keyway::MemoCache;
//!
//! fn compute(key: usize) -> ComputeFuture<String, std::io::Error> {
//!     let fut = async move {
//!         tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
//!         Ok(format!("key: {key}"))
//!     };
//!     Box::pin(fut)
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache = MemoCache::new(compute);
//! assert_eq!(cache.get(5).await.unwrap(), "key: 5");
//! // The second get is answered from the cache.
//! assert_eq!(cache.get(5).await.unwrap(), "key: 5");
//! assert_eq!(cache.computation_count(), 1);
//! # }
//! ```
//!
//! A [`DedupQueue`] derives a key from each element. Retrieval peeks: the element stays queued
//! until it is explicitly removed, so a consumer can look at what is next before committing to
//! it.
//!
//! Example 2
//! ```
//! use keyway::DedupQueue;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let queue = DedupQueue::new(|job: &(u32, &'static str)| job.0);
//! queue.offer((1, "first"));
//! queue.offer((2, "second"));
//! // Same key: replaced in place, keeps its position.
//! queue.offer((1, "first, updated"));
//!
//! let next = queue.take().await;
//! assert_eq!(next, (1, "first, updated"));
//! assert_eq!(queue.size(), 2);
//! assert!(queue.remove(&next));
//! assert_eq!(queue.try_take(), Some((2, "second")));
//! # }
//! ```
//!
mod memo;
mod queue;
mod store;

pub use crate::memo::ComputeFuture;
pub use crate::memo::MemoCache;
pub use crate::memo::MemoError;
pub use crate::memo::DEFAULT_CAPACITY as DEFAULT_CACHE_CAPACITY;
pub use crate::queue::DedupQueue;
pub use crate::queue::DEFAULT_CAPACITY as DEFAULT_QUEUE_CAPACITY;
