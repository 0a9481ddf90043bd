use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;

/// Internal Store
///
/// Computed values are stored here. An entry is written once and is never replaced or removed.
#[derive(Clone)]
pub(crate) struct Store<K: Hash + Eq, V: Clone> {
    inner: Arc<DashMap<K, V>>,
}

impl<K, V> Store<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(DashMap::with_capacity(capacity)),
        }
    }

    pub(crate) fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|entry| entry.value().clone())
    }

    /// Store `value` unless `key` already holds one, and return whichever value is now stored.
    pub(crate) fn insert(&self, key: K, value: V) -> V {
        self.inner.entry(key).or_insert(value).value().clone()
    }

    pub(crate) fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub(crate) fn count(&self) -> usize {
        self.inner.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_never_overwrites_a_stored_value() {
        let store = Store::with_capacity(4);
        assert_eq!(store.insert("E1", 1), 1);
        assert_eq!(store.insert("E1", 2), 1);
        assert_eq!(store.get(&"E1"), Some(1));
        assert_eq!(store.count(), 1);
        assert!(!store.contains_key(&"E2"));
    }
}
