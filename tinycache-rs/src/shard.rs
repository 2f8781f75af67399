//! Provides the thread safe local store of one group on one peer.
//!
//! A shard is a mutex guarded [LruCache](crate::lru::LruCache) holding
//! [ByteView](crate::view::ByteView) values. The engine is created lazily on
//! the first write, so a group which only ever serves remote keys allocates
//! nothing. Since the stored views are shared immutably, they can be handed
//! out beyond the critical section without copying.
use std::sync::Mutex;

use crate::lru::LruCache;
use crate::view::ByteView;

/// The mutex guarded LRU partition of one group.
pub struct Shard {
    cache_bytes: usize,
    lru: Mutex<Option<LruCache<ByteView>>>,
}

impl Shard {
    /// Creates a shard with the given byte budget (zero meaning unbounded).
    pub fn new(cache_bytes: usize) -> Self {
        Shard {
            cache_bytes,
            lru: Mutex::new(None),
        }
    }

    /// Returns the cached view for the given key, marking it as recently
    /// used.
    pub fn get(&self, key: &str) -> Option<ByteView> {
        self.lru
            .lock()
            .unwrap()
            .as_mut()
            .and_then(|lru| lru.get(key).cloned())
    }

    /// Stores the given view, evicting least recently used entries if the
    /// budget demands it.
    pub fn add(&self, key: &str, value: ByteView) {
        let mut lru = self.lru.lock().unwrap();
        lru.get_or_insert_with(|| LruCache::new(self.cache_bytes))
            .add(key.to_owned(), value);
    }

    /// Returns the number of entries currently stored.
    pub fn len(&self) -> usize {
        self.lru.lock().unwrap().as_ref().map_or(0, LruCache::len)
    }

    /// Determines if nothing is stored (yet).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use crate::shard::Shard;
    use crate::view::ByteView;

    #[test]
    fn the_engine_is_created_on_first_write() {
        let shard = Shard::new(1024);

        // A read on a pristine shard doesn't allocate an engine...
        assert_eq!(shard.get("missing"), None);
        assert_eq!(shard.is_empty(), true);

        shard.add("Tom", ByteView::from("630"));
        assert_eq!(shard.get("Tom").unwrap(), ByteView::from("630"));
        assert_eq!(shard.len(), 1);
    }

    #[test]
    fn the_budget_is_passed_to_the_engine() {
        let shard = Shard::new(10);

        shard.add("k1", ByteView::from("v1"));
        shard.add("k2", ByteView::from("v2"));
        shard.add("k3", ByteView::from("v3"));

        assert_eq!(shard.get("k1"), None);
        assert_eq!(shard.get("k2").unwrap(), ByteView::from("v2"));
        assert_eq!(shard.get("k3").unwrap(), ByteView::from("v3"));
    }
}
