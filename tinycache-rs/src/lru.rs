//! Provides a size constrained LRU cache.
//!
//! A cache behaves just like a **Map** as long as there is no shortage in
//! storage. Once the bytes allocated by its keys and values exceed the given
//! budget, old (least recently used) entries are evicted - hence the name LRU
//! cache.
//!
//! The cache is single threaded on purpose: one instance lives behind the
//! mutex of a [Shard](crate::shard::Shard) and is never shared across threads
//! directly.
//!
//! # Examples
//! ```
//! # use tinycache::lru::LruCache;
//! # use tinycache::view::ByteView;
//! // Specifies a cache which can allocate up to 10 bytes for its keys and
//! // values...
//! let mut lru: LruCache<ByteView> = LruCache::new(10);
//!
//! lru.add("k1".to_owned(), ByteView::from("v1"));
//! lru.add("k2".to_owned(), ByteView::from("v2"));
//!
//! // ...so a third entry will throw the least recently used one out:
//! lru.add("k3".to_owned(), ByteView::from("v3"));
//! assert_eq!(lru.get("k1").is_none(), true);
//! assert_eq!(lru.get("k2").is_some(), true);
//! assert_eq!(lru.get("k3").is_some(), true);
//! ```
use linked_hash_map::LinkedHashMap;

/// Returns the number of bytes a value contributes to the cache budget.
pub trait ByteSize {
    /// Returns the length of this value in bytes.
    ///
    /// Note that for heap allocated values this should report the payload
    /// size, as this makes up the "largest" part of an instance. Bookkeeping
    /// fields on the stack (length, capacity, the pointer itself) are
    /// deliberately ignored.
    fn byte_len(&self) -> usize;
}

impl ByteSize for String {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

/// Invoked with the key and value of each entry which is evicted for capacity
/// reasons.
pub type EvictionListener<V> = Box<dyn FnMut(String, V) + Send>;

/// Provides a size constrained LRU cache.
///
/// Each entry is charged with `key.len() + value.byte_len()` bytes. Once the
/// sum of all charges exceeds **max_bytes**, the least recently used entries
/// are evicted until the budget is honored again. A **max_bytes** of zero
/// disables the budget entirely.
///
/// Note that a single entry which is larger than the whole budget is kept
/// (after everything else has been evicted) - rejecting it would turn the
/// cache into a trap for the one value the application apparently needs most.
pub struct LruCache<V: ByteSize> {
    max_bytes: usize,
    used_bytes: usize,
    map: LinkedHashMap<String, V>,
    on_evict: Option<EvictionListener<V>>,
}

impl<V: ByteSize> LruCache<V> {
    /// Creates a new cache which can allocate up to **max_bytes** for its
    /// keys and values. A budget of zero imposes no limit.
    pub fn new(max_bytes: usize) -> Self {
        LruCache {
            max_bytes,
            used_bytes: 0,
            map: LinkedHashMap::new(),
            on_evict: None,
        }
    }

    /// Creates a new cache which additionally reports each evicted entry to
    /// the given listener.
    ///
    /// The listener fires exactly once per evicted entry, after the entry has
    /// been removed from the cache.
    pub fn with_eviction_listener(max_bytes: usize, listener: EvictionListener<V>) -> Self {
        LruCache {
            max_bytes,
            used_bytes: 0,
            map: LinkedHashMap::new(),
            on_evict: Some(listener),
        }
    }

    /// Returns the value which has previously been stored for the given key
    /// or **None** if no value is present.
    ///
    /// A hit marks the entry as most recently used.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        self.map.get_refresh(key).map(|value| &*value)
    }

    /// Stores the given value for the given key.
    ///
    /// If the key is already present, the value is replaced in place, the
    /// byte accounting is adjusted by the length difference and the entry
    /// becomes the most recently used one. Afterwards, least recently used
    /// entries are evicted until the budget is honored again.
    pub fn add(&mut self, key: String, value: V) {
        let key_len = key.len();
        let mut delta = (key_len + value.byte_len()) as isize;

        if let Some(previous) = self.map.insert(key, value) {
            // Replaced in place: the key itself stays charged, only the
            // value length changes.
            delta -= (key_len + previous.byte_len()) as isize;
        }

        self.used_bytes = (self.used_bytes as isize + delta) as usize;

        self.enforce_budget();
    }

    /// Evicts the least recently used entry.
    ///
    /// This fixes the byte accounting and invokes the eviction listener (if
    /// one is installed). Calling this on an empty cache is a no-op.
    pub fn remove_oldest(&mut self) {
        if let Some((key, value)) = self.map.pop_front() {
            self.used_bytes -= key.len() + value.byte_len();
            if let Some(listener) = self.on_evict.as_mut() {
                listener(key, value);
            }
        }
    }

    fn enforce_budget(&mut self) {
        // A lone entry survives even if it exceeds the budget on its own.
        while self.max_bytes != 0 && self.used_bytes > self.max_bytes && self.map.len() > 1 {
            self.remove_oldest();
        }
    }

    /// Returns the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Determines if the cache is completely empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the number of bytes currently charged against the budget.
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Returns the byte budget of this cache (zero meaning unbounded).
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

#[cfg(test)]
mod tests {
    use crate::lru::LruCache;
    use crate::view::ByteView;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn values_can_be_stored_and_retrieved() {
        let mut lru: LruCache<ByteView> = LruCache::new(0);

        lru.add("Hello".to_owned(), ByteView::from("World"));
        assert_eq!(lru.get("Hello").unwrap(), &ByteView::from("World"));
        assert_eq!(lru.get("Absent"), None);
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn budget_is_enforced_in_lru_order() {
        // Three 4 byte entries have to fit into 10 bytes - therefore the
        // least recently used one is dropped...
        let mut lru: LruCache<ByteView> = LruCache::new(10);

        lru.add("k1".to_owned(), ByteView::from("v1"));
        lru.add("k2".to_owned(), ByteView::from("v2"));
        lru.add("k3".to_owned(), ByteView::from("v3"));

        assert_eq!(lru.get("k1"), None);
        assert_eq!(lru.get("k2").unwrap(), &ByteView::from("v2"));
        assert_eq!(lru.get("k3").unwrap(), &ByteView::from("v3"));
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.used_bytes(), 8);
    }

    #[test]
    fn no_eviction_happens_below_the_budget() {
        let mut lru: LruCache<ByteView> = LruCache::new(1024);

        for i in 0..10 {
            lru.add(format!("key-{}", i), ByteView::from("value"));
        }

        assert_eq!(lru.len(), 10);
        assert_eq!(lru.used_bytes(), 10 * (5 + 5));
    }

    #[test]
    fn get_refreshes_the_recency_of_an_entry() {
        let mut lru: LruCache<ByteView> = LruCache::new(12);

        lru.add("k1".to_owned(), ByteView::from("v1"));
        lru.add("k2".to_owned(), ByteView::from("v2"));
        lru.add("k3".to_owned(), ByteView::from("v3"));

        // Touching k1 saves it - the next insertion evicts k2 instead...
        let _ = lru.get("k1");
        lru.add("k4".to_owned(), ByteView::from("v4"));

        assert_eq!(lru.get("k1").is_some(), true);
        assert_eq!(lru.get("k2"), None);
        assert_eq!(lru.get("k3").is_some(), true);
        assert_eq!(lru.get("k4").is_some(), true);
    }

    #[test]
    fn updates_adjust_the_accounting_in_place() {
        let mut lru: LruCache<ByteView> = LruCache::new(6);

        lru.add("k".to_owned(), ByteView::from("aa"));
        assert_eq!(lru.used_bytes(), 3);

        lru.add("k".to_owned(), ByteView::from("bbbb"));
        assert_eq!(lru.used_bytes(), 5);
        assert_eq!(lru.get("k").unwrap(), &ByteView::from("bbbb"));
        assert_eq!(lru.len(), 1);
    }

    #[test]
    fn eviction_listener_fires_once_per_evicted_entry() {
        let evictions = Arc::new(AtomicUsize::new(0));
        let counter = evictions.clone();

        let mut lru: LruCache<ByteView> = LruCache::with_eviction_listener(
            10,
            Box::new(move |key, value| {
                assert_eq!(key, "k1");
                assert_eq!(value, ByteView::from("v1"));
                let _ = counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        lru.add("k1".to_owned(), ByteView::from("v1"));
        lru.add("k2".to_owned(), ByteView::from("v2"));
        lru.add("k3".to_owned(), ByteView::from("v3"));

        assert_eq!(evictions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn a_lone_oversized_entry_is_retained() {
        let mut lru: LruCache<ByteView> = LruCache::new(8);

        lru.add("k1".to_owned(), ByteView::from("v1"));
        lru.add("k2".to_owned(), ByteView::from("v2"));

        // This entry exceeds the whole budget - everything else is evicted
        // but the entry itself survives...
        lru.add("huge".to_owned(), ByteView::from("0123456789abcdef"));

        assert_eq!(lru.len(), 1);
        assert_eq!(lru.get("huge").is_some(), true);
        assert_eq!(lru.used_bytes(), 20);
    }

    #[test]
    fn remove_oldest_evicts_exactly_one_entry() {
        let mut lru: LruCache<ByteView> = LruCache::new(0);

        lru.add("k1".to_owned(), ByteView::from("v1"));
        lru.add("k2".to_owned(), ByteView::from("v2"));

        lru.remove_oldest();

        assert_eq!(lru.len(), 1);
        assert_eq!(lru.get("k1"), None);
        assert_eq!(lru.get("k2").is_some(), true);
        assert_eq!(lru.used_bytes(), 4);

        // On an empty cache this is simply a no-op...
        lru.remove_oldest();
        lru.remove_oldest();
        assert_eq!(lru.is_empty(), true);
        assert_eq!(lru.used_bytes(), 0);
    }
}
