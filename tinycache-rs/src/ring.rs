//! Provides the consistent hash ring which assigns keys to peers.
//!
//! Every peer occupies a configurable number of virtual nodes on a ring of
//! 32 bit hash points. A key is owned by the peer whose virtual node is the
//! first one at or after the key's own hash point, wrapping around at the end
//! of the ring. Virtual nodes smooth out the distribution so that even small
//! clusters spread their keys evenly.
//!
//! Once a ring has been populated during topology setup it is treated as
//! read only: lookups require no locking. Rebuilding a ring (when the peer
//! set is configured anew) is done by constructing a fresh instance and
//! swapping it in atomically (see [HttpPool](crate::http::HttpPool)).
use std::collections::HashMap;

/// The hash function used to place peers and keys on the ring.
pub type HashFn = fn(&[u8]) -> u32;

/// Maps keys onto a fixed set of peers via consistent hashing.
///
/// # Examples
/// ```
/// # use tinycache::ring::HashRing;
/// let mut ring = HashRing::new(50);
/// ring.add(["http://cache-1:9001", "http://cache-2:9001"]);
///
/// // The same key always lands on the same peer...
/// assert_eq!(ring.get("Tom"), ring.get("Tom"));
/// ```
pub struct HashRing {
    replicas: usize,
    hash: HashFn,
    points: Vec<u32>,
    peer_by_point: HashMap<u32, String>,
}

impl HashRing {
    /// Creates a ring which places **replicas** virtual nodes per peer,
    /// hashing with CRC32-IEEE.
    pub fn new(replicas: usize) -> Self {
        HashRing::with_hash(replicas, crc32fast::hash)
    }

    /// Creates a ring with a custom hash function.
    ///
    /// This is mostly useful for tests which want a predictable placement of
    /// virtual nodes.
    pub fn with_hash(replicas: usize, hash: HashFn) -> Self {
        HashRing {
            replicas,
            hash,
            points: Vec::new(),
            peer_by_point: HashMap::new(),
        }
    }

    /// Adds the given peers to the ring.
    ///
    /// For each peer, one hash point per replica is derived from the decimal
    /// replica index prepended to the peer identifier. This may be called
    /// repeatedly; the resulting lookup behavior only depends on the final
    /// set of peers, not on the order in which they were added.
    pub fn add<I, P>(&mut self, peers: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        for peer in peers {
            let peer = peer.as_ref();
            for replica in 0..self.replicas {
                let point = (self.hash)(format!("{}{}", replica, peer).as_bytes());
                self.points.push(point);
                let _ = self.peer_by_point.insert(point, peer.to_owned());
            }
        }

        self.points.sort_unstable();
    }

    /// Returns the peer owning the given key or **None** if the ring is
    /// empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.points.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());

        // Lower bound search: the first point >= hash owns the key, an exact
        // match included. Past the last point we wrap around to the start.
        let idx = self.points.partition_point(|&point| point < hash);
        let idx = if idx == self.points.len() { 0 } else { idx };

        self.peer_by_point
            .get(&self.points[idx])
            .map(String::as_str)
    }

    /// Determines if no peers have been added yet.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
