//! Capability traits which decouple a group from its peer transport.
//!
//! A [Group](crate::group::Group) never talks to the network itself. It asks
//! a [PeerPicker](PeerPicker) whether a key belongs to a remote peer and, if
//! so, fetches the bytes through the returned [PeerFetcher](PeerFetcher).
//! The canonical realization of both lives in [http](crate::http), but any
//! transport can be plugged in - the tests use in-memory fakes.
use std::sync::Arc;

use async_trait::async_trait;

/// Fetches the value of a key within a group from one remote peer.
///
/// Errors are opaque; the group recovers from them by falling back to its
/// origin. No retries happen at this layer.
#[async_trait]
pub trait PeerFetcher: Send + Sync {
    /// Fetches the raw bytes stored for **key** in **group** on the remote
    /// peer.
    async fn fetch(&self, group: &str, key: &str) -> anyhow::Result<Vec<u8>>;
}

/// Maps a key to the peer owning it.
pub trait PeerPicker: Send + Sync {
    /// Returns the fetcher for the remote peer owning the given key, or
    /// **None** if the key is owned by this peer (or no topology is known)
    /// and must be served locally.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>>;
}
