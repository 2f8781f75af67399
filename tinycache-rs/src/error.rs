//! Error types shared across the cache.
//!
//! Note that these errors are `Clone`: a single failed load is delivered to
//! every caller which was coalesced onto the same flight
//! (see [single_flight](crate::single_flight)).
use thiserror::Error;

/// Enumerates the error kinds a cache lookup can surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// An empty key was passed to [Group::get](crate::group::Group::get).
    #[error("key is required")]
    KeyRequired,

    /// A request named a group which is not present in the registry.
    #[error("no such group: {0}")]
    UnknownGroup(String),

    /// A peer request could not be parsed.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The origin getter failed; the message is preserved verbatim.
    #[error("{0}")]
    Origin(String),

    /// Fetching a value from a remote peer failed. This error is recovered
    /// internally by falling back to the origin and never surfaces to a
    /// caller of [Group::get](crate::group::Group::get).
    #[error("peer fetch failed: {0}")]
    PeerFetch(String),
}
