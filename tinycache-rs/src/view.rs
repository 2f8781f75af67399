//! Provides the immutable byte blob in which all cached values are stored.
//!
//! A [ByteView](ByteView) is backed by [bytes::Bytes] and therefore cheap to
//! clone: the cache and any number of readers share the same allocation.
//! Nobody can mutate the stored bytes - readers either borrow them via
//! [as_slice](ByteView::as_slice) or take a defensive copy via
//! [to_vec](ByteView::to_vec).
use bytes::Bytes;

use crate::lru::ByteSize;

/// An immutable, length-measurable view onto a cached value.
///
/// # Examples
/// ```
/// # use tinycache::view::ByteView;
/// let view = ByteView::from("630");
///
/// assert_eq!(view.len(), 3);
/// assert_eq!(view.as_slice(), b"630");
/// assert_eq!(view.to_string(), "630");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ByteView {
    data: Bytes,
}

impl ByteView {
    /// Returns the number of bytes in this view.
    ///
    /// This is also the value's contribution to the byte accounting of the
    /// owning cache.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Determines if this view is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Provides read access to the underlying bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Returns a copy of the underlying bytes.
    ///
    /// Use this when handing the value to a caller which requires a mutable
    /// buffer - the cached bytes themselves remain untouched.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Provides access to the underlying shared buffer.
    pub fn as_bytes(&self) -> Bytes {
        self.data.clone()
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        ByteView { data: data.into() }
    }
}

impl From<Bytes> for ByteView {
    fn from(data: Bytes) -> Self {
        ByteView { data }
    }
}

impl From<&[u8]> for ByteView {
    fn from(data: &[u8]) -> Self {
        ByteView {
            data: Bytes::copy_from_slice(data),
        }
    }
}

impl From<&str> for ByteView {
    fn from(data: &str) -> Self {
        ByteView {
            data: Bytes::copy_from_slice(data.as_bytes()),
        }
    }
}

impl std::fmt::Display for ByteView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.data))
    }
}

impl ByteSize for ByteView {
    fn byte_len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use crate::view::ByteView;

    #[test]
    fn views_share_their_buffer() {
        let view = ByteView::from("hello");
        let clone = view.clone();

        // Both views report the same contents...
        assert_eq!(view.as_slice(), clone.as_slice());

        // ...and to_vec yields an independent copy.
        let mut copy = view.to_vec();
        copy[0] = b'H';
        assert_eq!(view.as_slice(), b"hello");
    }

    #[test]
    fn empty_views_are_reported_as_such() {
        assert_eq!(ByteView::default().is_empty(), true);
        assert_eq!(ByteView::default().len(), 0);
        assert_eq!(ByteView::from("x").is_empty(), false);
    }
}
