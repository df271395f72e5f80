//! Session-scoped byte cache keyed by fetch URL.
//!
//! ```text
//! Cache (one per session)
//! └── RwLock<FxHashMap<String, Bytes>>
//!     key:   absolute fetch URL (never a logical package name)
//!     value: raw bytes as returned by the registry
//! ```
//!
//! Two different versions of a package live under two different URLs, so
//! they can never collide. Concurrent first-reference races are tolerated:
//! the loser overwrites the entry with equivalent content.

use std::fmt;
use std::ops::Deref;
use std::str::Utf8Error;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

// =============================================================================
// Bytes
// =============================================================================

/// Immutable, cheaply clonable byte buffer.
///
/// Used for everything the session moves around: cached downloads, virtual
/// file contents and compiler inputs. Text is decoded at the edges with
/// [`Bytes::as_text`].
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Bytes(Arc<[u8]>);

impl Bytes {
    /// Wrap owned data.
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self(data.into())
    }

    /// Borrow the raw bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Decode as UTF-8, stripping a BOM if present.
    pub fn as_text(&self) -> Result<&str, Utf8Error> {
        decode_utf8(&self.0)
    }

    /// Decode as UTF-8, replacing invalid sequences.
    pub fn to_text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bytes({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(data: Vec<u8>) -> Self {
        Self(data.into())
    }
}

impl From<&[u8]> for Bytes {
    fn from(data: &[u8]) -> Self {
        Self(data.into())
    }
}

impl From<String> for Bytes {
    fn from(text: String) -> Self {
        Self(text.into_bytes().into())
    }
}

impl From<&str> for Bytes {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().into())
    }
}

/// Decode bytes as UTF-8, stripping BOM if present.
pub fn decode_utf8(buf: &[u8]) -> Result<&str, Utf8Error> {
    let buf = buf.strip_prefix(b"\xef\xbb\xbf").unwrap_or(buf);
    std::str::from_utf8(buf)
}

// =============================================================================
// Cache
// =============================================================================

/// In-memory store for fetched bytes.
///
/// Created fresh for every session and dropped with it; nothing is persisted.
#[derive(Default)]
pub struct Cache {
    entries: RwLock<FxHashMap<String, Bytes>>,
}

impl Cache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached download.
    pub fn get(&self, url: &str) -> Option<Bytes> {
        self.entries.read().get(url).cloned()
    }

    /// Store a download, replacing any previous entry for the same URL.
    pub fn set(&self, url: impl Into<String>, data: Bytes) {
        self.entries.write().insert(url.into(), data);
    }

    /// Remove a single entry.
    pub fn delete(&self, url: &str) -> Option<Bytes> {
        self.entries.write().remove(url)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Return the cached bytes for `url`, or run `fetch` and cache its result.
    ///
    /// The lock is not held while fetching. Two racing callers may both
    /// fetch; the second write replaces the first with equivalent content.
    pub fn get_or_fetch<E>(
        &self,
        url: &str,
        fetch: impl FnOnce() -> Result<Bytes, E>,
    ) -> Result<Bytes, E> {
        if let Some(data) = self.get(url) {
            log::debug!("cache hit: {url}");
            return Ok(data);
        }

        let data = fetch()?;
        self.set(url, data.clone());
        Ok(data)
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache").field("entries", &self.len()).finish()
    }
}
