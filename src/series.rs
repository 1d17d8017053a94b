//! Series and chunk metadata as consumed from the index collaborator.
//!
//! The index enumerator hands the pipeline borrowed views ([`SeriesRef`])
//! whose backing buffers may be reused between callbacks. Anything that
//! crosses a task boundary is copied into an owned [`Series`] first.

use serde::{Deserialize, Serialize};

/// Opaque storage locator for one chunk's payload.
///
/// The pipeline never interprets the reference beyond passing it to the
/// object store as a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRef(String);

impl ChunkRef {
    /// Wrap a storage locator.
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The locator as a store key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Metadata for one stored chunk: time range `[from, through)` in
/// milliseconds, payload checksum, and the opaque storage reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    /// Inclusive start of the chunk's time range (ms).
    pub from: i64,
    /// Exclusive end of the chunk's time range (ms).
    pub through: i64,
    /// Payload checksum as recorded by the writer.
    pub checksum: u32,
    /// Opaque storage locator.
    pub reference: ChunkRef,
}

impl ChunkDescriptor {
    /// Create a chunk descriptor.
    #[must_use]
    pub fn new(from: i64, through: i64, checksum: u32, reference: ChunkRef) -> Self {
        Self {
            from,
            through,
            checksum,
            reference,
        }
    }
}

/// Borrowed view of one series as yielded by the index enumerator.
///
/// The enumerator may reuse the backing buffers between callbacks, so this
/// view must not outlive the callback's synchronous extent; call
/// [`SeriesRef::to_owned_series`] before retaining anything.
#[derive(Debug, Clone, Copy)]
pub struct SeriesRef<'a> {
    /// Label set identifying the series.
    pub labels: &'a [(String, String)],
    /// Stable hash of the label set.
    pub fingerprint: u64,
    /// Ordered chunk metadata for the series.
    pub chunks: &'a [ChunkDescriptor],
}

impl SeriesRef<'_> {
    /// Copy the view into an owned [`Series`], optionally narrowing the
    /// chunk set to one shard.
    #[must_use]
    pub fn to_owned_series(&self, chunks: Vec<ChunkDescriptor>) -> Series {
        Series {
            labels: self.labels.to_vec(),
            fingerprint: self.fingerprint,
            chunks,
        }
    }
}

/// Owned series data: immutable label set, fingerprint, and an ordered
/// chunk sequence (for pipeline workers, the owned shard only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    /// Label set identifying the series.
    pub labels: Vec<(String, String)>,
    /// Stable hash of the label set.
    pub fingerprint: u64,
    /// Ordered chunk metadata.
    pub chunks: Vec<ChunkDescriptor>,
}
