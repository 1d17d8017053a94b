//! Object storage and chunk decoding seams.
//!
//! Both filter artifacts and chunk payloads live behind [`ObjectStore`];
//! the pipeline addresses them by key and treats the payload as opaque
//! bytes. The existence check is a separate call from the fetch so a
//! missing filter artifact costs no transfer.
//!
//! [`MemoryObjectStore`] is the in-process backend used by tests and
//! local runs; production deployments supply their own implementation
//! over the real bucket client.

use std::future::Future;

use dashmap::DashMap;

use crate::{Error, Result};

/// Read-only object storage as consumed by the pipeline.
///
/// Implementations must be safe for concurrent use from every worker
/// task.
pub trait ObjectStore: Send + Sync {
    /// Whether `key` exists, without fetching it.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Fetch the object at `key`.
    ///
    /// Returns [`Error::ObjectMissing`] when the key is absent.
    fn get(&self, key: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// In-memory object store over a lock-free concurrent map.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: DashMap<String, Vec<u8>>,
}

impl MemoryObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object. Test and local-run surface; the pipeline itself
    /// never writes.
    pub fn put(&self, key: impl Into<String>, bytes: Vec<u8>) {
        self.objects.insert(key.into(), bytes);
    }

    /// Number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl ObjectStore for MemoryObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.contains_key(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::ObjectMissing(key.to_string()))
    }
}

/// Capability turning stored chunk bytes into a sequence of log lines.
pub trait ChunkDecoder: Send + Sync {
    /// Decode one chunk's payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChunkDecode`] when the bytes are not a valid
    /// encoding; the caller skips only that chunk.
    fn decode(&self, bytes: &[u8]) -> Result<Vec<String>>;
}

/// Newline-delimited UTF-8 decoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineDecoder;

impl ChunkDecoder for LineDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Vec<String>> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::ChunkDecode(format!("invalid UTF-8 payload: {e}")))?;
        Ok(text.lines().map(str::to_string).collect())
    }
}
