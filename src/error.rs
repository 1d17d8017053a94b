//! Error types for bloom-audit
//!
//! The taxonomy mirrors the pipeline's recovery scopes: fatal configuration
//! errors abort startup, per-tenant errors abort one tenant's iteration,
//! per-series and per-chunk errors are logged and contained inside the
//! worker task that hit them.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// bloom-audit error types
#[derive(Error, Debug)]
pub enum Error {
    /// Sampling probability outside the accepted range
    #[error("invalid sampling probability {0}: must be in (0, 1]")]
    InvalidSampleProbability(f64),

    /// Shard ordinal not strictly below the instance total
    #[error("invalid shard assignment: ordinal {ordinal} must be < total {total}")]
    InvalidShardAssignment {
        /// Ordinal index of this instance
        ordinal: u32,
        /// Total number of cooperating instances
        total: u32,
    },

    /// Fatal startup configuration error (missing/unparsable runtime parameter)
    #[error("configuration error: {0}")]
    Config(String),

    /// Index enumeration failed for one tenant
    #[error("tenant iteration failed for {tenant}: {source}")]
    TenantIteration {
        /// Tenant whose index could not be enumerated
        tenant: String,
        /// Underlying index error
        #[source]
        source: Box<Error>,
    },

    /// Requested object is absent from the store
    #[error("object not found: {0}")]
    ObjectMissing(String),

    /// Chunk payload retrieval failed
    #[error("chunk fetch failed for {reference}: {reason}")]
    ChunkFetch {
        /// Opaque chunk reference that could not be resolved
        reference: String,
        /// Store-reported failure reason
        reason: String,
    },

    /// Stored chunk bytes could not be decoded into log lines
    #[error("chunk decode failed: {0}")]
    ChunkDecode(String),

    /// Persisted filter bytes could not be deserialized
    #[error("filter decode failed: {0}")]
    FilterDecode(String),

    /// Submission after the worker pool entered its terminal drained state
    #[error("worker pool is drained; no further submissions accepted")]
    PoolDrained,

    /// Generic error
    #[error("{0}")]
    Other(String),
}
