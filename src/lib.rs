//! # bloom-audit: distributed bloom-filter accuracy verification
//!
//! bloom-audit measures how well persisted probabilistic membership
//! filters describe a corpus of log-line chunks. A fleet of N stateless
//! instances deterministically shards ownership of every series' chunks,
//! samples a subset of series, probes each experiment's persisted filter
//! with tokenized queries, and independently re-derives ground truth by
//! literally scanning the decoded chunk content — quantifying the
//! filters' false-positive/false-negative behavior.
//!
//! ## Design Principles
//!
//! - **Coordination-free sharding**: every instance computes the same
//!   deterministic partition; ordinal `i` owns shard `i`.
//! - **Bounded concurrency**: a fixed worker pool with blocking admission
//!   is the only backpressure; there is no unbounded queue.
//! - **Contained failure**: a series' failure never aborts the run; a
//!   missing filter artifact is a skip, not an error.
//! - **Independent ground truth**: the literal scan never consults the
//!   filter or tokenizer it judges.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use bloom_audit::{
//!     ExperimentRegistry, LineDecoder, MemoryObjectStore, MemorySeriesIndex, Metrics,
//!     Pipeline, RuntimeConfig, ShardAssignment,
//! };
//!
//! # async fn example() -> bloom_audit::Result<()> {
//! let config = RuntimeConfig::builder(ShardAssignment::new(0, 2)?)
//!     .sample_probability(0.3)
//!     .period("19625")
//!     .build()?;
//!
//! let pipeline = Pipeline::new(
//!     config,
//!     Arc::new(ExperimentRegistry::default_matrix()?),
//!     Arc::new(MemorySeriesIndex::new()),
//!     Arc::new(MemoryObjectStore::new()),
//!     Arc::new(LineDecoder),
//!     Arc::new(Metrics::new()),
//! );
//! pipeline.run().await?;
//! println!("{}", serde_json::to_string(&pipeline.metrics().snapshot()).unwrap());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod config;
pub mod error;
pub mod experiment;
pub mod filter;
pub mod index;
pub mod matcher;
pub mod metrics;
pub mod pipeline;
pub mod pool;
pub mod sampler;
pub mod series;
pub mod shard;
pub mod store;
pub mod tokenizer;
pub mod verify;

pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use error::{Error, Result};
pub use experiment::{Experiment, ExperimentRegistry, QueryExperiment};
pub use filter::{FilterCodec, ScalableBloomFilter};
pub use index::{MemorySeriesIndex, SeriesIndex, SeriesVisitor};
pub use matcher::{MatcherState, SeriesMatcher, ShardBounds};
pub use metrics::{Metrics, MetricsSnapshot};
pub use pipeline::Pipeline;
pub use pool::WorkerPool;
pub use sampler::ProbabilisticSampler;
pub use series::{ChunkDescriptor, ChunkRef, Series, SeriesRef};
pub use shard::{partition, ShardAssignment};
pub use store::{ChunkDecoder, LineDecoder, MemoryObjectStore, ObjectStore};
pub use tokenizer::{ChunkScopedTokenizer, NGramTokenizer, Token, Tokenizer};
pub use verify::{count_line_matches, DecodedChunks, GroundTruth};
