//! Runtime configuration for one pipeline instance.
//!
//! Sharding parameters arrive from the environment: the instance ordinal
//! is the numeric suffix of `HOSTNAME` (statefulset convention) and the
//! fleet total comes from `BLOOM_AUDIT_INSTANCES`. Absence or invalid
//! values for either is fatal — the run cannot safely shard without
//! them. Everything else has a workable default.

use crate::sampler::ProbabilisticSampler;
use crate::shard::ShardAssignment;
use crate::{Error, Result};

const DEFAULT_KEY_ROOT: &str = "bloomtests";
const DEFAULT_KEY_PREFIX: &str = "named-experiments-";
const DEFAULT_POOL_CAPACITY: usize = 16;

/// Validated per-instance runtime parameters.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    shard: ShardAssignment,
    sample_probability: f64,
    bucket: String,
    key_root: String,
    key_prefix: String,
    period: String,
    pool_capacity: usize,
}

impl RuntimeConfig {
    /// Start building a config for an explicit shard assignment.
    #[must_use]
    pub fn builder(shard: ShardAssignment) -> RuntimeConfigBuilder {
        RuntimeConfigBuilder {
            shard,
            sample_probability: 1.0,
            bucket: String::new(),
            key_root: DEFAULT_KEY_ROOT.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            period: String::new(),
            pool_capacity: DEFAULT_POOL_CAPACITY,
        }
    }

    /// Read configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when `HOSTNAME` carries no ordinal
    /// suffix, `BLOOM_AUDIT_INSTANCES` is missing or unparsable, or the
    /// sampling probability is out of range. These are fatal startup
    /// conditions.
    pub fn from_env() -> Result<Self> {
        let hostname = std::env::var("HOSTNAME")
            .map_err(|_| Error::Config("HOSTNAME is not set".to_string()))?;
        let total = std::env::var("BLOOM_AUDIT_INSTANCES")
            .map_err(|_| Error::Config("BLOOM_AUDIT_INSTANCES is not set".to_string()))?
            .parse::<u32>()
            .map_err(|e| Error::Config(format!("BLOOM_AUDIT_INSTANCES: {e}")))?;
        let shard = ShardAssignment::from_hostname(&hostname, total)?;

        let mut builder = Self::builder(shard);
        if let Ok(raw) = std::env::var("BLOOM_AUDIT_SAMPLE") {
            let p = raw
                .parse::<f64>()
                .map_err(|e| Error::Config(format!("BLOOM_AUDIT_SAMPLE: {e}")))?;
            builder = builder.sample_probability(p);
        }
        if let Ok(bucket) = std::env::var("BLOOM_AUDIT_BUCKET") {
            builder = builder.bucket(bucket);
        }
        if let Ok(prefix) = std::env::var("BLOOM_AUDIT_PREFIX") {
            builder = builder.key_prefix(prefix);
        }
        if let Ok(period) = std::env::var("BLOOM_AUDIT_PERIOD") {
            builder = builder.period(period);
        }
        builder.build()
    }

    /// This instance's shard assignment.
    #[must_use]
    pub fn shard(&self) -> ShardAssignment {
        self.shard
    }

    /// Series sampling probability.
    #[must_use]
    pub fn sample_probability(&self) -> f64 {
        self.sample_probability
    }

    /// Object-storage bucket name (consumed by the store collaborator).
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Root segment of filter artifact keys.
    #[must_use]
    pub fn key_root(&self) -> &str {
        &self.key_root
    }

    /// Experiment-name prefix within artifact keys.
    #[must_use]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Index period (table name) segment of artifact keys.
    #[must_use]
    pub fn period(&self) -> &str {
        &self.period
    }

    /// Worker pool capacity.
    #[must_use]
    pub fn pool_capacity(&self) -> usize {
        self.pool_capacity
    }
}

/// Builder for [`RuntimeConfig`].
#[derive(Debug)]
pub struct RuntimeConfigBuilder {
    shard: ShardAssignment,
    sample_probability: f64,
    bucket: String,
    key_root: String,
    key_prefix: String,
    period: String,
    pool_capacity: usize,
}

impl RuntimeConfigBuilder {
    /// Set the series sampling probability (default 1.0: analyze all).
    #[must_use]
    pub fn sample_probability(mut self, p: f64) -> Self {
        self.sample_probability = p;
        self
    }

    /// Set the object-storage bucket name.
    #[must_use]
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Set the artifact key root segment.
    #[must_use]
    pub fn key_root(mut self, root: impl Into<String>) -> Self {
        self.key_root = root.into();
        self
    }

    /// Set the experiment-name prefix within artifact keys.
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Set the index period (table name) segment.
    #[must_use]
    pub fn period(mut self, period: impl Into<String>) -> Self {
        self.period = period.into();
        self
    }

    /// Set the worker pool capacity (default 16).
    #[must_use]
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = capacity;
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSampleProbability`] for an out-of-range
    /// probability and [`Error::Config`] for a zero pool capacity.
    pub fn build(self) -> Result<RuntimeConfig> {
        // Validation lives in the sampler; construction here just proves
        // the probability is usable.
        ProbabilisticSampler::new(self.sample_probability)?;
        if self.pool_capacity == 0 {
            return Err(Error::Config("pool capacity must be positive".to_string()));
        }
        Ok(RuntimeConfig {
            shard: self.shard,
            sample_probability: self.sample_probability,
            bucket: self.bucket,
            key_root: self.key_root,
            key_prefix: self.key_prefix,
            period: self.period,
            pool_capacity: self.pool_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard() -> ShardAssignment {
        ShardAssignment::new(0, 2).unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let config = RuntimeConfig::builder(shard()).build().unwrap();
        assert_eq!(config.sample_probability(), 1.0);
        assert_eq!(config.key_root(), "bloomtests");
        assert_eq!(config.key_prefix(), "named-experiments-");
        assert_eq!(config.pool_capacity(), 16);
    }

    #[test]
    fn test_builder_overrides() {
        let config = RuntimeConfig::builder(shard())
            .sample_probability(0.25)
            .bucket("audit-bucket")
            .key_prefix("experiment-read-tests-")
            .period("19625")
            .pool_capacity(4)
            .build()
            .unwrap();
        assert_eq!(config.sample_probability(), 0.25);
        assert_eq!(config.bucket(), "audit-bucket");
        assert_eq!(config.key_prefix(), "experiment-read-tests-");
        assert_eq!(config.period(), "19625");
        assert_eq!(config.pool_capacity(), 4);
    }

    #[test]
    fn test_invalid_probability_is_fatal() {
        assert!(RuntimeConfig::builder(shard())
            .sample_probability(0.0)
            .build()
            .is_err());
        assert!(RuntimeConfig::builder(shard())
            .sample_probability(1.5)
            .build()
            .is_err());
    }

    #[test]
    fn test_zero_pool_capacity_is_fatal() {
        assert!(RuntimeConfig::builder(shard())
            .pool_capacity(0)
            .build()
            .is_err());
    }
}
