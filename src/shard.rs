//! Deterministic chunk sharding across cooperating instances.
//!
//! Every instance computes the same [`partition`] of a series' chunk
//! sequence from the sequence and the instance total alone; instance `i`
//! processes shard `i`. No cross-instance communication is required: the
//! union of all shards covers the chunk set exactly once as long as every
//! instance runs with the same `total`.
//!
//! Splitting rule: contiguous blocks (the first `len % total` shards carry
//! one extra element). Contiguous blocking keeps each instance's chunks
//! adjacent in storage; any rule satisfying coverage-without-overlap would
//! be equally correct.

use std::ops::Range;

use crate::{Error, Result};

/// Which shard this instance owns: ordinal index and fleet total.
///
/// Derived from environment at startup; the sharding invariant only holds
/// when every instance agrees on `total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardAssignment {
    ordinal: u32,
    total: u32,
}

impl ShardAssignment {
    /// Create an assignment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidShardAssignment`] unless `ordinal < total`.
    pub fn new(ordinal: u32, total: u32) -> Result<Self> {
        if total == 0 || ordinal >= total {
            return Err(Error::InvalidShardAssignment { ordinal, total });
        }
        Ok(Self { ordinal, total })
    }

    /// Parse the ordinal from a hostname with a numeric suffix
    /// (`bloom-audit-3` → ordinal 3), the convention used by stateful-set
    /// style deployments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the hostname carries no numeric
    /// suffix, and [`Error::InvalidShardAssignment`] when the parsed
    /// ordinal is not below `total`.
    pub fn from_hostname(hostname: &str, total: u32) -> Result<Self> {
        let ordinal = hostname
            .rsplit('-')
            .next()
            .and_then(|suffix| suffix.parse::<u32>().ok())
            .ok_or_else(|| {
                Error::Config(format!("hostname {hostname:?} has no numeric ordinal suffix"))
            })?;
        Self::new(ordinal, total)
    }

    /// Ordinal index of this instance.
    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Total number of cooperating instances.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// The slice of `items` this instance owns, by value.
    #[must_use]
    pub fn owned_shard<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let bounds = partition_bounds(items.len(), self.total as usize);
        items[bounds[self.ordinal as usize].clone()].to_vec()
    }
}

/// Index ranges of the contiguous-block partition of `len` elements into
/// `shard_count` shards. Sizes differ by at most one; shards past the
/// element count are empty.
///
/// # Panics
///
/// Panics if `shard_count` is zero.
#[must_use]
pub fn partition_bounds(len: usize, shard_count: usize) -> Vec<Range<usize>> {
    assert!(shard_count > 0, "shard_count must be positive");
    let base = len / shard_count;
    let remainder = len % shard_count;
    let mut bounds = Vec::with_capacity(shard_count);
    let mut start = 0;
    for shard in 0..shard_count {
        let size = base + usize::from(shard < remainder);
        bounds.push(start..start + size);
        start += size;
    }
    bounds
}

/// Split `items` into `shard_count` near-equal, order-preserving shards.
///
/// Pure and deterministic: the same input always yields the same
/// partition, which is what lets stateless instances agree on ownership
/// without coordination. Empty shards are produced when
/// `items.len() < shard_count`.
///
/// # Panics
///
/// Panics if `shard_count` is zero.
#[must_use]
pub fn partition<T: Clone>(items: &[T], shard_count: usize) -> Vec<Vec<T>> {
    partition_bounds(items.len(), shard_count)
        .into_iter()
        .map(|range| items[range].to_vec())
        .collect()
}
