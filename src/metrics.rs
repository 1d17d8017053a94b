//! Concurrent metric aggregation for the verification run.
//!
//! Every counter is monotonically increasing and safe under unbounded
//! concurrent access from worker tasks: unlabeled counters are plain
//! atomics, labeled counters live in a lock-free map keyed by
//! (experiment, query). Counters are never decremented or reset; a new
//! run starts a fresh [`Metrics`] instance.
//!
//! Increments are independent, associative, and commutative, which is why
//! relaxed atomic adds are the only synchronization needed. The external
//! scraper consumes [`Metrics::snapshot`]; the export protocol itself is
//! out of scope.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;

/// Label pair identifying one (experiment, query) cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MetricLabels {
    /// Experiment name.
    pub experiment: String,
    /// Query experiment name.
    pub query: String,
}

impl MetricLabels {
    /// Build a label pair.
    #[must_use]
    pub fn new(experiment: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            experiment: experiment.into(),
            query: query.into(),
        }
    }
}

/// Log2-bucketed distribution: bucket `k` counts values in `[2^k, 2^(k+1))`.
///
/// Order-of-magnitude precision is enough for a chunks-per-series shape;
/// recording is one relaxed add.
#[derive(Debug)]
pub struct Log2Histogram {
    buckets: [AtomicU64; 64],
    count: AtomicU64,
    sum: AtomicU64,
}

impl Default for Log2Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Log2Histogram {
    /// Create an empty histogram.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
        }
    }

    /// Record one observation.
    pub fn observe(&self, value: u64) {
        let bucket = (64 - value.leading_zeros()).saturating_sub(1) as usize;
        self.buckets[bucket.min(63)].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(value, Ordering::Relaxed);
    }

    /// Point-in-time view.
    #[must_use]
    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot {
            buckets: self
                .buckets
                .iter()
                .map(|b| b.load(Ordering::Relaxed))
                .collect(),
            count: self.count.load(Ordering::Relaxed),
            sum: self.sum.load(Ordering::Relaxed),
        }
    }
}

/// Serializable histogram state.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramSnapshot {
    /// Per-bucket observation counts.
    pub buckets: Vec<u64>,
    /// Total observations.
    pub count: u64,
    /// Sum of observed values.
    pub sum: u64,
}

/// Run-wide metric aggregator shared by every worker task.
#[derive(Debug, Default)]
pub struct Metrics {
    tenants: AtomicU64,
    series_seen: AtomicU64,
    series_analyzed: AtomicU64,
    chunks_seen: AtomicU64,
    chunks_analyzed: AtomicU64,
    filter_full_matches: DashMap<MetricLabels, AtomicU64>,
    ground_truth_line_matches: DashMap<MetricLabels, AtomicU64>,
    ground_truth_matching_chunks: DashMap<MetricLabels, AtomicU64>,
    chunks_per_series: Log2Histogram,
}

impl Metrics {
    /// Create a fresh aggregator for one run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the tenant population of the run.
    pub fn add_tenants(&self, n: u64) {
        self.tenants.fetch_add(n, Ordering::Relaxed);
    }

    /// Record one enumerated series.
    pub fn inc_series_seen(&self) {
        self.series_seen.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one series surviving sampling AND chunk fetch.
    pub fn inc_series_analyzed(&self) {
        self.series_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record enumerated chunk metadata.
    pub fn add_chunks_seen(&self, n: u64) {
        self.chunks_seen.fetch_add(n, Ordering::Relaxed);
    }

    /// Record chunks actually fetched and verified.
    pub fn add_chunks_analyzed(&self, n: u64) {
        self.chunks_analyzed.fetch_add(n, Ordering::Relaxed);
    }

    /// Record the owned-shard chunk count of one analyzed series.
    pub fn observe_chunks_per_series(&self, n: u64) {
        self.chunks_per_series.observe(n);
    }

    /// Record one series-level full filter match.
    pub fn inc_filter_full_matches(&self, experiment: &str, query: &str) {
        Self::add_labeled(&self.filter_full_matches, experiment, query, 1);
    }

    /// Record ground-truth line matches for one series.
    pub fn add_ground_truth_line_matches(&self, experiment: &str, query: &str, n: u64) {
        Self::add_labeled(&self.ground_truth_line_matches, experiment, query, n);
    }

    /// Record chunks with at least one ground-truth line match.
    pub fn add_ground_truth_matching_chunks(&self, experiment: &str, query: &str, n: u64) {
        Self::add_labeled(&self.ground_truth_matching_chunks, experiment, query, n);
    }

    fn add_labeled(map: &DashMap<MetricLabels, AtomicU64>, experiment: &str, query: &str, n: u64) {
        if n == 0 {
            return;
        }
        map.entry(MetricLabels::new(experiment, query))
            .or_default()
            .fetch_add(n, Ordering::Relaxed);
    }

    fn load_labeled(
        map: &DashMap<MetricLabels, AtomicU64>,
        experiment: &str,
        query: &str,
    ) -> u64 {
        map.get(&MetricLabels::new(experiment, query))
            .map_or(0, |entry| entry.value().load(Ordering::Relaxed))
    }

    /// Current series-seen count.
    #[must_use]
    pub fn series_seen(&self) -> u64 {
        self.series_seen.load(Ordering::Relaxed)
    }

    /// Current series-analyzed count.
    #[must_use]
    pub fn series_analyzed(&self) -> u64 {
        self.series_analyzed.load(Ordering::Relaxed)
    }

    /// Current chunks-seen count.
    #[must_use]
    pub fn chunks_seen(&self) -> u64 {
        self.chunks_seen.load(Ordering::Relaxed)
    }

    /// Current chunks-analyzed count.
    #[must_use]
    pub fn chunks_analyzed(&self) -> u64 {
        self.chunks_analyzed.load(Ordering::Relaxed)
    }

    /// Current filter-full-match count for one label pair.
    #[must_use]
    pub fn filter_full_matches(&self, experiment: &str, query: &str) -> u64 {
        Self::load_labeled(&self.filter_full_matches, experiment, query)
    }

    /// Current ground-truth line-match count for one label pair.
    #[must_use]
    pub fn ground_truth_line_matches(&self, experiment: &str, query: &str) -> u64 {
        Self::load_labeled(&self.ground_truth_line_matches, experiment, query)
    }

    /// Current ground-truth matching-chunk count for one label pair.
    #[must_use]
    pub fn ground_truth_matching_chunks(&self, experiment: &str, query: &str) -> u64 {
        Self::load_labeled(&self.ground_truth_matching_chunks, experiment, query)
    }

    /// Serializable point-in-time view for the external scraper.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tenants: self.tenants.load(Ordering::Relaxed),
            series_seen: self.series_seen(),
            series_analyzed: self.series_analyzed(),
            chunks_seen: self.chunks_seen(),
            chunks_analyzed: self.chunks_analyzed(),
            filter_full_matches: Self::labeled_snapshot(&self.filter_full_matches),
            ground_truth_line_matches: Self::labeled_snapshot(&self.ground_truth_line_matches),
            ground_truth_matching_chunks: Self::labeled_snapshot(
                &self.ground_truth_matching_chunks,
            ),
            chunks_per_series: self.chunks_per_series.snapshot(),
        }
    }

    fn labeled_snapshot(map: &DashMap<MetricLabels, AtomicU64>) -> Vec<LabeledValue> {
        let mut values: Vec<LabeledValue> = map
            .iter()
            .map(|entry| LabeledValue {
                labels: entry.key().clone(),
                value: entry.value().load(Ordering::Relaxed),
            })
            .collect();
        values.sort_by(|a, b| {
            (&a.labels.experiment, &a.labels.query).cmp(&(&b.labels.experiment, &b.labels.query))
        });
        values
    }
}

/// One labeled counter cell at snapshot time.
#[derive(Debug, Clone, Serialize)]
pub struct LabeledValue {
    /// The (experiment, query) pair.
    pub labels: MetricLabels,
    /// Counter value.
    pub value: u64,
}

/// Serializable point-in-time view of every counter.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Tenant population.
    pub tenants: u64,
    /// Series enumerated.
    pub series_seen: u64,
    /// Series surviving sampling and chunk fetch.
    pub series_analyzed: u64,
    /// Chunk metadata enumerated.
    pub chunks_seen: u64,
    /// Chunks fetched and verified.
    pub chunks_analyzed: u64,
    /// Series-level full filter matches per label pair.
    pub filter_full_matches: Vec<LabeledValue>,
    /// Ground-truth line matches per label pair.
    pub ground_truth_line_matches: Vec<LabeledValue>,
    /// Ground-truth matching chunks per label pair.
    pub ground_truth_matching_chunks: Vec<LabeledValue>,
    /// Owned-shard chunk count distribution.
    pub chunks_per_series: HistogramSnapshot,
}
