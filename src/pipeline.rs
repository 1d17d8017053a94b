//! The verification pipeline: tenants → series → owned shard → workers.
//!
//! A single producer loop walks the index; for every sampled series it
//! partitions the chunk sequence, copies the owned shard, and submits one
//! task to the bounded worker pool (parking on admission — the sole
//! backpressure). Each task fetches its chunk payloads, evaluates the
//! experiment matrix against the persisted filters, re-derives ground
//! truth by literal scanning, and folds the results into the shared
//! metrics. After the last tenant the pool is drained and `run` returns;
//! flushing/scraping the metrics afterwards is the caller's concern.
//!
//! Error containment follows the taxonomy in [`crate::error`]: a tenant
//! iteration failure costs that tenant, a chunk fetch failure costs that
//! series' remaining metrics, a decode failure costs one chunk, and a
//! missing filter artifact is silently excluded. A worker task always
//! completes so the drain barrier stays a correct completion signal.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::experiment::ExperimentRegistry;
use crate::index::{SeriesIndex, SeriesVisitor};
use crate::matcher::{artifact_key, MatcherState, SeriesMatcher, ShardBounds};
use crate::metrics::Metrics;
use crate::pool::WorkerPool;
use crate::sampler::ProbabilisticSampler;
use crate::series::{Series, SeriesRef};
use crate::shard::ShardAssignment;
use crate::store::{ChunkDecoder, ObjectStore};
use crate::verify::DecodedChunks;
use crate::{Error, Result};

/// One accuracy-verification run over the corpus.
pub struct Pipeline<I, O, D> {
    config: RuntimeConfig,
    registry: Arc<ExperimentRegistry>,
    index: Arc<I>,
    ctx: Arc<WorkerCtx<O, D>>,
}

/// Everything a worker task needs, shared behind one `Arc`.
struct WorkerCtx<O, D> {
    registry: Arc<ExperimentRegistry>,
    store: Arc<O>,
    decoder: Arc<D>,
    metrics: Arc<Metrics>,
    key_root: String,
    key_prefix: String,
    period: String,
}

impl<I, O, D> Pipeline<I, O, D>
where
    I: SeriesIndex,
    O: ObjectStore + 'static,
    D: ChunkDecoder + 'static,
{
    /// Assemble a pipeline over the external collaborators.
    #[must_use]
    pub fn new(
        config: RuntimeConfig,
        registry: Arc<ExperimentRegistry>,
        index: Arc<I>,
        store: Arc<O>,
        decoder: Arc<D>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let ctx = Arc::new(WorkerCtx {
            registry: Arc::clone(&registry),
            store,
            decoder,
            metrics,
            key_root: config.key_root().to_string(),
            key_prefix: config.key_prefix().to_string(),
            period: config.period().to_string(),
        });
        Self {
            config,
            registry,
            index,
            ctx,
        }
    }

    /// The shared metric aggregator (for the scrape surface).
    #[must_use]
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.ctx.metrics)
    }

    /// Run the full verification: enumerate, shard, verify, drain.
    ///
    /// # Errors
    ///
    /// Only startup-grade failures surface: an invalid sampling
    /// probability or a failure to enumerate tenants at all. Everything
    /// further in is contained per the error taxonomy.
    pub async fn run(&self) -> Result<()> {
        let sampler = ProbabilisticSampler::new(self.config.sample_probability())?;
        let pool = WorkerPool::new(self.config.pool_capacity());
        let shard = self.config.shard();

        let tenants = self.index.tenants().await?;
        self.ctx.metrics.add_tenants(tenants.len() as u64);
        info!(
            ordinal = shard.ordinal(),
            total = shard.total(),
            tenants = tenants.len(),
            experiments = self.registry.experiments().len(),
            queries = self.registry.queries().len(),
            "starting verification run"
        );

        for tenant in &tenants {
            info!(tenant = %tenant, period = self.ctx.period.as_str(), "analyzing tenant");
            let mut submitter = SeriesSubmitter {
                tenant: tenant.clone(),
                sampler,
                shard,
                pool: &pool,
                ctx: Arc::clone(&self.ctx),
            };
            if let Err(e) = self.index.for_each_series(tenant, &mut submitter).await {
                let e = Error::TenantIteration {
                    tenant: tenant.clone(),
                    source: Box::new(e),
                };
                warn!(error = %e, "tenant aborted");
            }
        }

        info!("waiting for workers to finish");
        pool.drain().await;
        info!("verification run complete");
        Ok(())
    }
}

/// Producer-side visitor: samples, shards, copies, submits.
struct SeriesSubmitter<'a, O, D> {
    tenant: String,
    sampler: ProbabilisticSampler,
    shard: ShardAssignment,
    pool: &'a WorkerPool,
    ctx: Arc<WorkerCtx<O, D>>,
}

impl<O, D> SeriesVisitor for SeriesSubmitter<'_, O, D>
where
    O: ObjectStore + 'static,
    D: ChunkDecoder + 'static,
{
    async fn visit(&mut self, series: SeriesRef<'_>) {
        let metrics = &self.ctx.metrics;
        metrics.inc_series_seen();
        metrics.add_chunks_seen(series.chunks.len() as u64);

        if !self.sampler.sample() {
            return;
        }
        let owned_chunks = self.shard.owned_shard(series.chunks);
        if owned_chunks.is_empty() {
            return;
        }
        // Copy out of the enumerator's buffers before crossing the task
        // boundary.
        let owned = series.to_owned_series(owned_chunks);

        let task = process_series(Arc::clone(&self.ctx), self.tenant.clone(), owned);
        if let Err(e) = self.pool.submit(task).await {
            // Unreachable while the run owns the pool; drain happens after
            // the producer loop.
            warn!(error = %e, "series submission rejected");
        }
    }
}

/// Resolve every owned chunk's payload, surfacing any store failure as a
/// single wrapped [`Error::ChunkFetch`] for the series.
async fn fetch_payloads<O: ObjectStore>(store: &O, series: &Series) -> Result<Vec<Vec<u8>>> {
    let mut payloads = Vec::with_capacity(series.chunks.len());
    for chunk in &series.chunks {
        let bytes = store
            .get(chunk.reference.as_str())
            .await
            .map_err(|e| Error::ChunkFetch {
                reference: chunk.reference.as_str().to_string(),
                reason: e.to_string(),
            })?;
        payloads.push(bytes);
    }
    Ok(payloads)
}

/// One worker task: fetch, match, verify, aggregate.
async fn process_series<O, D>(ctx: Arc<WorkerCtx<O, D>>, tenant: String, series: Series)
where
    O: ObjectStore,
    D: ChunkDecoder,
{
    let payloads = match fetch_payloads(ctx.store.as_ref(), &series).await {
        Ok(payloads) => payloads,
        Err(e) => {
            warn!(
                tenant = %tenant,
                fingerprint = series.fingerprint,
                error = %e,
                "skipping series"
            );
            return;
        }
    };

    let metrics = &ctx.metrics;
    metrics.inc_series_analyzed();
    metrics.add_chunks_analyzed(series.chunks.len() as u64);
    metrics.observe_chunks_per_series(series.chunks.len() as u64);

    let Some(bounds) = ShardBounds::of_series(&series) else {
        return;
    };
    let (decoded, _skipped) = DecodedChunks::decode(ctx.decoder.as_ref(), &series, &payloads);

    for experiment in ctx.registry.experiments() {
        let key = artifact_key(
            &ctx.key_root,
            &ctx.key_prefix,
            experiment.name(),
            &ctx.period,
            &tenant,
            &bounds,
        );
        let mut matcher = SeriesMatcher::new(experiment);
        match matcher.load(ctx.store.as_ref(), &key).await {
            Ok(MatcherState::Skipped) => continue,
            Ok(_) => {}
            Err(e) => {
                warn!(
                    tenant = %tenant,
                    experiment = experiment.name(),
                    key = %key,
                    error = %e,
                    "filter load failed; skipping experiment"
                );
                continue;
            }
        }

        let verdicts = match matcher.evaluate(&series, ctx.registry.queries()) {
            Ok(verdicts) => verdicts,
            Err(e) => {
                warn!(experiment = experiment.name(), error = %e, "evaluation failed");
                continue;
            }
        };

        for (query, verdict) in ctx.registry.queries().iter().zip(&verdicts) {
            // At most one full-match increment per series, however many
            // chunks or tokens agreed.
            if verdict.full_match {
                metrics.inc_filter_full_matches(experiment.name(), query.name());
            }
            let truth = decoded.verify(query);
            metrics.add_ground_truth_line_matches(
                experiment.name(),
                query.name(),
                truth.line_matches,
            );
            metrics.add_ground_truth_matching_chunks(
                experiment.name(),
                query.name(),
                truth.matching_chunks,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{Experiment, QueryExperiment};
    use crate::filter::{FilterCodec, ScalableBloomFilter};
    use crate::index::MemorySeriesIndex;
    use crate::series::{ChunkDescriptor, ChunkRef};
    use crate::store::{LineDecoder, MemoryObjectStore};
    use crate::tokenizer::NGramTokenizer;

    fn chunk(i: i64) -> ChunkDescriptor {
        ChunkDescriptor::new(i * 100, (i + 1) * 100, 0, ChunkRef::new(format!("chunks/{i}")))
    }

    fn registry() -> Arc<ExperimentRegistry> {
        Arc::new(
            ExperimentRegistry::new(
                vec![Experiment::new(
                    "exp",
                    Arc::new(NGramTokenizer::new(1, 0)),
                    FilterCodec::Scalable,
                    false,
                )],
                vec![QueryExperiment::new("q", "X")],
            )
            .unwrap(),
        )
    }

    fn pipeline_over(
        index: MemorySeriesIndex,
        store: MemoryObjectStore,
        shard: ShardAssignment,
    ) -> Pipeline<MemorySeriesIndex, MemoryObjectStore, LineDecoder> {
        let config = RuntimeConfig::builder(shard)
            .period("19625")
            .pool_capacity(2)
            .build()
            .unwrap();
        Pipeline::new(
            config,
            registry(),
            Arc::new(index),
            Arc::new(store),
            Arc::new(LineDecoder),
            Arc::new(Metrics::new()),
        )
    }

    #[tokio::test]
    async fn test_fetch_failure_surfaces_as_chunk_fetch() {
        let store = MemoryObjectStore::new();
        store.put("chunks/0", b"present".to_vec());
        let series = Series {
            labels: vec![],
            fingerprint: 1,
            chunks: vec![chunk(0), chunk(1)], // chunks/1 is absent
        };

        let err = fetch_payloads(&store, &series).await.unwrap_err();
        assert!(matches!(
            err,
            Error::ChunkFetch { ref reference, .. } if reference == "chunks/1"
        ));
    }

    #[tokio::test]
    async fn test_fetch_failure_contains_series() {
        let mut index = MemorySeriesIndex::new();
        index.push_series("t", vec![], 1, vec![chunk(0)]);
        // No chunk payload seeded: fetch fails, series stays unanalyzed.
        let pipeline = pipeline_over(index, MemoryObjectStore::new(), ShardAssignment::new(0, 1).unwrap());
        pipeline.run().await.unwrap();

        let metrics = pipeline.metrics();
        assert_eq!(metrics.series_seen(), 1);
        assert_eq!(metrics.series_analyzed(), 0);
        assert_eq!(metrics.chunks_analyzed(), 0);
    }

    #[tokio::test]
    async fn test_missing_filter_emits_no_match_metrics() {
        let mut index = MemorySeriesIndex::new();
        index.push_series("t", vec![], 1, vec![chunk(0)]);
        let store = MemoryObjectStore::new();
        store.put("chunks/0", b"X in here".to_vec());

        let pipeline = pipeline_over(index, store, ShardAssignment::new(0, 1).unwrap());
        pipeline.run().await.unwrap();

        let metrics = pipeline.metrics();
        assert_eq!(metrics.series_analyzed(), 1);
        assert_eq!(metrics.filter_full_matches("exp", "q"), 0);
        assert_eq!(metrics.ground_truth_line_matches("exp", "q"), 0);
    }

    #[tokio::test]
    async fn test_matching_run_counts_once_per_series() {
        let mut index = MemorySeriesIndex::new();
        index.push_series("t", vec![], 7, vec![chunk(0), chunk(1)]);
        let store = MemoryObjectStore::new();
        store.put("chunks/0", b"X here\nnothing".to_vec());
        store.put("chunks/1", b"also X\nand X again".to_vec());

        let mut filter = ScalableBloomFilter::with_slice(1 << 12, 3);
        filter.insert(b"X");
        store.put(
            "bloomtests/named-experiments-exp/19625/t/7-7-0-200-chksum",
            filter.encode(),
        );

        let pipeline = pipeline_over(index, store, ShardAssignment::new(0, 1).unwrap());
        pipeline.run().await.unwrap();

        let metrics = pipeline.metrics();
        assert_eq!(metrics.filter_full_matches("exp", "q"), 1);
        assert_eq!(metrics.ground_truth_line_matches("exp", "q"), 3);
        assert_eq!(metrics.ground_truth_matching_chunks("exp", "q"), 2);
    }
}
