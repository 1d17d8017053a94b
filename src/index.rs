//! Series index enumeration seam.
//!
//! The index collaborator enumerates tenants and walks series per tenant,
//! handing the visitor borrowed [`SeriesRef`] views. The enumerator may
//! reuse its buffers between visits, so a visitor must copy anything it
//! retains beyond the visit's extent (see [`SeriesRef::to_owned_series`]).

use std::future::Future;

use crate::series::{ChunkDescriptor, Series, SeriesRef};
use crate::Result;

/// Receiver of one series per visit.
///
/// `visit` is async so the pipeline's visitor can park on worker-pool
/// admission, which is what propagates backpressure up into index
/// iteration.
pub trait SeriesVisitor: Send {
    /// Handle one series. The borrowed view is only valid until the
    /// returned future completes.
    fn visit(&mut self, series: SeriesRef<'_>) -> impl Future<Output = ()> + Send;
}

/// Index enumeration as consumed by the pipeline.
pub trait SeriesIndex: Send + Sync {
    /// All tenants present in the index.
    fn tenants(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Walk every series of `tenant`, visiting each exactly once.
    fn for_each_series<V: SeriesVisitor>(
        &self,
        tenant: &str,
        visitor: &mut V,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// In-memory index for tests and local runs.
#[derive(Debug, Default)]
pub struct MemorySeriesIndex {
    tenants: Vec<(String, Vec<Series>)>,
}

impl MemorySeriesIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one series under `tenant`. Tenants appear in first-insert
    /// order, series in insert order.
    pub fn push_series(
        &mut self,
        tenant: impl Into<String>,
        labels: Vec<(String, String)>,
        fingerprint: u64,
        chunks: Vec<ChunkDescriptor>,
    ) {
        let tenant = tenant.into();
        let series = Series {
            labels,
            fingerprint,
            chunks,
        };
        match self.tenants.iter_mut().find(|(name, _)| *name == tenant) {
            Some((_, list)) => list.push(series),
            None => self.tenants.push((tenant, vec![series])),
        }
    }
}

impl SeriesIndex for MemorySeriesIndex {
    async fn tenants(&self) -> Result<Vec<String>> {
        Ok(self.tenants.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn for_each_series<V: SeriesVisitor>(
        &self,
        tenant: &str,
        visitor: &mut V,
    ) -> Result<()> {
        let Some((_, series_list)) = self.tenants.iter().find(|(name, _)| name == tenant) else {
            return Ok(());
        };
        for series in series_list {
            visitor
                .visit(SeriesRef {
                    labels: &series.labels,
                    fingerprint: series.fingerprint,
                    chunks: &series.chunks,
                })
                .await;
        }
        Ok(())
    }
}
