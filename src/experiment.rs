//! Experiment and query registries.
//!
//! Both registries are fixed at startup and never mutated during a run:
//! an [`Experiment`] names the tokenizer/filter pairing under test, a
//! [`QueryExperiment`] names the literal search string used both for
//! filter probing and ground-truth scanning.

use std::sync::Arc;

use crate::filter::FilterCodec;
use crate::tokenizer::{NGramTokenizer, Tokenizer};
use crate::{Error, Result};

/// One tokenizer/filter configuration under accuracy test.
#[derive(Clone)]
pub struct Experiment {
    name: String,
    tokenizer: Arc<dyn Tokenizer>,
    codec: FilterCodec,
    encode_chunk_id: bool,
}

impl Experiment {
    /// Define an experiment.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        tokenizer: Arc<dyn Tokenizer>,
        codec: FilterCodec,
        encode_chunk_id: bool,
    ) -> Self {
        Self {
            name: name.into(),
            tokenizer,
            codec,
            encode_chunk_id,
        }
    }

    /// Experiment name, also part of the artifact key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The tokenizer capability, unscoped.
    #[must_use]
    pub fn tokenizer(&self) -> Arc<dyn Tokenizer> {
        Arc::clone(&self.tokenizer)
    }

    /// Encoding of this experiment's persisted filter artifacts.
    #[must_use]
    pub fn codec(&self) -> FilterCodec {
        self.codec
    }

    /// Whether the filter writer scoped tokens to chunk identity.
    #[must_use]
    pub fn encode_chunk_id(&self) -> bool {
        self.encode_chunk_id
    }
}

impl std::fmt::Debug for Experiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Experiment")
            .field("name", &self.name)
            .field("codec", &self.codec)
            .field("encode_chunk_id", &self.encode_chunk_id)
            .finish_non_exhaustive()
    }
}

/// Named literal search string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryExperiment {
    name: String,
    search_string: String,
}

impl QueryExperiment {
    /// Define a query experiment.
    #[must_use]
    pub fn new(name: impl Into<String>, search_string: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            search_string: search_string.into(),
        }
    }

    /// Metric label for this query.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The literal substring probed and scanned for.
    #[must_use]
    pub fn search_string(&self) -> &str {
        &self.search_string
    }
}

/// Process-wide, immutable experiment matrix.
#[derive(Debug)]
pub struct ExperimentRegistry {
    experiments: Vec<Experiment>,
    queries: Vec<QueryExperiment>,
}

impl ExperimentRegistry {
    /// Build a registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when either list is empty or an
    /// experiment name repeats (names key metrics and artifact paths, so
    /// duplicates would alias).
    pub fn new(experiments: Vec<Experiment>, queries: Vec<QueryExperiment>) -> Result<Self> {
        if experiments.is_empty() {
            return Err(Error::Config("experiment registry is empty".to_string()));
        }
        if queries.is_empty() {
            return Err(Error::Config("query registry is empty".to_string()));
        }
        let mut names: Vec<&str> = experiments.iter().map(Experiment::name).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != experiments.len() {
            return Err(Error::Config("duplicate experiment names".to_string()));
        }
        Ok(Self {
            experiments,
            queries,
        })
    }

    /// The default matrix: 3-gram tokenizers with and without chunk-id
    /// scoping, scalable-bloom artifacts.
    ///
    /// # Errors
    ///
    /// Never fails in practice; kept fallible for uniformity with
    /// [`ExperimentRegistry::new`].
    pub fn default_matrix() -> Result<Self> {
        let trigram = NGramTokenizer::new(3, 0);
        let name =
            |index_chunks: bool| format!("{}_error=1%_indexchunks={index_chunks}", trigram.descriptor());
        let shared: Arc<dyn Tokenizer> = Arc::new(trigram);
        Self::new(
            vec![
                Experiment::new(name(true), Arc::clone(&shared), FilterCodec::Scalable, true),
                Experiment::new(name(false), shared, FilterCodec::Scalable, false),
            ],
            vec![QueryExperiment::new(
                "specific_uuid",
                "2b1a5e46-36a2-4694-a4b1-f34cc7bdfc45",
            )],
        )
    }

    /// Experiments in definition order.
    #[must_use]
    pub fn experiments(&self) -> &[Experiment] {
        &self.experiments
    }

    /// Queries in definition order.
    #[must_use]
    pub fn queries(&self) -> &[QueryExperiment] {
        &self.queries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experiment(name: &str) -> Experiment {
        Experiment::new(
            name,
            Arc::new(NGramTokenizer::new(3, 0)),
            FilterCodec::Scalable,
            false,
        )
    }

    #[test]
    fn test_registry_rejects_empty() {
        assert!(ExperimentRegistry::new(vec![], vec![QueryExperiment::new("q", "x")]).is_err());
        assert!(ExperimentRegistry::new(vec![experiment("a")], vec![]).is_err());
    }

    #[test]
    fn test_registry_rejects_duplicate_names() {
        let result = ExperimentRegistry::new(
            vec![experiment("a"), experiment("a")],
            vec![QueryExperiment::new("q", "x")],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_default_matrix_builds() {
        let registry = ExperimentRegistry::default_matrix().unwrap();
        assert_eq!(registry.experiments().len(), 2);
        assert_eq!(registry.queries().len(), 1);
        assert!(registry.experiments()[0].encode_chunk_id());
        assert!(!registry.experiments()[1].encode_chunk_id());
    }

    #[test]
    fn test_default_matrix_names_follow_tokenizer_descriptor() {
        let registry = ExperimentRegistry::default_matrix().unwrap();
        assert_eq!(
            registry.experiments()[0].name(),
            "token=3skip0_error=1%_indexchunks=true"
        );
        assert_eq!(
            registry.experiments()[1].name(),
            "token=3skip0_error=1%_indexchunks=false"
        );
    }
}
