//! Experiment matcher: filter loading and token evaluation per series.
//!
//! For each (series, experiment) the matcher walks a small state machine:
//!
//! ```text
//! NotLoaded ── artifact exists ──► FilterLoaded ──► Evaluated (terminal)
//!     │
//!     └────── artifact absent ───► Skipped (terminal, no metric)
//! ```
//!
//! Existence-check and fetch are two explicit store calls so a missing
//! artifact costs no transfer. The verdict per query is a full match iff
//! at least one token was produced AND every token tests positive —
//! partial agreement does not count, so one absent token lets the filter
//! stay correctly negative rather than inflate false positives.

use crate::experiment::{Experiment, QueryExperiment};
use crate::filter::ScalableBloomFilter;
use crate::series::Series;
use crate::store::ObjectStore;
use crate::tokenizer::{ChunkScopedTokenizer, Tokenizer};
use crate::{Error, Result};

/// First/last fingerprint and timestamp bounds of one owned shard, the
/// variable part of the artifact key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardBounds {
    /// Fingerprint of the first chunk's series.
    pub first_fp: u64,
    /// Fingerprint of the last chunk's series.
    pub last_fp: u64,
    /// `from` of the first owned chunk (ms).
    pub first_from: i64,
    /// `through` of the last owned chunk (ms).
    pub last_through: i64,
}

impl ShardBounds {
    /// Bounds of a series' owned shard; `None` when the shard is empty.
    ///
    /// One series means one fingerprint, so both fingerprint bounds are
    /// the series fingerprint.
    #[must_use]
    pub fn of_series(series: &Series) -> Option<Self> {
        let first = series.chunks.first()?;
        let last = series.chunks.last()?;
        Some(Self {
            first_fp: series.fingerprint,
            last_fp: series.fingerprint,
            first_from: first.from,
            last_through: last.through,
        })
    }
}

/// Deterministic storage key of one experiment's filter artifact:
/// `{root}/{prefix}{experiment}/{period}/{tenant}/{first_fp}-{last_fp}-{first_ts}-{last_ts}-chksum`.
#[must_use]
pub fn artifact_key(
    root: &str,
    prefix: &str,
    experiment: &str,
    period: &str,
    tenant: &str,
    bounds: &ShardBounds,
) -> String {
    format!(
        "{root}/{prefix}{experiment}/{period}/{tenant}/{}-{}-{}-{}-chksum",
        bounds.first_fp, bounds.last_fp, bounds.first_from, bounds.last_through
    )
}

/// Observable matcher state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatcherState {
    /// No store call made yet.
    NotLoaded,
    /// Artifact fetched and decoded; ready to evaluate.
    FilterLoaded,
    /// Artifact absent; terminal, excluded from match metrics.
    Skipped,
    /// All queries evaluated; terminal.
    Evaluated,
}

/// Verdict for one query against one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryVerdict {
    /// Query experiment name.
    pub query: String,
    /// Whether every produced token tested positive.
    pub full_match: bool,
}

/// Per-(series, experiment) matcher.
pub struct SeriesMatcher<'a> {
    experiment: &'a Experiment,
    state: State,
}

enum State {
    NotLoaded,
    FilterLoaded(ScalableBloomFilter),
    Skipped,
    Evaluated,
}

impl<'a> SeriesMatcher<'a> {
    /// Create a matcher in the `NotLoaded` state.
    #[must_use]
    pub fn new(experiment: &'a Experiment) -> Self {
        Self {
            experiment,
            state: State::NotLoaded,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> MatcherState {
        match self.state {
            State::NotLoaded => MatcherState::NotLoaded,
            State::FilterLoaded(_) => MatcherState::FilterLoaded,
            State::Skipped => MatcherState::Skipped,
            State::Evaluated => MatcherState::Evaluated,
        }
    }

    /// Check for and load the experiment's filter artifact at `key`.
    ///
    /// Transitions to `FilterLoaded`, or to the terminal `Skipped` when
    /// the artifact does not exist.
    ///
    /// # Errors
    ///
    /// Propagates store failures and [`Error::FilterDecode`] on a corrupt
    /// artifact; the caller logs and skips this experiment.
    pub async fn load<O: ObjectStore>(&mut self, store: &O, key: &str) -> Result<MatcherState> {
        if !matches!(self.state, State::NotLoaded) {
            return Err(Error::Other(
                "matcher already loaded or terminal".to_string(),
            ));
        }
        if !store.exists(key).await? {
            self.state = State::Skipped;
            return Ok(MatcherState::Skipped);
        }
        let bytes = store.get(key).await?;
        let filter = self.experiment.codec().decode(&bytes)?;
        self.state = State::FilterLoaded(filter);
        Ok(MatcherState::FilterLoaded)
    }

    /// Evaluate every query against the loaded filter, transitioning to
    /// the terminal `Evaluated` state.
    ///
    /// When the experiment encodes chunk identity, tokens are scoped to
    /// the first owned chunk (the filter models per-chunk membership and
    /// one probe per series suffices for a series-level verdict);
    /// otherwise the experiment's shared tokenizer is used unscoped.
    ///
    /// # Errors
    ///
    /// Fails unless the matcher is in `FilterLoaded`.
    pub fn evaluate(
        &mut self,
        series: &Series,
        queries: &[QueryExperiment],
    ) -> Result<Vec<QueryVerdict>> {
        let State::FilterLoaded(filter) = &self.state else {
            return Err(Error::Other(
                "matcher must be in FilterLoaded to evaluate".to_string(),
            ));
        };

        let unscoped = self.experiment.tokenizer();
        let scoped;
        let tokenizer: &dyn Tokenizer =
            match (self.experiment.encode_chunk_id(), series.chunks.first()) {
                (true, Some(chunk)) => {
                    scoped = ChunkScopedTokenizer::new(
                        std::sync::Arc::clone(&unscoped),
                        series.fingerprint,
                        chunk,
                    );
                    &scoped
                }
                _ => unscoped.as_ref(),
            };

        let verdicts = queries
            .iter()
            .map(|query| {
                let tokens = tokenizer.tokens(query.search_string());
                let full_match =
                    !tokens.is_empty() && tokens.iter().all(|token| filter.test(token.key()));
                QueryVerdict {
                    query: query.name().to_string(),
                    full_match,
                }
            })
            .collect();

        self.state = State::Evaluated;
        Ok(verdicts)
    }
}
