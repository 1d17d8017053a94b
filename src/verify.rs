//! Ground-truth verification by literal scanning.
//!
//! The authoritative signal against which filter verdicts are judged:
//! decoded log lines are scanned for the exact query substring,
//! case-sensitively, with no regex and no tokenization, so the result is
//! independent of any filter or tokenizer under test.

use crate::series::Series;
use crate::store::ChunkDecoder;
use crate::QueryExperiment;

/// Count decoded lines containing `query` as a literal substring.
#[must_use]
pub fn count_line_matches(lines: &[String], query: &str) -> u64 {
    lines.iter().filter(|line| line.contains(query)).count() as u64
}

/// Ground-truth result for one series' owned shard against one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroundTruth {
    /// Total matching lines across all decoded chunks.
    pub line_matches: u64,
    /// Chunks with at least one matching line.
    pub matching_chunks: u64,
}

/// Decoded owned-shard payloads for one series.
///
/// Chunks that failed to decode are dropped at construction (logged by
/// the caller); verification runs over the survivors only.
#[derive(Debug, Default)]
pub struct DecodedChunks {
    chunks: Vec<Vec<String>>,
}

impl DecodedChunks {
    /// Decode every fetched payload with `decoder`, skipping failures.
    ///
    /// `payloads` pairs each of the series' owned chunks with its raw
    /// bytes. Returns the decoded chunks plus the number skipped.
    pub fn decode<D: ChunkDecoder>(
        decoder: &D,
        series: &Series,
        payloads: &[Vec<u8>],
    ) -> (Self, u64) {
        let mut chunks = Vec::with_capacity(payloads.len());
        let mut skipped = 0;
        for (descriptor, bytes) in series.chunks.iter().zip(payloads) {
            match decoder.decode(bytes) {
                Ok(lines) => chunks.push(lines),
                Err(e) => {
                    tracing::warn!(
                        fingerprint = series.fingerprint,
                        reference = descriptor.reference.as_str(),
                        error = %e,
                        "chunk decode failed; skipping chunk"
                    );
                    skipped += 1;
                }
            }
        }
        (Self { chunks }, skipped)
    }

    /// Number of successfully decoded chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether nothing decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Scan every decoded chunk for the query's literal substring.
    #[must_use]
    pub fn verify(&self, query: &QueryExperiment) -> GroundTruth {
        let mut truth = GroundTruth::default();
        for lines in &self.chunks {
            let matches = count_line_matches(lines, query.search_string());
            truth.line_matches += matches;
            if matches > 0 {
                truth.matching_chunks += 1;
            }
        }
        truth
    }
}
