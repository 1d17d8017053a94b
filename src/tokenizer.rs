//! Query tokenization capabilities for the experiment matrix.
//!
//! The tokenizer is an injectable capability: an experiment names one and
//! the matcher tests its tokens against the persisted filter. Two
//! implementations ship so the matrix is runnable out of the box — the
//! n-gram-with-skip shape the filter writers use, and a chunk-scoped
//! wrapper that prefixes every token with a chunk identity for
//! experiments whose filters encode chunk membership rather than series
//! membership.

use std::sync::Arc;

use crate::series::ChunkDescriptor;

/// A filter-testable token produced from a query string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    key: Vec<u8>,
}

impl Token {
    /// Wrap raw token bytes.
    #[must_use]
    pub fn new(key: Vec<u8>) -> Self {
        Self { key }
    }

    /// The bytes probed against the filter.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

/// Capability converting a query string into filter-testable tokens.
///
/// An empty token set is a legal output (e.g. a query shorter than the
/// n-gram width); the matcher treats it as a non-match.
pub trait Tokenizer: Send + Sync {
    /// Tokenize `query`.
    fn tokens(&self, query: &str) -> Vec<Token>;
}

/// Character n-grams with a skip stride.
///
/// `n = 3, skip = 0` over `"trace"` yields `tra`, `rac`, `ace`;
/// `skip = 1` advances two characters between grams.
#[derive(Debug, Clone, Copy)]
pub struct NGramTokenizer {
    n: usize,
    skip: usize,
}

impl NGramTokenizer {
    /// Create an n-gram tokenizer.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    #[must_use]
    pub fn new(n: usize, skip: usize) -> Self {
        assert!(n > 0, "n-gram width must be positive");
        Self { n, skip }
    }

    /// Conventional experiment-name fragment, e.g. `token=3skip0`.
    #[must_use]
    pub fn descriptor(&self) -> String {
        format!("token={}skip{}", self.n, self.skip)
    }
}

impl Tokenizer for NGramTokenizer {
    fn tokens(&self, query: &str) -> Vec<Token> {
        let chars: Vec<char> = query.chars().collect();
        if chars.len() < self.n {
            return Vec::new();
        }
        let mut tokens = Vec::new();
        let mut start = 0;
        while start + self.n <= chars.len() {
            let gram: String = chars[start..start + self.n].iter().collect();
            tokens.push(Token::new(gram.into_bytes()));
            start += self.skip + 1;
        }
        tokens
    }
}

/// Wrapper priming an inner tokenizer with one chunk's identity.
///
/// Used when an experiment's `encode_chunk_id` flag is set: the filter
/// writer scoped every inserted token to the chunk it came from, so the
/// matcher must probe with the same prefix. Built fresh per chunk — the
/// prefix is baked in at construction rather than mutated between calls.
pub struct ChunkScopedTokenizer {
    inner: Arc<dyn Tokenizer>,
    prefix: Vec<u8>,
}

impl ChunkScopedTokenizer {
    /// Scope `inner` to the identity of one chunk of one series.
    #[must_use]
    pub fn new(inner: Arc<dyn Tokenizer>, fingerprint: u64, chunk: &ChunkDescriptor) -> Self {
        let prefix = format!(
            "{}:{}:{}:{}:",
            fingerprint, chunk.from, chunk.through, chunk.checksum
        )
        .into_bytes();
        Self { inner, prefix }
    }
}

impl Tokenizer for ChunkScopedTokenizer {
    fn tokens(&self, query: &str) -> Vec<Token> {
        self.inner
            .tokens(query)
            .into_iter()
            .map(|token| {
                let mut key = Vec::with_capacity(self.prefix.len() + token.key().len());
                key.extend_from_slice(&self.prefix);
                key.extend_from_slice(token.key());
                Token::new(key)
            })
            .collect()
    }
}
