//! Probabilistic series sampler.
//!
//! A stateless gate deciding whether a series enters analysis. Each call
//! draws independently, so repeated runs over the same corpus yield
//! statistically similar but not identical subsets. `p = 1.0` disables
//! sampling entirely.

use rand::Rng;

use crate::{Error, Result};

/// Stateless probabilistic gate over series.
///
/// Safe for concurrent calls from multiple workers: each call uses the
/// calling thread's RNG, never series identity.
#[derive(Debug, Clone, Copy)]
pub struct ProbabilisticSampler {
    probability: f64,
}

impl ProbabilisticSampler {
    /// Create a sampler accepting each series with probability `p`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSampleProbability`] unless `p ∈ (0, 1]`.
    pub fn new(probability: f64) -> Result<Self> {
        if !(probability > 0.0 && probability <= 1.0) {
            return Err(Error::InvalidSampleProbability(probability));
        }
        Ok(Self { probability })
    }

    /// The configured acceptance probability.
    #[must_use]
    pub fn probability(&self) -> f64 {
        self.probability
    }

    /// Draw once: `true` means the series is analyzed.
    #[must_use]
    pub fn sample(&self) -> bool {
        // gen::<f64>() is uniform over [0, 1), so p = 1.0 always accepts.
        rand::thread_rng().gen::<f64>() < self.probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_probability() {
        assert!(ProbabilisticSampler::new(0.0).is_err());
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(ProbabilisticSampler::new(-0.5).is_err());
        assert!(ProbabilisticSampler::new(1.5).is_err());
        assert!(ProbabilisticSampler::new(f64::NAN).is_err());
    }

    #[test]
    fn test_accepts_valid_range() {
        assert!(ProbabilisticSampler::new(0.0001).is_ok());
        assert!(ProbabilisticSampler::new(1.0).is_ok());
    }

    #[test]
    fn test_full_probability_never_rejects() {
        let sampler = ProbabilisticSampler::new(1.0).unwrap();
        assert!((0..10_000).all(|_| sampler.sample()));
    }

    #[test]
    fn test_calibration_at_p_03() {
        let sampler = ProbabilisticSampler::new(0.3).unwrap();
        let draws = 100_000u64;
        let accepted = (0..draws).filter(|_| sampler.sample()).count() as f64;
        let rate = accepted / draws as f64;
        // ~6.9 standard deviations at n = 100k; spurious failure odds are
        // negligible.
        assert!(
            (rate - 0.3).abs() < 0.01,
            "observed acceptance rate {rate} too far from 0.3"
        );
    }

    #[test]
    fn test_concurrent_sampling() {
        let sampler = ProbabilisticSampler::new(0.5).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(move || (0..1000).filter(|_| sampler.sample()).count()))
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert!(total > 2000 && total < 6000);
    }
}
