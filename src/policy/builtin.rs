use super::AccuracyPolicy;
use rand::{Rng, RngCore};
use std::ops::Range;

/// Reference policy: each detection is correct with fixed probability,
/// faceless frames draw a plausible accuracy from a fixed range.
#[derive(Debug, Clone)]
pub struct Bernoulli {
    p_correct: f64,
    fallback: Range<f64>,
}

impl Bernoulli {
    pub fn new(p_correct: f64, fallback: Range<f64>) -> Self {
        Self { p_correct, fallback }
    }

    /// 70% per-detection correctness, fallback uniform in [0.6, 0.9).
    pub fn reference() -> Self {
        Self::new(0.7, 0.6..0.9)
    }
}

impl AccuracyPolicy for Bernoulli {
    fn detection_correct(&mut self, rng: &mut dyn RngCore) -> bool {
        rng.gen_bool(self.p_correct)
    }

    fn fallback_accuracy(&mut self, rng: &mut dyn RngCore) -> f64 {
        rng.gen_range(self.fallback.clone())
    }

    fn name(&self) -> &str {
        "bernoulli"
    }

    fn clone_box(&self) -> Box<dyn AccuracyPolicy> {
        Box::new(self.clone())
    }
}

/// Every detection correct, faceless frames report 1.0. Upper-bound
/// baseline, also handy in tests that need determinism.
#[derive(Debug, Clone, Copy)]
pub struct Perfect;

impl AccuracyPolicy for Perfect {
    fn detection_correct(&mut self, _rng: &mut dyn RngCore) -> bool {
        true
    }

    fn fallback_accuracy(&mut self, _rng: &mut dyn RngCore) -> f64 {
        1.0
    }

    fn name(&self) -> &str {
        "perfect"
    }

    fn clone_box(&self) -> Box<dyn AccuracyPolicy> {
        Box::new(*self)
    }
}
