use crate::filler::{seeded_rng, LayerRng};
use crate::grad_check::report::GradCheckError;
use crate::numeric::{widen, Dtype};

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 1701;

/// Settings of one [`GradientChecker`](crate::grad_check::GradientChecker).
///
/// * `stepsize`: finite-difference step. Smaller is more accurate until
///   floating-point cancellation takes over.
/// * `threshold`: relative tolerance, floored at an absolute scale of 1.
/// * `seed`: every stochastic stage of a check starts from a generator seeded
///   with this value.
/// * `kink`, `kink_range`: features whose absolute value lies in
///   `[kink - kink_range, kink + kink_range]` are not compared. The default
///   `kink_range` of -1 makes the band empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientCheckerConfig<T: Dtype> {
    pub stepsize: T,
    pub threshold: T,
    pub seed: u64,
    pub kink: T,
    pub kink_range: T,
}

impl<T: Dtype> GradientCheckerConfig<T> {
    pub fn new(stepsize: T, threshold: T) -> Self {
        GradientCheckerConfig {
            stepsize,
            threshold,
            seed: DEFAULT_SEED,
            kink: T::zero(),
            kink_range: -T::one(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_kink(mut self, kink: T, kink_range: T) -> Self {
        self.kink = kink;
        self.kink_range = kink_range;
        self
    }

    pub fn validate(&self) -> Result<(), GradCheckError> {
        if !self.stepsize.is_finite() || self.stepsize <= T::zero() {
            return Err(GradCheckError::InvalidConfig(format!(
                "stepsize must be finite and positive, got {}",
                widen(self.stepsize)
            )));
        }
        if !self.threshold.is_finite() || self.threshold < T::zero() {
            return Err(GradCheckError::InvalidConfig(format!(
                "threshold must be finite and non-negative, got {}",
                widen(self.threshold)
            )));
        }
        if !self.kink.is_finite() || !self.kink_range.is_finite() {
            return Err(GradCheckError::InvalidConfig(format!(
                "kink and kink_range must be finite, got {} and {}",
                widen(self.kink),
                widen(self.kink_range)
            )));
        }
        Ok(())
    }

    /// Whether `feature` lies in the excluded nonsmooth band.
    pub fn in_kink_band(&self, feature: T) -> bool {
        let magnitude = feature.abs();
        self.kink - self.kink_range <= magnitude && magnitude <= self.kink + self.kink_range
    }

    /// A fresh generator in the configured state.
    pub fn rng(&self) -> LayerRng {
        seeded_rng(self.seed)
    }
}
