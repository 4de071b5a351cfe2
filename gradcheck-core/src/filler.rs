use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal, Uniform};

use crate::blob::Blob;
use crate::error::CoreError;
use crate::numeric::{cast, Dtype};

/// Generator type threaded through fillers and `Layer::forward`.
pub type LayerRng = StdRng;

/// Creates a generator in a fixed state. Every stochastic stage of a check starts
/// from a fresh generator made by this function.
pub fn seeded_rng(seed: u64) -> LayerRng {
    StdRng::seed_from_u64(seed)
}

/// Fills the value array of a blob.
pub trait Filler<T: Dtype> {
    fn fill(&self, blob: &Blob<T>, rng: &mut LayerRng) -> Result<(), CoreError>;
}

/// Fills every value with the same constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantFiller {
    pub value: f64,
}

impl<T: Dtype> Filler<T> for ConstantFiller {
    fn fill(&self, blob: &Blob<T>, _rng: &mut LayerRng) -> Result<(), CoreError> {
        blob.fill_data(cast(self.value)?);
        Ok(())
    }
}

/// Samples values from `N(mean, std²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianFiller {
    pub mean: f64,
    pub std: f64,
}

impl<T: Dtype> Filler<T> for GaussianFiller {
    fn fill(&self, blob: &Blob<T>, rng: &mut LayerRng) -> Result<(), CoreError> {
        let normal = Normal::new(self.mean, self.std)
            .map_err(|e| CoreError::InvalidFiller(format!("gaussian(mean={}, std={}): {}", self.mean, self.std, e)))?;
        let values = (0..blob.count())
            .map(|_| cast(normal.sample(rng)))
            .collect::<Result<Vec<T>, _>>()?;
        blob.set_data(&values)
    }
}

/// Samples values uniformly from `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformFiller {
    pub min: f64,
    pub max: f64,
}

impl<T: Dtype> Filler<T> for UniformFiller {
    fn fill(&self, blob: &Blob<T>, rng: &mut LayerRng) -> Result<(), CoreError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(CoreError::InvalidFiller(format!(
                "uniform requires finite min <= max, got [{}, {}]",
                self.min, self.max
            )));
        }
        let uniform = Uniform::new_inclusive(self.min, self.max);
        let values = (0..blob.count())
            .map(|_| cast(uniform.sample(rng)))
            .collect::<Result<Vec<T>, _>>()?;
        blob.set_data(&values)
    }
}

/// A filler chosen at configuration time, used by layers that own parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillerKind {
    Constant(ConstantFiller),
    Gaussian(GaussianFiller),
    Uniform(UniformFiller),
}

impl<T: Dtype> Filler<T> for FillerKind {
    fn fill(&self, blob: &Blob<T>, rng: &mut LayerRng) -> Result<(), CoreError> {
        match self {
            FillerKind::Constant(filler) => filler.fill(blob, rng),
            FillerKind::Gaussian(filler) => filler.fill(blob, rng),
            FillerKind::Uniform(filler) => filler.fill(blob, rng),
        }
    }
}

#[cfg(test)]
#[path = "filler_test.rs"]
mod tests;
