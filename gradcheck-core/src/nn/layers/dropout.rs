use rand_distr::{Bernoulli, Distribution};

use crate::blob::Blob;
use crate::error::CoreError;
use crate::filler::LayerRng;
use crate::nn::layer::{check_blob_count, check_flag_len, Layer};
use crate::numeric::{cast, Dtype};

/// Zeroes each input with probability `ratio` and scales survivors by
/// `1 / (1 - ratio)`.
///
/// The mask is drawn from the generator passed to `forward` and kept for the
/// following `backward`, so two forwards from identically seeded generators
/// make the same choices.
#[derive(Debug, Clone)]
pub struct DropoutLayer<T: Dtype> {
    ratio: f64,
    keep: Bernoulli,
    mask: Vec<bool>,
    scale: T,
}

impl<T: Dtype> DropoutLayer<T> {
    pub fn new(ratio: f64) -> Result<Self, CoreError> {
        if !(0.0..1.0).contains(&ratio) {
            return Err(CoreError::InvalidLayerConfig {
                layer: "Dropout".to_string(),
                reason: format!("ratio must lie in [0, 1), got {}", ratio),
            });
        }
        let keep = Bernoulli::new(1.0 - ratio).map_err(|e| CoreError::InvalidLayerConfig {
            layer: "Dropout".to_string(),
            reason: e.to_string(),
        })?;
        Ok(DropoutLayer {
            ratio,
            keep,
            mask: Vec::new(),
            scale: cast(1.0 / (1.0 - ratio))?,
        })
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }
}

impl<T: Dtype> Layer<T> for DropoutLayer<T> {
    fn type_name(&self) -> &'static str {
        "Dropout"
    }

    fn setup(&mut self, bottom: &[Blob<T>], top: &[Blob<T>]) -> Result<(), CoreError> {
        check_blob_count(self.type_name(), "bottom", 1, bottom.len())?;
        check_blob_count(self.type_name(), "top", 1, top.len())?;
        top[0].reshape_like(&bottom[0]);
        self.mask = vec![true; bottom[0].count()];
        Ok(())
    }

    fn forward(&mut self, bottom: &[Blob<T>], top: &[Blob<T>], rng: &mut LayerRng) -> Result<T, CoreError> {
        let x = bottom[0].data();
        self.mask = (0..x.len()).map(|_| self.keep.sample(rng)).collect();
        let out: Vec<T> = x
            .into_iter()
            .zip(&self.mask)
            .map(|(v, &kept)| if kept { v * self.scale } else { T::zero() })
            .collect();
        top[0].set_data(&out)?;
        Ok(T::zero())
    }

    fn backward(&mut self, top: &[Blob<T>], propagate_down: &[bool], bottom: &[Blob<T>]) -> Result<(), CoreError> {
        check_flag_len(self.type_name(), "propagate_down", bottom.len(), propagate_down.len())?;
        if propagate_down[0] {
            let dy = top[0].diff();
            if dy.len() != self.mask.len() {
                return Err(CoreError::CountMismatch {
                    expected: self.mask.len(),
                    actual: dy.len(),
                    operation: "Dropout backward".to_string(),
                });
            }
            let grad: Vec<T> = dy
                .into_iter()
                .zip(&self.mask)
                .map(|(g, &kept)| if kept { g * self.scale } else { T::zero() })
                .collect();
            bottom[0].set_diff(&grad)?;
        }
        Ok(())
    }

    fn forward_reuses_bottom_data(&self, _bottom_index: usize) -> bool {
        false
    }

    fn backward_reuses_top_diff(&self, _top_index: usize) -> bool {
        false
    }

    fn backward_uses_bottom_data(&self, _bottom_index: usize) -> bool {
        false
    }

    fn backward_uses_top_data(&self, _top_index: usize) -> bool {
        false
    }

    fn elementwise_only_computation(&self) -> bool {
        true
    }
}
