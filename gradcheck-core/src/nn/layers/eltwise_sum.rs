use crate::blob::Blob;
use crate::error::CoreError;
use crate::filler::LayerRng;
use crate::nn::layer::{check_blob_count, check_flag_len, Layer};
use crate::numeric::Dtype;

/// Weighted elementwise sum of equally shaped bottoms: y = Σ_k coeff_k * x_k.
#[derive(Debug, Clone)]
pub struct EltwiseSumLayer<T: Dtype> {
    coeffs: Vec<T>,
}

impl<T: Dtype> EltwiseSumLayer<T> {
    pub fn new(coeffs: Vec<T>) -> Self {
        EltwiseSumLayer { coeffs }
    }

    /// Plain sum of `num_bottom` inputs.
    pub fn sum(num_bottom: usize) -> Self {
        Self::new(vec![T::one(); num_bottom])
    }
}

impl<T: Dtype> Layer<T> for EltwiseSumLayer<T> {
    fn type_name(&self) -> &'static str {
        "EltwiseSum"
    }

    fn setup(&mut self, bottom: &[Blob<T>], top: &[Blob<T>]) -> Result<(), CoreError> {
        check_blob_count(self.type_name(), "bottom", self.coeffs.len(), bottom.len())?;
        check_blob_count(self.type_name(), "top", 1, top.len())?;
        let first = bottom.first().ok_or_else(|| CoreError::InvalidLayerConfig {
            layer: self.type_name().to_string(),
            reason: "needs at least one bottom".to_string(),
        })?;
        let shape = first.shape();
        for blob in &bottom[1..] {
            if blob.shape() != shape {
                return Err(CoreError::ShapeMismatch {
                    expected: shape,
                    actual: blob.shape(),
                    operation: "EltwiseSum setup".to_string(),
                });
            }
        }
        top[0].reshape(&shape);
        Ok(())
    }

    fn forward(&mut self, bottom: &[Blob<T>], top: &[Blob<T>], _rng: &mut LayerRng) -> Result<T, CoreError> {
        let mut out = vec![T::zero(); bottom[0].count()];
        for (blob, &coeff) in bottom.iter().zip(&self.coeffs) {
            for (acc, x) in out.iter_mut().zip(blob.data()) {
                *acc += coeff * x;
            }
        }
        top[0].set_data(&out)?;
        Ok(T::zero())
    }

    fn backward(&mut self, top: &[Blob<T>], propagate_down: &[bool], bottom: &[Blob<T>]) -> Result<(), CoreError> {
        check_flag_len(self.type_name(), "propagate_down", bottom.len(), propagate_down.len())?;
        let dy = top[0].diff();
        for ((blob, &coeff), &propagate) in bottom.iter().zip(&self.coeffs).zip(propagate_down) {
            if propagate {
                let grad: Vec<T> = dy.iter().map(|&g| coeff * g).collect();
                blob.set_diff(&grad)?;
            }
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
