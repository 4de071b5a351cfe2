use crate::blob::Blob;
use crate::error::CoreError;
use crate::filler::LayerRng;
use crate::nn::layer::{check_blob_count, check_flag_len, Layer};
use crate::numeric::Dtype;

/// Rectified linear unit with an optional leak: y = max(x, 0) + slope * min(x, 0).
///
/// The derivative jumps at x = 0, so gradient checks of this layer need a kink
/// band around 0.
#[derive(Debug, Clone)]
pub struct ReLULayer<T: Dtype> {
    negative_slope: T,
}

impl<T: Dtype> ReLULayer<T> {
    pub fn new() -> Self {
        Self::leaky(T::zero())
    }

    pub fn leaky(negative_slope: T) -> Self {
        ReLULayer { negative_slope }
    }
}

impl<T: Dtype> Default for ReLULayer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Dtype> Layer<T> for ReLULayer<T> {
    fn type_name(&self) -> &'static str {
        "ReLU"
    }

    fn setup(&mut self, bottom: &[Blob<T>], top: &[Blob<T>]) -> Result<(), CoreError> {
        check_blob_count(self.type_name(), "bottom", 1, bottom.len())?;
        check_blob_count(self.type_name(), "top", 1, top.len())?;
        top[0].reshape_like(&bottom[0]);
        Ok(())
    }

    fn forward(&mut self, bottom: &[Blob<T>], top: &[Blob<T>], _rng: &mut LayerRng) -> Result<T, CoreError> {
        let zero = T::zero();
        let out: Vec<T> = bottom[0]
            .data()
            .into_iter()
            .map(|x| x.max(zero) + self.negative_slope * x.min(zero))
            .collect();
        top[0].set_data(&out)?;
        Ok(zero)
    }

    fn backward(&mut self, top: &[Blob<T>], propagate_down: &[bool], bottom: &[Blob<T>]) -> Result<(), CoreError> {
        check_flag_len(self.type_name(), "propagate_down", bottom.len(), propagate_down.len())?;
        if propagate_down[0] {
            let grad: Vec<T> = bottom[0]
                .data()
                .into_iter()
                .zip(top[0].diff())
                .map(|(x, dy)| if x > T::zero() { dy } else { dy * self.negative_slope })
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

    fn backward_uses_top_data(&self, _top_index: usize) -> bool {
        false
    }

    fn elementwise_only_computation(&self) -> bool {
        true
    }
}
