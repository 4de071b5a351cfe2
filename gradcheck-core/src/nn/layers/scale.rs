use crate::blob::Blob;
use crate::error::CoreError;
use crate::filler::LayerRng;
use crate::nn::layer::{check_blob_count, check_flag_len, Layer};
use crate::numeric::Dtype;

/// Multiplies its input by a fixed factor: y = alpha * x.
#[derive(Debug, Clone)]
pub struct ScaleLayer<T: Dtype> {
    alpha: T,
}

impl<T: Dtype> ScaleLayer<T> {
    pub fn new(alpha: T) -> Self {
        ScaleLayer { alpha }
    }

    pub fn alpha(&self) -> T {
        self.alpha
    }
}

impl<T: Dtype> Layer<T> for ScaleLayer<T> {
    fn type_name(&self) -> &'static str {
        "Scale"
    }

    fn setup(&mut self, bottom: &[Blob<T>], top: &[Blob<T>]) -> Result<(), CoreError> {
        check_blob_count(self.type_name(), "bottom", 1, bottom.len())?;
        check_blob_count(self.type_name(), "top", 1, top.len())?;
        top[0].reshape_like(&bottom[0]);
        Ok(())
    }

    fn forward(&mut self, bottom: &[Blob<T>], top: &[Blob<T>], _rng: &mut LayerRng) -> Result<T, CoreError> {
        let scaled: Vec<T> = bottom[0].data().into_iter().map(|x| self.alpha * x).collect();
        top[0].set_data(&scaled)?;
        Ok(T::zero())
    }

    fn backward(&mut self, top: &[Blob<T>], propagate_down: &[bool], bottom: &[Blob<T>]) -> Result<(), CoreError> {
        check_flag_len(self.type_name(), "propagate_down", bottom.len(), propagate_down.len())?;
        if propagate_down[0] {
            let grad: Vec<T> = top[0].diff().into_iter().map(|g| self.alpha * g).collect();
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
