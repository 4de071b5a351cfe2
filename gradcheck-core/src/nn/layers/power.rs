use crate::blob::Blob;
use crate::error::CoreError;
use crate::filler::LayerRng;
use crate::nn::layer::{check_blob_count, check_flag_len, Layer};
use crate::numeric::Dtype;

/// Computes y = (shift + scale * x) ^ power elementwise.
#[derive(Debug, Clone)]
pub struct PowerLayer<T: Dtype> {
    power: T,
    scale: T,
    shift: T,
}

impl<T: Dtype> PowerLayer<T> {
    pub fn new(power: T, scale: T, shift: T) -> Self {
        PowerLayer { power, scale, shift }
    }

    /// y = x².
    pub fn square() -> Self {
        let two = T::one() + T::one();
        Self::new(two, T::one(), T::zero())
    }
}

impl<T: Dtype> Layer<T> for PowerLayer<T> {
    fn type_name(&self) -> &'static str {
        "Power"
    }

    fn setup(&mut self, bottom: &[Blob<T>], top: &[Blob<T>]) -> Result<(), CoreError> {
        check_blob_count(self.type_name(), "bottom", 1, bottom.len())?;
        check_blob_count(self.type_name(), "top", 1, top.len())?;
        top[0].reshape_like(&bottom[0]);
        Ok(())
    }

    fn forward(&mut self, bottom: &[Blob<T>], top: &[Blob<T>], _rng: &mut LayerRng) -> Result<T, CoreError> {
        let out: Vec<T> = bottom[0]
            .data()
            .into_iter()
            .map(|x| (self.shift + self.scale * x).powf(self.power))
            .collect();
        top[0].set_data(&out)?;
        Ok(T::zero())
    }

    fn backward(&mut self, top: &[Blob<T>], propagate_down: &[bool], bottom: &[Blob<T>]) -> Result<(), CoreError> {
        check_flag_len(self.type_name(), "propagate_down", bottom.len(), propagate_down.len())?;
        if !propagate_down[0] {
            return Ok(());
        }
        let top_diff = top[0].diff();
        let grad: Vec<T> = if self.power == T::zero() || self.scale == T::zero() {
            vec![T::zero(); top_diff.len()]
        } else {
            let factor = self.power * self.scale;
            bottom[0]
                .data()
                .into_iter()
                .zip(top_diff)
                .map(|(x, dy)| {
                    let base = self.shift + self.scale * x;
                    dy * factor * base.powf(self.power - T::one())
                })
                .collect()
        };
        bottom[0].set_diff(&grad)
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
