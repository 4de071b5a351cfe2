use crate::blob::Blob;
use crate::error::CoreError;
use crate::filler::{seeded_rng, Filler, FillerKind, GaussianFiller, LayerRng};
use crate::nn::layer::{check_blob_count, check_flag_len, Layer};
use crate::numeric::Dtype;

/// Fully connected layer: y = x W^T + b.
///
/// The bottom is read as `[m, k]` where `m` is its first dimension and `k` the
/// product of the remaining ones. The weight is `[num_output, k]`, the optional
/// bias `[num_output]`; both are parameter blobs filled once, on the first
/// `setup`, from a generator seeded with `init_seed`.
#[derive(Debug)]
pub struct InnerProductLayer<T: Dtype> {
    num_output: usize,
    bias_term: bool,
    weight_filler: FillerKind,
    bias_filler: FillerKind,
    init_seed: u64,
    weight: Option<Blob<T>>,
    bias: Option<Blob<T>>,
    m: usize,
    k: usize,
}

impl<T: Dtype> InnerProductLayer<T> {
    pub fn new(num_output: usize, bias_term: bool) -> Self {
        let gaussian = FillerKind::Gaussian(GaussianFiller { mean: 0.0, std: 1.0 });
        InnerProductLayer {
            num_output,
            bias_term,
            weight_filler: gaussian,
            bias_filler: gaussian,
            init_seed: 1701,
            weight: None,
            bias: None,
            m: 0,
            k: 0,
        }
    }

    pub fn with_weight_filler(mut self, filler: FillerKind) -> Self {
        self.weight_filler = filler;
        self
    }

    pub fn with_bias_filler(mut self, filler: FillerKind) -> Self {
        self.bias_filler = filler;
        self
    }

    pub fn with_init_seed(mut self, seed: u64) -> Self {
        self.init_seed = seed;
        self
    }

    fn weight(&self) -> Result<&Blob<T>, CoreError> {
        self.weight
            .as_ref()
            .ok_or_else(|| CoreError::InternalError("InnerProduct used before setup".to_string()))
    }

    /// Bottom and top counts must still match the shapes seen by `setup`.
    fn check_counts(&self, operation: &str, bottom: &Blob<T>, top: &[T]) -> Result<(), CoreError> {
        let checks = [(self.m * self.k, bottom.count()), (self.m * self.num_output, top.len())];
        for (expected, actual) in checks {
            if expected != actual {
                return Err(CoreError::CountMismatch {
                    expected,
                    actual,
                    operation: format!("InnerProduct {}", operation),
                });
            }
        }
        Ok(())
    }

    fn initialize_parameters(&mut self) -> Result<(), CoreError> {
        let mut rng = seeded_rng(self.init_seed);
        let weight = Blob::new(&[self.num_output, self.k]);
        self.weight_filler.fill(&weight, &mut rng)?;
        self.weight = Some(weight);
        if self.bias_term {
            let bias = Blob::new(&[self.num_output]);
            self.bias_filler.fill(&bias, &mut rng)?;
            self.bias = Some(bias);
        }
        log::debug!(
            "InnerProduct initialized weight [{}, {}] (bias: {})",
            self.num_output,
            self.k,
            self.bias_term
        );
        Ok(())
    }
}

impl<T: Dtype> Layer<T> for InnerProductLayer<T> {
    fn type_name(&self) -> &'static str {
        "InnerProduct"
    }

    fn setup(&mut self, bottom: &[Blob<T>], top: &[Blob<T>]) -> Result<(), CoreError> {
        check_blob_count(self.type_name(), "bottom", 1, bottom.len())?;
        check_blob_count(self.type_name(), "top", 1, top.len())?;
        if self.num_output == 0 {
            return Err(CoreError::InvalidLayerConfig {
                layer: self.type_name().to_string(),
                reason: "num_output must be positive".to_string(),
            });
        }
        let shape = bottom[0].shape();
        let m = shape.first().copied().unwrap_or(1);
        if m == 0 {
            return Err(CoreError::InvalidLayerConfig {
                layer: self.type_name().to_string(),
                reason: format!("bottom shape {:?} has no rows", shape),
            });
        }
        let k = bottom[0].count() / m;
        if self.weight.is_none() {
            self.k = k;
            self.initialize_parameters()?;
        } else if self.k != k {
            return Err(CoreError::InvalidLayerConfig {
                layer: self.type_name().to_string(),
                reason: format!("bottom has {} features per row, weight expects {}", k, self.k),
            });
        }
        self.m = m;
        top[0].reshape(&[m, self.num_output]);
        Ok(())
    }

    fn forward(&mut self, bottom: &[Blob<T>], top: &[Blob<T>], _rng: &mut LayerRng) -> Result<T, CoreError> {
        check_blob_count(self.type_name(), "bottom", 1, bottom.len())?;
        check_blob_count(self.type_name(), "top", 1, top.len())?;
        let (m, k, n) = (self.m, self.k, self.num_output);
        let w = self.weight()?.data();
        self.check_counts("forward", &bottom[0], &top[0].data())?;
        let x = bottom[0].data();
        let b = self.bias.as_ref().map(Blob::data);
        let mut y = vec![T::zero(); m * n];
        for i in 0..m {
            for o in 0..n {
                let mut acc = b.as_ref().map_or(T::zero(), |b| b[o]);
                for j in 0..k {
                    acc += x[i * k + j] * w[o * k + j];
                }
                y[i * n + o] = acc;
            }
        }
        top[0].set_data(&y)?;
        Ok(T::zero())
    }

    fn backward(&mut self, top: &[Blob<T>], propagate_down: &[bool], bottom: &[Blob<T>]) -> Result<(), CoreError> {
        check_blob_count(self.type_name(), "bottom", 1, bottom.len())?;
        check_blob_count(self.type_name(), "top", 1, top.len())?;
        check_flag_len(self.type_name(), "propagate_down", bottom.len(), propagate_down.len())?;
        let (m, k, n) = (self.m, self.k, self.num_output);
        let weight = self.weight()?;
        let dy = top[0].diff();
        self.check_counts("backward", &bottom[0], &dy)?;
        let x = bottom[0].data();

        let mut dw = vec![T::zero(); n * k];
        for o in 0..n {
            for j in 0..k {
                let mut acc = T::zero();
                for i in 0..m {
                    acc += dy[i * n + o] * x[i * k + j];
                }
                dw[o * k + j] = acc;
            }
        }
        weight.set_diff(&dw)?;

        if let Some(bias) = &self.bias {
            let db: Vec<T> = (0..n)
                .map(|o| (0..m).fold(T::zero(), |acc, i| acc + dy[i * n + o]))
                .collect();
            bias.set_diff(&db)?;
        }

        if propagate_down[0] {
            let w = weight.data();
            let mut dx = vec![T::zero(); m * k];
            for i in 0..m {
                for j in 0..k {
                    let mut acc = T::zero();
                    for o in 0..n {
                        acc += dy[i * n + o] * w[o * k + j];
                    }
                    dx[i * k + j] = acc;
                }
            }
            bottom[0].set_diff(&dx)?;
        }
        Ok(())
    }

    fn blobs(&self) -> Vec<Blob<T>> {
        self.weight.iter().chain(self.bias.iter()).map(Blob::alias).collect()
    }
}

#[cfg(test)]
#[path = "inner_product_test.rs"]
mod tests;
