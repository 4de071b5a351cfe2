use gradcheck_core::error::CoreError;
use gradcheck_core::filler::{seeded_rng, Filler, GaussianFiller, LayerRng};
use gradcheck_core::nn::layer::{check_blob_count, check_flag_len, Layer};
use gradcheck_core::Blob;

// Routes checker logs through the test harness; RUST_LOG=debug shows them.
#[allow(dead_code)]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// Helper to build a blob from literal values, panicking on a bad shape.
#[allow(dead_code)]
pub fn blob<T: gradcheck_core::Dtype>(data: Vec<T>, shape: &[usize]) -> Blob<T> {
    Blob::from_vec(data, shape).expect("Test blob creation failed")
}

// Gaussian N(0, 1) blob from a fixed seed, the usual test input.
#[allow(dead_code)]
pub fn gaussian_blob<T: gradcheck_core::Dtype>(shape: &[usize], seed: u64) -> Blob<T> {
    let blob = Blob::new(shape);
    GaussianFiller { mean: 0.0, std: 1.0 }
        .fill(&blob, &mut seeded_rng(seed))
        .expect("Gaussian fill failed");
    blob
}

/// Defect injected into [`QuadPlusIdentity`].
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    None,
    /// Rereads the bottom after writing the top while claiming forward in place is safe.
    ForwardRereadsBottom,
    /// Rereads the top diff after writing the bottom diff while claiming backward in place is safe.
    BackwardRereadsTopDiff,
    /// Reads the bottom in backward while claiming not to.
    HidesBottomDependency,
    /// Overwrites bottom diffs in `accum_backward`.
    OverwritesAccumulation,
}

/// y = x² + x, computed in two passes so that aliasing defects surface.
#[allow(dead_code)]
#[derive(Debug)]
pub struct QuadPlusIdentity {
    pub fault: Fault,
}

#[allow(dead_code)]
impl QuadPlusIdentity {
    pub fn new(fault: Fault) -> Self {
        QuadPlusIdentity { fault }
    }
}

impl Layer<f64> for QuadPlusIdentity {
    fn type_name(&self) -> &'static str {
        "QuadPlusIdentity"
    }

    fn setup(&mut self, bottom: &[Blob<f64>], top: &[Blob<f64>]) -> Result<(), CoreError> {
        check_blob_count(self.type_name(), "bottom", 1, bottom.len())?;
        check_blob_count(self.type_name(), "top", 1, top.len())?;
        top[0].reshape_like(&bottom[0]);
        Ok(())
    }

    fn forward(&mut self, bottom: &[Blob<f64>], top: &[Blob<f64>], _rng: &mut LayerRng) -> Result<f64, CoreError> {
        let x = bottom[0].data();
        top[0].set_data(&x.iter().map(|v| v * v).collect::<Vec<_>>())?;
        let linear = if self.fault == Fault::ForwardRereadsBottom {
            bottom[0].data()
        } else {
            x
        };
        let y: Vec<f64> = top[0].data().iter().zip(&linear).map(|(sq, v)| sq + v).collect();
        top[0].set_data(&y)?;
        Ok(0.0)
    }

    fn backward(&mut self, top: &[Blob<f64>], propagate_down: &[bool], bottom: &[Blob<f64>]) -> Result<(), CoreError> {
        check_flag_len(self.type_name(), "propagate_down", bottom.len(), propagate_down.len())?;
        if !propagate_down[0] {
            return Ok(());
        }
        let dy = top[0].diff();
        let x = bottom[0].data();
        let quadratic: Vec<f64> = x.iter().zip(&dy).map(|(v, g)| 2.0 * v * g).collect();
        bottom[0].set_diff(&quadratic)?;
        let linear = if self.fault == Fault::BackwardRereadsTopDiff {
            top[0].diff()
        } else {
            dy
        };
        let dx: Vec<f64> = bottom[0].diff().iter().zip(&linear).map(|(d, g)| d + g).collect();
        bottom[0].set_diff(&dx)
    }

    fn accum_backward(
        &mut self,
        top: &[Blob<f64>],
        propagate_down: &[bool],
        accum_down: &[bool],
        bottom: &[Blob<f64>],
    ) -> Result<(), CoreError> {
        if self.fault == Fault::OverwritesAccumulation {
            return self.backward(top, propagate_down, bottom);
        }
        check_flag_len(self.type_name(), "accum_down", bottom.len(), accum_down.len())?;
        let previous = bottom[0].diff();
        self.backward(top, propagate_down, bottom)?;
        if propagate_down[0] && accum_down[0] {
            bottom[0].accumulate_diff(&previous)?;
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
        self.fault != Fault::HidesBottomDependency
    }

    fn elementwise_only_computation(&self) -> bool {
        true
    }
}
