use std::fmt::Debug;

use crate::blob::Blob;
use crate::error::CoreError;
use crate::filler::LayerRng;
use crate::numeric::Dtype;

/// The base trait for every layer the gradient checker can drive.
///
/// A layer reads its `bottom` blobs and writes its `top` blobs in `forward`, and
/// reads top diffs to write bottom (and parameter) diffs in `backward`. Blob
/// writes go through the blobs' shared storage, so every operation borrows the
/// blob vectors immutably.
///
/// The capability queries describe what the implementation is allowed to rely
/// on. Their defaults are the conservative answers ("may reuse", "may read"); a
/// layer overriding one of them is promising something the checker will try to
/// break.
pub trait Layer<T: Dtype>: Debug {
    /// Short type name used in errors and logs.
    fn type_name(&self) -> &'static str;

    /// Validates the bottom blobs and shapes the top blobs.
    ///
    /// May be called more than once, including on fresh blobs of the same
    /// shape; trainable parameters are initialised only on the first call.
    fn setup(&mut self, bottom: &[Blob<T>], top: &[Blob<T>]) -> Result<(), CoreError>;

    /// Computes the tops from the bottoms and returns this layer's own loss
    /// contribution (zero for non-loss layers).
    ///
    /// Any randomness must be drawn from `rng`.
    fn forward(&mut self, bottom: &[Blob<T>], top: &[Blob<T>], rng: &mut LayerRng) -> Result<T, CoreError>;

    /// Writes (overwrites) the diffs of bottoms flagged in `propagate_down` and
    /// of the parameter blobs.
    fn backward(&mut self, top: &[Blob<T>], propagate_down: &[bool], bottom: &[Blob<T>]) -> Result<(), CoreError>;

    /// Like `backward`, but adds into the diffs of bottoms flagged in both
    /// `propagate_down` and `accum_down` instead of overwriting them.
    fn accum_backward(
        &mut self,
        top: &[Blob<T>],
        propagate_down: &[bool],
        accum_down: &[bool],
        bottom: &[Blob<T>],
    ) -> Result<(), CoreError> {
        check_flag_len(self.type_name(), "propagate_down", bottom.len(), propagate_down.len())?;
        check_flag_len(self.type_name(), "accum_down", bottom.len(), accum_down.len())?;
        let previous: Vec<Option<Vec<T>>> = bottom
            .iter()
            .enumerate()
            .map(|(i, blob)| (propagate_down[i] && accum_down[i]).then(|| blob.diff()))
            .collect();
        self.backward(top, propagate_down, bottom)?;
        for (blob, saved) in bottom.iter().zip(previous) {
            if let Some(saved) = saved {
                blob.accumulate_diff(&saved)?;
            }
        }
        Ok(())
    }

    /// Aliases of the trainable parameter blobs, in a stable order.
    fn blobs(&self) -> Vec<Blob<T>> {
        Vec::new()
    }

    /// Whether `forward` may read bottom `bottom_index` after writing top
    /// `bottom_index`. `false` promises the layer can run with the two aliased.
    fn forward_reuses_bottom_data(&self, _bottom_index: usize) -> bool {
        true
    }

    /// Whether `backward` may read top diff `top_index` after writing bottom diff
    /// `top_index`. `false` promises the two diffs can be aliased.
    fn backward_reuses_top_diff(&self, _top_index: usize) -> bool {
        true
    }

    fn backward_uses_bottom_data(&self, _bottom_index: usize) -> bool {
        true
    }

    fn backward_uses_top_data(&self, _top_index: usize) -> bool {
        true
    }

    /// `true` if top element j depends only on element j of each bottom.
    fn elementwise_only_computation(&self) -> bool {
        false
    }
}

/// Checks the number of bottom or top blobs handed to a layer.
pub fn check_blob_count(layer: &str, kind: &'static str, expected: usize, actual: usize) -> Result<(), CoreError> {
    if expected != actual {
        return Err(CoreError::BlobArity {
            layer: layer.to_string(),
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Checks that a per-bottom flag vector has one entry per bottom.
pub fn check_flag_len(layer: &str, flags: &'static str, expected: usize, actual: usize) -> Result<(), CoreError> {
    if expected != actual {
        return Err(CoreError::FlagLengthMismatch {
            layer: layer.to_string(),
            flags,
            expected,
            actual,
        });
    }
    Ok(())
}
