use crate::blob::Blob;
use crate::filler::{seeded_rng, Filler, UniformFiller};
use crate::grad_check::report::GradCheckError;
use crate::nn::layer::Layer;
use crate::numeric::Dtype;

/// Distribution used to overwrite data a backward pass claims not to read.
pub const CORRUPTION_FILLER: UniformFiller = UniformFiller { min: -10.0, max: 10.0 };

/// Overwrites bottom data the layer's backward does not use and top data it
/// does not use, from a freshly seeded generator.
///
/// Returns backups of the overwritten bottoms for [`restore_bottom_data`]. Tops
/// are not restored; every later stage recomputes them.
pub fn corrupt_unused_data<T: Dtype>(
    layer: &dyn Layer<T>,
    bottom: &[Blob<T>],
    top: &[Blob<T>],
    seed: u64,
) -> Result<Vec<Option<Blob<T>>>, GradCheckError> {
    let mut rng = seeded_rng(seed);
    let mut backups = Vec::with_capacity(bottom.len());
    for (i, blob) in bottom.iter().enumerate() {
        if layer.backward_uses_bottom_data(i) {
            backups.push(None);
        } else {
            backups.push(Some(blob.duplicate()));
            CORRUPTION_FILLER.fill(blob, &mut rng)?;
        }
    }
    let mut corrupted_tops = 0;
    for (i, blob) in top.iter().enumerate() {
        if !layer.backward_uses_top_data(i) {
            CORRUPTION_FILLER.fill(blob, &mut rng)?;
            corrupted_tops += 1;
        }
    }
    log::trace!(
        "{}: corrupted {} bottom(s) and {} top(s) before backward",
        layer.type_name(),
        backups.iter().filter(|b| b.is_some()).count(),
        corrupted_tops
    );
    Ok(backups)
}

/// Copies the saved values back into the bottoms that were overwritten.
pub fn restore_bottom_data<T: Dtype>(bottom: &[Blob<T>], backups: &[Option<Blob<T>>]) -> Result<(), GradCheckError> {
    for (blob, backup) in bottom.iter().zip(backups) {
        if let Some(backup) = backup {
            blob.copy_from(backup, false, false)?;
        }
    }
    Ok(())
}
