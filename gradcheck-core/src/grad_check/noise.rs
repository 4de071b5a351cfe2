use crate::blob::Blob;
use crate::error::CoreError;
use crate::filler::{seeded_rng, Filler, GaussianFiller};
use crate::grad_check::checked_set::CheckedBlob;
use crate::grad_check::report::GradCheckError;
use crate::numeric::Dtype;

/// Distribution of the values pre-loaded into accumulated diffs.
pub const NOISE_FILLER: GaussianFiller = GaussianFiller { mean: 10.0, std: 1.0 };

/// Writes seeded Gaussian noise into the diff of every entry that receives it
/// and returns a copy of what was written (`None` for entries left alone).
///
/// A backward that overwrites instead of accumulating loses this offset, which
/// the gradient comparison then reports.
pub fn inject_noise<T: Dtype>(entries: &[CheckedBlob<T>], seed: u64) -> Result<Vec<Option<Blob<T>>>, GradCheckError> {
    let mut rng = seeded_rng(seed);
    let mut noise = Vec::with_capacity(entries.len());
    for entry in entries {
        if !entry.receives_noise() {
            noise.push(None);
            continue;
        }
        let values = Blob::new(&entry.blob.shape());
        NOISE_FILLER.fill(&values, &mut rng)?;
        entry.blob.set_diff(&values.data())?;
        noise.push(Some(values));
    }
    log::trace!(
        "Injected noise into {} of {} checked blob(s)",
        noise.iter().filter(|n| n.is_some()).count(),
        entries.len()
    );
    Ok(noise)
}

/// Reads every entry's diff back and removes the injected noise, giving the
/// analytic gradients.
pub fn recover_gradients<T: Dtype>(
    entries: &[CheckedBlob<T>],
    noise: &[Option<Blob<T>>],
) -> Result<Vec<Vec<T>>, GradCheckError> {
    entries
        .iter()
        .zip(noise)
        .map(|(entry, noise)| {
            let mut gradient = entry.blob.diff();
            if let Some(noise) = noise {
                let offsets = noise.data();
                if offsets.len() != gradient.len() {
                    return Err(CoreError::CountMismatch {
                        expected: offsets.len(),
                        actual: gradient.len(),
                        operation: "recover_gradients".to_string(),
                    }
                    .into());
                }
                for (g, &n) in gradient.iter_mut().zip(&offsets) {
                    *g -= n;
                }
            }
            Ok(gradient)
        })
        .collect()
}
