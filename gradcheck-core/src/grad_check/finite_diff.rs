use approx::AbsDiffEq;

use crate::blob::Blob;
use crate::filler::seeded_rng;
use crate::grad_check::config::GradientCheckerConfig;
use crate::grad_check::objective::{objective_and_gradient, ObjectiveTarget};
use crate::grad_check::report::GradCheckError;
use crate::nn::layer::Layer;
use crate::numeric::Dtype;

/// Outcome of comparing one analytic gradient entry with its estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureComparison<T> {
    /// The feature lies in the kink band and was not compared.
    InKink,
    Match { tolerance: T },
    Mismatch { tolerance: T },
}

/// Runs forward from a freshly seeded generator and returns the layer's own
/// loss plus the synthetic objective.
pub fn evaluate_objective<T: Dtype>(
    layer: &mut dyn Layer<T>,
    bottom: &[Blob<T>],
    top: &[Blob<T>],
    target: Option<ObjectiveTarget>,
    seed: u64,
) -> Result<T, GradCheckError> {
    let mut objective = layer.forward(bottom, top, &mut seeded_rng(seed))?;
    objective += objective_and_gradient(top, target)?;
    Ok(objective)
}

/// Central-difference estimate of the objective's derivative with respect to
/// element `feat_id` of `blob`, which must alias one of the layer's bottoms or
/// parameters.
///
/// The element is shifted by `+stepsize` and `-stepsize` and set back to its
/// original value afterwards.
pub fn estimate_gradient<T: Dtype>(
    layer: &mut dyn Layer<T>,
    bottom: &[Blob<T>],
    top: &[Blob<T>],
    blob: &Blob<T>,
    feat_id: usize,
    target: Option<ObjectiveTarget>,
    config: &GradientCheckerConfig<T>,
) -> Result<T, GradCheckError> {
    let step = config.stepsize;
    let original = blob.data_at(feat_id)?;

    blob.set_data_at(feat_id, original + step)?;
    let positive = evaluate_objective(layer, bottom, top, target, config.seed);
    let negative = positive.and_then(|positive| {
        blob.set_data_at(feat_id, original - step)?;
        Ok((positive, evaluate_objective(layer, bottom, top, target, config.seed)?))
    });
    blob.set_data_at(feat_id, original)?;

    let (positive, negative) = negative?;
    let two = T::one() + T::one();
    Ok((positive - negative) / step / two)
}

/// Applies the kink rule and the scaled tolerance
/// `threshold * max(|computed|, |estimated|, 1)` to one feature.
pub fn compare_feature<T: Dtype>(
    config: &GradientCheckerConfig<T>,
    feature: T,
    computed: T,
    estimated: T,
) -> FeatureComparison<T> {
    if config.in_kink_band(feature) {
        return FeatureComparison::InKink;
    }
    let scale = computed.abs().max(estimated.abs()).max(T::one());
    let tolerance = config.threshold * scale;
    if computed.abs_diff_eq(&estimated, tolerance) {
        FeatureComparison::Match { tolerance }
    } else {
        FeatureComparison::Mismatch { tolerance }
    }
}
