use approx::AbsDiffEq;

use crate::blob::Blob;
use crate::filler::seeded_rng;
use crate::grad_check::checked_set::is_selected;
use crate::grad_check::config::GradientCheckerConfig;
use crate::grad_check::objective::{objective_and_gradient, ObjectiveTarget};
use crate::grad_check::report::{CheckReport, GradCheckError, Violation};
use crate::nn::layer::Layer;
use crate::numeric::{widen, Dtype};

/// Re-runs forward with top `i` aliased onto bottom `i` for every selected index
/// the layer declares safe, and requires bit-identical results.
///
/// `computed_objective` is the layer's own loss from the preceding forward on
/// separate buffers, whose tops are still in place. Original top handles and
/// bottom values are restored before returning.
pub fn check_forward_in_place<T: Dtype>(
    layer: &mut dyn Layer<T>,
    bottom: &[Blob<T>],
    top: &mut [Blob<T>],
    check_bottom: Option<usize>,
    computed_objective: T,
    seed: u64,
    report: &mut CheckReport,
) -> Result<(), GradCheckError> {
    let pairs = bottom.len().min(top.len());
    let mut saved: Vec<Option<(Blob<T>, Blob<T>)>> = (0..pairs).map(|_| None).collect();
    for i in 0..pairs {
        if is_selected(check_bottom, i) && top[i].count() == bottom[i].count() && !layer.forward_reuses_bottom_data(i) {
            let bottom_values = bottom[i].duplicate();
            let original_top = std::mem::replace(&mut top[i], bottom[i].alias());
            saved[i] = Some((original_top, bottom_values));
        }
    }
    if saved.iter().all(Option::is_none) {
        log::debug!("{}: no bottom eligible for forward in place", layer.type_name());
        return Ok(());
    }
    report.forward_in_place_probes += 1;

    let outcome = layer.forward(bottom, top, &mut seeded_rng(seed));

    // Put the caller's handles back before surfacing any error.
    let mut pending = Vec::new();
    for (i, slot) in saved.into_iter().enumerate() {
        if let Some((original_top, bottom_values)) = slot {
            let in_place_top = std::mem::replace(&mut top[i], original_top);
            pending.push((i, in_place_top, bottom_values));
        }
    }
    let in_place_objective = outcome?;

    if in_place_objective != computed_objective {
        report.record(Violation::ForwardInPlaceObjective {
            expected: widen(computed_objective),
            actual: widen(in_place_objective),
        });
    }
    for (i, in_place_top, bottom_values) in pending {
        let expected = top[i].data();
        let actual = in_place_top.data();
        for (element, (&e, &a)) in expected.iter().zip(&actual).enumerate() {
            if e != a {
                report.record(Violation::ForwardInPlaceData {
                    top_index: i,
                    element,
                    expected: widen(e),
                    actual: widen(a),
                });
            }
        }
        bottom[i].copy_from(&bottom_values, false, false)?;
    }
    Ok(())
}

/// Re-runs forward and backward on fresh copies of the bottoms, with bottom
/// diff `i` sharing storage with top diff `i` for every selected index the
/// layer declares safe, and compares the resulting bottom diffs with
/// `computed_gradients` (per bottom, `None` where no gradient was computed).
///
/// The caller's blobs are not touched; the layer is set up on the copies.
#[allow(clippy::too_many_arguments)]
pub fn check_backward_in_place<T: Dtype>(
    layer: &mut dyn Layer<T>,
    bottom: &[Blob<T>],
    top: &[Blob<T>],
    computed_gradients: &[Option<Vec<T>>],
    propagate_down: &[bool],
    check_bottom: Option<usize>,
    target: Option<ObjectiveTarget>,
    config: &GradientCheckerConfig<T>,
    report: &mut CheckReport,
) -> Result<(), GradCheckError> {
    let pairs = bottom.len().min(top.len());
    let shared: Vec<bool> = (0..pairs)
        .map(|i| is_selected(check_bottom, i) && top[i].count() == bottom[i].count() && !layer.backward_reuses_top_diff(i))
        .collect();
    if !shared.iter().any(|&s| s) {
        log::debug!("{}: no bottom eligible for backward in place", layer.type_name());
        return Ok(());
    }
    report.backward_in_place_probes += 1;

    let mut scratch_bottom: Vec<Blob<T>> = bottom.iter().map(Blob::duplicate).collect();
    let scratch_top: Vec<Blob<T>> = top.iter().map(|_| Blob::empty()).collect();
    layer.setup(&scratch_bottom, &scratch_top)?;
    for (i, &share) in shared.iter().enumerate() {
        if share {
            scratch_bottom[i].share_diff(&scratch_top[i])?;
        }
    }
    layer.forward(&scratch_bottom, &scratch_top, &mut seeded_rng(config.seed))?;
    objective_and_gradient(&scratch_top, target)?;
    layer.backward(&scratch_top, propagate_down, &scratch_bottom)?;

    for (i, expected) in computed_gradients.iter().enumerate().take(pairs) {
        let Some(expected) = expected else {
            continue;
        };
        let actual = scratch_bottom[i].diff();
        for (element, (&e, &a)) in expected.iter().zip(&actual).enumerate() {
            if !e.abs_diff_eq(&a, config.threshold) {
                report.record(Violation::BackwardInPlaceDiff {
                    bottom_index: i,
                    element,
                    expected: widen(e),
                    actual: widen(a),
                    tolerance: widen(config.threshold),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "in_place_test.rs"]
mod tests;
