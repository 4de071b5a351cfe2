use crate::blob::Blob;
use crate::grad_check::checked_set::CheckedBlobSet;
use crate::grad_check::config::GradientCheckerConfig;
use crate::grad_check::corruption::{corrupt_unused_data, restore_bottom_data};
use crate::grad_check::finite_diff::{compare_feature, estimate_gradient, FeatureComparison};
use crate::grad_check::in_place::{check_backward_in_place, check_forward_in_place};
use crate::grad_check::noise::{inject_noise, recover_gradients};
use crate::grad_check::objective::{objective_and_gradient, validate_target, ObjectiveTarget};
use crate::grad_check::report::{CheckReport, GradCheckError, NetCheckReport, Violation};
use crate::model::Net;
use crate::nn::layer::Layer;
use crate::numeric::{widen, Dtype};

/// Verifies a layer's analytic gradients against central finite differences.
///
/// Besides gradient values, a check exercises the layer's declared
/// capabilities: accumulation into pre-filled bottom diffs, in-place forward and
/// backward where the layer allows them, and independence from data the layer
/// claims its backward does not read. Every failure is collected into the
/// returned [`CheckReport`]; `Err` is reserved for misuse.
///
/// Bottom and top blobs are taken as mutable slices because the in-place forward
/// probe temporarily swaps top handles. They are back in place when a driver
/// returns.
#[derive(Debug, Clone)]
pub struct GradientChecker<T: Dtype> {
    config: GradientCheckerConfig<T>,
}

impl<T: Dtype> GradientChecker<T> {
    pub fn new(config: GradientCheckerConfig<T>) -> Result<Self, GradCheckError> {
        config.validate()?;
        Ok(GradientChecker { config })
    }

    /// Checker with the default seed and an empty kink band.
    pub fn with_tolerances(stepsize: T, threshold: T) -> Result<Self, GradCheckError> {
        Self::new(GradientCheckerConfig::new(stepsize, threshold))
    }

    pub fn config(&self) -> &GradientCheckerConfig<T> {
        &self.config
    }

    /// Sets the layer up and checks it against the aggregate `½ Σ top²`
    /// objective. `check_bottom = None` checks every bottom.
    pub fn check_gradient(
        &self,
        layer: &mut dyn Layer<T>,
        bottom: &mut [Blob<T>],
        top: &mut [Blob<T>],
        check_bottom: Option<usize>,
    ) -> Result<CheckReport, GradCheckError> {
        layer.setup(bottom, top)?;
        log::debug!("{}: checking gradient against the aggregate objective", layer.type_name());
        self.check_gradient_single(layer, bottom, top, check_bottom, None)
    }

    /// Sets the layer up once and runs one targeted check per element of every
    /// top blob.
    pub fn check_gradient_exhaustive(
        &self,
        layer: &mut dyn Layer<T>,
        bottom: &mut [Blob<T>],
        top: &mut [Blob<T>],
        check_bottom: Option<usize>,
    ) -> Result<CheckReport, GradCheckError> {
        layer.setup(bottom, top)?;
        if top.is_empty() {
            return Err(GradCheckError::NoTopBlobs);
        }
        let mut report = CheckReport::default();
        for top_id in 0..top.len() {
            let count = top[top_id].count();
            log::debug!(
                "{}: exhaustive check over top {} ({} element(s))",
                layer.type_name(),
                top_id,
                count
            );
            for top_data_id in 0..count {
                let target = ObjectiveTarget { top_id, top_data_id };
                report.merge(self.check_gradient_single(layer, bottom, top, check_bottom, Some(target))?);
            }
        }
        Ok(report)
    }

    /// One complete check on an already set-up layer.
    ///
    /// Does not call `setup`. The caller must have set the layer up on blobs
    /// of the same shapes as `bottom` and `top`; layers that size buffers or
    /// parameters in `setup` return an error otherwise. [`Self::check_gradient`]
    /// and [`Self::check_gradient_exhaustive`] do the set-up themselves.
    ///
    /// `target` selects a single top element as the objective; `None` uses
    /// the aggregate objective. Layer parameters are always checked; bottoms
    /// are checked all at once or only `check_bottom`.
    pub fn check_gradient_single(
        &self,
        layer: &mut dyn Layer<T>,
        bottom: &mut [Blob<T>],
        top: &mut [Blob<T>],
        check_bottom: Option<usize>,
        target: Option<ObjectiveTarget>,
    ) -> Result<CheckReport, GradCheckError> {
        let config = &self.config;
        validate_target(top, target)?;
        check_no_aliasing(bottom, top)?;
        let elementwise_target = match target {
            Some(target) if layer.elementwise_only_computation() => {
                check_elementwise(&*layer, bottom, top, target)?;
                Some(target)
            }
            _ => None,
        };

        let checked = CheckedBlobSet::select(&*layer, bottom, check_bottom)?;
        log::debug!(
            "{}: checking {} blob(s), target {:?}",
            layer.type_name(),
            checked.len(),
            target
        );
        let noise = inject_noise(&checked.entries, config.seed)?;
        let mut report = CheckReport::default();

        let layer_objective = layer.forward(bottom, top, &mut config.rng())?;
        check_forward_in_place(layer, bottom, top, check_bottom, layer_objective, config.seed, &mut report)?;
        let computed_objective = layer_objective + objective_and_gradient(top, target)?;
        log::trace!("{}: objective {}", layer.type_name(), widen(computed_objective));

        let backups = corrupt_unused_data(&*layer, bottom, top, config.seed)?;
        let accum_down = vec![true; bottom.len()];
        let backward = layer.accum_backward(top, &checked.propagate_down, &accum_down, bottom);
        restore_bottom_data(bottom, &backups)?;
        backward?;
        let computed_gradients = recover_gradients(&checked.entries, &noise)?;

        let bottom_gradients = checked.bottom_gradients(&computed_gradients, bottom.len());
        check_backward_in_place(
            layer,
            bottom,
            top,
            &bottom_gradients,
            &checked.propagate_down,
            check_bottom,
            target,
            config,
            &mut report,
        )?;

        let (top_id, top_data_id) = match target {
            Some(target) => (Some(target.top_id), Some(target.top_data_id)),
            None => (None, None),
        };
        for (blob_id, (entry, computed)) in checked.entries.iter().zip(&computed_gradients).enumerate() {
            for (feat_id, &computed) in computed.iter().enumerate() {
                let estimated = match elementwise_target {
                    Some(target) if target.top_data_id != feat_id => T::zero(),
                    _ => estimate_gradient(layer, bottom, top, &entry.blob, feat_id, target, config)?,
                };
                let feature = entry.blob.data_at(feat_id)?;
                log::trace!(
                    "blob {} feature {}: value {}, computed {}, estimated {}",
                    blob_id,
                    feat_id,
                    widen(feature),
                    widen(computed),
                    widen(estimated)
                );
                match compare_feature(config, feature, computed, estimated) {
                    FeatureComparison::InKink => report.features_in_kink += 1,
                    FeatureComparison::Match { .. } => report.features_checked += 1,
                    FeatureComparison::Mismatch { tolerance } => {
                        report.features_checked += 1;
                        report.record(Violation::GradientMismatch {
                            top_id,
                            top_data_id,
                            blob_id,
                            feat_id,
                            computed: widen(computed),
                            estimated: widen(estimated),
                            tolerance: widen(tolerance),
                        });
                    }
                }
            }
        }
        Ok(report)
    }

    /// Checks every layer of `net` exhaustively, in order.
    ///
    /// Before each layer the whole net runs forward on `input` from a freshly
    /// seeded generator, so the layer sees the blob values an ordinary forward
    /// pass produces. A layer whose top is computed in place over one of its
    /// bottoms cannot be checked and yields [`GradCheckError::AliasedBottomTop`].
    pub fn check_gradient_net(&self, net: &mut Net<T>, input: &[Blob<T>]) -> Result<NetCheckReport, GradCheckError> {
        let mut report = NetCheckReport::default();
        for i in 0..net.num_layers() {
            net.forward(input, &mut self.config.rng())?;
            let name = net.layer_names()[i].clone();
            log::info!("Net '{}': checking gradient for layer '{}'", net.name(), name);
            let mut bottom = net.bottom_vec(i)?;
            let mut top = net.top_vec(i)?;
            let layer = net.layer_mut(i)?;
            let layer_report = self.check_gradient_exhaustive(layer.as_mut(), &mut bottom, &mut top, None)?;
            log::info!(
                "Net '{}': layer '{}' compared {} feature(s), {} violation(s)",
                net.name(),
                name,
                layer_report.features_checked,
                layer_report.violations.len()
            );
            report.layers.push((name, layer_report));
        }
        Ok(report)
    }
}

/// Bottoms and tops must live in separate storage; finite differences perturb
/// bottom values that an aliased top would overwrite.
fn check_no_aliasing<T: Dtype>(bottom: &[Blob<T>], top: &[Blob<T>]) -> Result<(), GradCheckError> {
    for (bottom_index, b) in bottom.iter().enumerate() {
        if let Some(top_index) = top.iter().position(|t| t.shares_data_with(b)) {
            return Err(GradCheckError::AliasedBottomTop { bottom_index, top_index });
        }
    }
    Ok(())
}

fn check_elementwise<T: Dtype>(
    layer: &dyn Layer<T>,
    bottom: &[Blob<T>],
    top: &[Blob<T>],
    target: ObjectiveTarget,
) -> Result<(), GradCheckError> {
    let num_params = layer.blobs().len();
    if num_params != 0 {
        return Err(GradCheckError::ElementwiseWithParameters {
            layer: layer.type_name().to_string(),
            num_params,
        });
    }
    let expected = top[target.top_id].count();
    for (bottom_index, blob) in bottom.iter().enumerate() {
        if blob.count() != expected {
            return Err(GradCheckError::ElementwiseCountMismatch {
                layer: layer.type_name().to_string(),
                bottom_index,
                expected,
                actual: blob.count(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "driver_test.rs"]
mod tests;
