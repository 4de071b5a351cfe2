use super::*;
use crate::error::CoreError;
use crate::filler::LayerRng;
use crate::nn::{InnerProductLayer, PowerLayer, ScaleLayer};

/// y = x², with switchable defects.
#[derive(Debug, Default)]
struct Square {
    claims_bottom_unused: bool,
    overwrite_on_accum: bool,
}

impl Layer<f64> for Square {
    fn type_name(&self) -> &'static str {
        "Square"
    }

    fn setup(&mut self, bottom: &[Blob<f64>], top: &[Blob<f64>]) -> Result<(), CoreError> {
        top[0].reshape_like(&bottom[0]);
        Ok(())
    }

    fn forward(&mut self, bottom: &[Blob<f64>], top: &[Blob<f64>], _rng: &mut LayerRng) -> Result<f64, CoreError> {
        top[0].set_data(&bottom[0].data().iter().map(|x| x * x).collect::<Vec<_>>())?;
        Ok(0.0)
    }

    fn backward(&mut self, top: &[Blob<f64>], propagate_down: &[bool], bottom: &[Blob<f64>]) -> Result<(), CoreError> {
        if propagate_down[0] {
            let dx: Vec<f64> = bottom[0]
                .data()
                .iter()
                .zip(top[0].diff())
                .map(|(x, dy)| 2.0 * x * dy)
                .collect();
            bottom[0].set_diff(&dx)?;
        }
        Ok(())
    }

    fn accum_backward(
        &mut self,
        top: &[Blob<f64>],
        propagate_down: &[bool],
        accum_down: &[bool],
        bottom: &[Blob<f64>],
    ) -> Result<(), CoreError> {
        if self.overwrite_on_accum {
            return self.backward(top, propagate_down, bottom);
        }
        let previous: Vec<Vec<f64>> = bottom.iter().map(Blob::diff).collect();
        self.backward(top, propagate_down, bottom)?;
        for ((blob, saved), (&p, &a)) in bottom.iter().zip(previous).zip(propagate_down.iter().zip(accum_down)) {
            if p && a {
                blob.accumulate_diff(&saved)?;
            }
        }
        Ok(())
    }

    fn backward_uses_bottom_data(&self, _bottom_index: usize) -> bool {
        !self.claims_bottom_unused
    }
}

/// Claims elementwise computation while owning a parameter.
#[derive(Debug)]
struct ElementwiseWithParam {
    param: Blob<f64>,
}

impl Layer<f64> for ElementwiseWithParam {
    fn type_name(&self) -> &'static str {
        "ElementwiseWithParam"
    }

    fn setup(&mut self, bottom: &[Blob<f64>], top: &[Blob<f64>]) -> Result<(), CoreError> {
        top[0].reshape_like(&bottom[0]);
        Ok(())
    }

    fn forward(&mut self, bottom: &[Blob<f64>], top: &[Blob<f64>], _rng: &mut LayerRng) -> Result<f64, CoreError> {
        top[0].copy_from(&bottom[0], false, false)?;
        Ok(0.0)
    }

    fn backward(&mut self, _top: &[Blob<f64>], _propagate_down: &[bool], _bottom: &[Blob<f64>]) -> Result<(), CoreError> {
        Ok(())
    }

    fn blobs(&self) -> Vec<Blob<f64>> {
        vec![self.param.alias()]
    }

    fn elementwise_only_computation(&self) -> bool {
        true
    }
}

/// Consumes its bottom and produces no top.
#[derive(Debug)]
struct Sink;

impl Layer<f64> for Sink {
    fn type_name(&self) -> &'static str {
        "Sink"
    }

    fn setup(&mut self, _bottom: &[Blob<f64>], _top: &[Blob<f64>]) -> Result<(), CoreError> {
        Ok(())
    }

    fn forward(&mut self, _bottom: &[Blob<f64>], _top: &[Blob<f64>], _rng: &mut LayerRng) -> Result<f64, CoreError> {
        Ok(0.0)
    }

    fn backward(&mut self, _top: &[Blob<f64>], _propagate_down: &[bool], _bottom: &[Blob<f64>]) -> Result<(), CoreError> {
        Ok(())
    }
}

fn checker() -> GradientChecker<f64> {
    GradientChecker::with_tolerances(1e-2, 1e-3).expect("valid tolerances")
}

fn input(values: &[f64]) -> Vec<Blob<f64>> {
    vec![Blob::from_vec(values.to_vec(), &[values.len()]).expect("valid shape")]
}

#[test]
fn test_new_rejects_invalid_config() {
    let result = GradientChecker::<f32>::with_tolerances(0.0, 1e-3);
    assert!(matches!(result, Err(GradCheckError::InvalidConfig(_))));
}

#[test]
fn test_scale_layer_passes_aggregate_check() -> Result<(), GradCheckError> {
    let mut bottom = input(&[1.0, -2.0, 0.5, 3.0]);
    let mut top = vec![Blob::empty()];
    let report = checker().check_gradient(&mut ScaleLayer::<f64>::new(2.0), &mut bottom, &mut top, None)?;
    report.assert_passed();
    assert_eq!(report.features_checked, 4);
    assert_eq!(report.forward_in_place_probes, 1);
    assert_eq!(report.backward_in_place_probes, 1);
    assert_eq!(bottom[0].data(), vec![1.0, -2.0, 0.5, 3.0]);
    assert!(!top[0].shares_data_with(&bottom[0]));
    Ok(())
}

#[test]
fn test_inner_product_checks_parameters_then_bottom() -> Result<(), GradCheckError> {
    let mut layer = InnerProductLayer::<f64>::new(2, true);
    let mut bottom = vec![Blob::from_vec(vec![0.1, -0.2, 0.3, 0.4, 0.5, -0.6], &[2, 3])?];
    let mut top = vec![Blob::empty()];
    let report = checker().check_gradient(&mut layer, &mut bottom, &mut top, None)?;
    report.assert_passed();
    // weight 2x3, bias 2, bottom 2x3
    assert_eq!(report.features_checked, 14);
    assert_eq!(report.forward_in_place_probes, 0);
    Ok(())
}

#[test]
fn test_exhaustive_square_compares_every_pair() -> Result<(), GradCheckError> {
    let mut bottom = input(&[0.5, -1.0, 1.5, 2.0]);
    let mut top = vec![Blob::empty()];
    let report = checker().check_gradient_exhaustive(&mut PowerLayer::<f64>::square(), &mut bottom, &mut top, None)?;
    report.assert_passed();
    assert_eq!(report.features_checked, 16);
    assert_eq!(report.forward_in_place_probes, 4);
    assert_eq!(report.backward_in_place_probes, 4);
    Ok(())
}

#[test]
fn test_overwriting_accumulation_is_reported() -> Result<(), GradCheckError> {
    let mut layer = Square {
        overwrite_on_accum: true,
        ..Square::default()
    };
    let mut bottom = input(&[0.5, -1.0, 1.5]);
    let mut top = vec![Blob::empty()];
    let report = checker().check_gradient(&mut layer, &mut bottom, &mut top, None)?;
    assert_eq!(report.violations.len(), 3);
    assert!(report
        .violations
        .iter()
        .all(|v| matches!(v, Violation::GradientMismatch { blob_id: 0, top_id: None, .. })));
    Ok(())
}

#[test]
fn test_accumulating_square_passes() -> Result<(), GradCheckError> {
    let mut bottom = input(&[0.5, -1.0, 1.5]);
    let mut top = vec![Blob::empty()];
    let report = checker().check_gradient(&mut Square::default(), &mut bottom, &mut top, None)?;
    report.assert_passed();
    Ok(())
}

#[test]
fn test_undeclared_bottom_dependency_is_reported() -> Result<(), GradCheckError> {
    let mut layer = Square {
        claims_bottom_unused: true,
        ..Square::default()
    };
    let mut bottom = input(&[0.5, -1.0, 1.5]);
    let mut top = vec![Blob::empty()];
    let report = checker().check_gradient(&mut layer, &mut bottom, &mut top, None)?;
    assert!(!report.is_ok());
    assert_eq!(bottom[0].data(), vec![0.5, -1.0, 1.5]);
    Ok(())
}

#[test]
fn test_check_bottom_out_of_range() {
    let mut bottom = input(&[1.0, 2.0]);
    let mut top = vec![Blob::empty()];
    let result = checker().check_gradient(&mut ScaleLayer::<f64>::new(2.0), &mut bottom, &mut top, Some(1));
    assert!(matches!(
        result,
        Err(GradCheckError::CheckBottomOutOfRange {
            check_bottom: 1,
            num_bottom: 1
        })
    ));
}

#[test]
fn test_target_out_of_range() -> Result<(), GradCheckError> {
    let mut layer = ScaleLayer::<f64>::new(2.0);
    let mut bottom = input(&[1.0, 2.0]);
    let mut top = vec![Blob::empty()];
    layer.setup(&bottom, &top)?;
    let target = ObjectiveTarget { top_id: 0, top_data_id: 2 };
    let result = checker().check_gradient_single(&mut layer, &mut bottom, &mut top, None, Some(target));
    assert!(matches!(result, Err(GradCheckError::TopElementOutOfRange { .. })));
    Ok(())
}

#[test]
fn test_exhaustive_requires_tops() {
    let mut bottom = input(&[1.0]);
    let mut top: Vec<Blob<f64>> = Vec::new();
    let result = checker().check_gradient_exhaustive(&mut Sink, &mut bottom, &mut top, None);
    assert_eq!(result, Err(GradCheckError::NoTopBlobs));
}

#[test]
fn test_elementwise_layer_with_parameters_is_rejected() {
    let mut layer = ElementwiseWithParam { param: Blob::new(&[1]) };
    let mut bottom = input(&[1.0, 2.0]);
    let mut top = vec![Blob::empty()];
    let result = checker().check_gradient_exhaustive(&mut layer, &mut bottom, &mut top, None);
    assert!(matches!(
        result,
        Err(GradCheckError::ElementwiseWithParameters { num_params: 1, .. })
    ));
}

#[test]
fn test_aliased_bottom_and_top_are_rejected() -> Result<(), GradCheckError> {
    let mut layer = ScaleLayer::<f64>::new(2.0);
    let mut bottom = input(&[1.0, 2.0]);
    let mut top = vec![bottom[0].alias()];
    layer.setup(&bottom, &top)?;
    let result = checker().check_gradient_single(&mut layer, &mut bottom, &mut top, None, None);
    assert_eq!(
        result,
        Err(GradCheckError::AliasedBottomTop {
            bottom_index: 0,
            top_index: 0
        })
    );
    Ok(())
}

#[test]
fn test_bottom_resized_after_setup_is_an_error() -> Result<(), GradCheckError> {
    let mut layer = InnerProductLayer::<f64>::new(2, true);
    let mut top = vec![Blob::empty()];
    layer.setup(&[Blob::new(&[2, 3])], &top)?;
    let mut bottom = vec![Blob::from_vec(vec![0.1, -0.2, 0.3], &[1, 3])?];
    let result = checker().check_gradient_single(&mut layer, &mut bottom, &mut top, None, None);
    assert!(matches!(
        result,
        Err(GradCheckError::Core(CoreError::CountMismatch { expected: 6, actual: 3, .. }))
    ));
    Ok(())
}

#[test]
fn test_single_check_requires_prior_setup() {
    let mut layer = InnerProductLayer::<f64>::new(2, true);
    let mut bottom = vec![Blob::new(&[2, 3])];
    let mut top = vec![Blob::empty()];
    let result = checker().check_gradient_single(&mut layer, &mut bottom, &mut top, None, None);
    assert!(matches!(result, Err(GradCheckError::Core(CoreError::InternalError(_)))));
}
