use gradcheck_core::filler::{FillerKind, UniformFiller};
use gradcheck_core::nn::{DropoutLayer, EltwiseSumLayer, InnerProductLayer, PowerLayer, ReLULayer, ScaleLayer};
use gradcheck_core::{Blob, GradCheckError, GradientChecker, GradientCheckerConfig};

mod common;
use common::{blob, gaussian_blob, init_logger};

#[test]
fn test_scale_by_two_passes() -> Result<(), GradCheckError> {
    init_logger();
    let checker = GradientChecker::<f32>::with_tolerances(1e-2, 1e-2)?;
    let mut bottom = vec![gaussian_blob::<f32>(&[2, 3], 1)];
    let mut top = vec![Blob::empty()];
    let report = checker.check_gradient(&mut ScaleLayer::<f32>::new(2.0), &mut bottom, &mut top, None)?;
    report.assert_passed();
    assert_eq!(report.features_checked, 6);
    assert_eq!(top[0].shape(), vec![2, 3]);
    Ok(())
}

#[test]
fn test_scale_exhaustive_passes() -> Result<(), GradCheckError> {
    init_logger();
    let checker = GradientChecker::<f32>::with_tolerances(1e-2, 1e-2)?;
    let mut bottom = vec![gaussian_blob::<f32>(&[4], 2)];
    let mut top = vec![Blob::empty()];
    let report = checker.check_gradient_exhaustive(&mut ScaleLayer::<f32>::new(-0.5), &mut bottom, &mut top, None)?;
    report.assert_passed();
    assert_eq!(report.features_checked, 16);
    Ok(())
}

#[test]
fn test_square_exhaustive_passes() -> Result<(), GradCheckError> {
    init_logger();
    let checker = GradientChecker::<f32>::with_tolerances(1e-2, 1e-2)?;
    let mut bottom = vec![blob(vec![0.3f32, -1.2, 2.0, 0.7], &[4])];
    let mut top = vec![Blob::empty()];
    let report = checker.check_gradient_exhaustive(&mut PowerLayer::<f32>::square(), &mut bottom, &mut top, None)?;
    report.assert_passed();
    assert_eq!(report.features_checked, 16);
    assert_eq!(report.features_in_kink, 0);
    Ok(())
}

#[test]
fn test_power_with_shift_and_scale_passes() -> Result<(), GradCheckError> {
    init_logger();
    let checker = GradientChecker::<f64>::with_tolerances(1e-3, 1e-3)?;
    // (1 + 0.5x)^3 with 1 + 0.5x kept positive.
    let mut bottom = vec![blob(vec![0.2f64, -0.8, 1.1, 0.4, -1.5, 0.9], &[2, 3])];
    let mut top = vec![Blob::empty()];
    let mut layer = PowerLayer::<f64>::new(3.0, 0.5, 1.0);
    let report = checker.check_gradient_exhaustive(&mut layer, &mut bottom, &mut top, None)?;
    report.assert_passed();
    Ok(())
}

#[test]
fn test_relu_needs_kink_band() -> Result<(), GradCheckError> {
    init_logger();
    let values = vec![-1.0f64, 0.5, 0.004, 2.0, -0.003, -0.7];
    let config = GradientCheckerConfig::new(1e-2f64, 1e-3).with_kink(0.0, 1e-2);
    let checker = GradientChecker::new(config)?;
    let mut bottom = vec![blob(values.clone(), &[6])];
    let mut top = vec![Blob::empty()];
    let report = checker.check_gradient_exhaustive(&mut ReLULayer::<f64>::new(), &mut bottom, &mut top, None)?;
    report.assert_passed();
    // Two of six inputs sit inside the band, once per targeted top element.
    assert_eq!(report.features_in_kink, 12);
    assert_eq!(report.features_checked, 24);

    // Without the band the steps straddle zero and the estimate is off.
    let strict = GradientChecker::<f64>::with_tolerances(1e-2, 1e-3)?;
    let mut bottom = vec![blob(values, &[6])];
    let mut top = vec![Blob::empty()];
    let report = strict.check_gradient_exhaustive(&mut ReLULayer::<f64>::new(), &mut bottom, &mut top, None)?;
    assert!(!report.is_ok());
    Ok(())
}

#[test]
fn test_leaky_relu_passes() -> Result<(), GradCheckError> {
    init_logger();
    let config = GradientCheckerConfig::new(1e-2f32, 1e-3).with_kink(0.0, 1e-2);
    let checker = GradientChecker::new(config)?;
    let mut bottom = vec![blob(vec![-1.5f32, 0.8, -0.2, 1.3], &[2, 2])];
    let mut top = vec![Blob::empty()];
    let report = checker.check_gradient_exhaustive(&mut ReLULayer::<f32>::leaky(0.1), &mut bottom, &mut top, None)?;
    report.assert_passed();
    Ok(())
}

#[test]
fn test_inner_product_with_bias_passes() -> Result<(), GradCheckError> {
    init_logger();
    let checker = GradientChecker::<f32>::with_tolerances(1e-2, 1e-3)?;
    let mut bottom = vec![gaussian_blob::<f32>(&[2, 3], 3)];
    let mut top = vec![Blob::empty()];
    let mut layer = InnerProductLayer::<f32>::new(4, true);
    let report = checker.check_gradient_exhaustive(&mut layer, &mut bottom, &mut top, None)?;
    report.assert_passed();
    // 8 targets x (12 weights + 4 biases + 6 inputs)
    assert_eq!(report.features_checked, 8 * 22);
    Ok(())
}

#[test]
fn test_inner_product_without_bias_passes() -> Result<(), GradCheckError> {
    init_logger();
    let checker = GradientChecker::<f64>::with_tolerances(1e-2, 1e-3)?;
    let mut bottom = vec![gaussian_blob::<f64>(&[3, 2], 4)];
    let mut top = vec![Blob::empty()];
    let mut layer = InnerProductLayer::<f64>::new(2, false)
        .with_weight_filler(FillerKind::Uniform(UniformFiller { min: -1.0, max: 1.0 }))
        .with_init_seed(9);
    let report = checker.check_gradient(&mut layer, &mut bottom, &mut top, None)?;
    report.assert_passed();
    assert_eq!(report.features_checked, 4 + 6);
    Ok(())
}

#[test]
fn test_dropout_passes_with_fixed_seed() -> Result<(), GradCheckError> {
    init_logger();
    let checker = GradientChecker::<f64>::new(GradientCheckerConfig::new(1e-2, 1e-3).with_seed(42))?;
    let mut bottom = vec![gaussian_blob::<f64>(&[8], 5)];
    let mut top = vec![Blob::empty()];
    let mut layer = DropoutLayer::<f64>::new(0.5)?;
    let report = checker.check_gradient_exhaustive(&mut layer, &mut bottom, &mut top, None)?;
    report.assert_passed();
    assert_eq!(report.features_checked, 64);
    Ok(())
}

#[test]
fn test_eltwise_sum_passes() -> Result<(), GradCheckError> {
    init_logger();
    let checker = GradientChecker::<f32>::with_tolerances(1e-2, 1e-3)?;
    let mut bottom = vec![gaussian_blob::<f32>(&[3], 6), gaussian_blob::<f32>(&[3], 7)];
    let mut top = vec![Blob::empty()];
    let mut layer = EltwiseSumLayer::<f32>::new(vec![1.0, -2.0]);
    let report = checker.check_gradient_exhaustive(&mut layer, &mut bottom, &mut top, None)?;
    report.assert_passed();
    assert_eq!(report.features_checked, 3 * 6);
    Ok(())
}

#[test]
fn test_eltwise_sum_single_bottom() -> Result<(), GradCheckError> {
    init_logger();
    let checker = GradientChecker::<f64>::with_tolerances(1e-2, 1e-3)?;
    let mut bottom = vec![gaussian_blob::<f64>(&[3], 8), gaussian_blob::<f64>(&[3], 9)];
    let mut top = vec![Blob::empty()];
    let report = checker.check_gradient_exhaustive(&mut EltwiseSumLayer::<f64>::sum(2), &mut bottom, &mut top, Some(1))?;
    report.assert_passed();
    assert_eq!(report.features_checked, 3 * 3);
    // Index 0 is not checked, so no in-place pairing is tried.
    assert_eq!(report.forward_in_place_probes, 0);
    assert_eq!(report.backward_in_place_probes, 0);
    Ok(())
}

#[test]
fn test_check_leaves_inputs_unchanged() -> Result<(), GradCheckError> {
    init_logger();
    let checker = GradientChecker::<f64>::with_tolerances(1e-2, 1e-3)?;
    let values = vec![0.25f64, -0.75, 1.5];
    let mut bottom = vec![blob(values.clone(), &[3])];
    let mut top = vec![Blob::empty()];
    checker.check_gradient_exhaustive(&mut PowerLayer::<f64>::square(), &mut bottom, &mut top, None)?;
    assert_eq!(bottom[0].data(), values);
    Ok(())
}
