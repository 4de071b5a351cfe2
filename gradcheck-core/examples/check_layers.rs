//! # Checking Layer Gradients
//!
//! Runs the gradient checker over the bundled layers and over a small net,
//! then over a layer with a deliberately broken backward pass to show what a
//! failing report looks like.
//!
//! ## Running
//! `RUST_LOG=info cargo run --example check_layers`

use gradcheck_core::error::CoreError;
use gradcheck_core::filler::{seeded_rng, Filler, GaussianFiller, LayerRng};
use gradcheck_core::nn::layer::Layer;
use gradcheck_core::nn::{DropoutLayer, EltwiseSumLayer, InnerProductLayer, PowerLayer, ReLULayer, ScaleLayer};
use gradcheck_core::{Blob, GradCheckError, GradientChecker, GradientCheckerConfig, Net};

/// y = 3x whose backward forgets the factor.
#[derive(Debug)]
struct BrokenTriple;

impl Layer<f64> for BrokenTriple {
    fn type_name(&self) -> &'static str {
        "BrokenTriple"
    }

    fn setup(&mut self, bottom: &[Blob<f64>], top: &[Blob<f64>]) -> Result<(), CoreError> {
        top[0].reshape_like(&bottom[0]);
        Ok(())
    }

    fn forward(&mut self, bottom: &[Blob<f64>], top: &[Blob<f64>], _rng: &mut LayerRng) -> Result<f64, CoreError> {
        top[0].set_data(&bottom[0].data().iter().map(|x| 3.0 * x).collect::<Vec<_>>())?;
        Ok(0.0)
    }

    fn backward(&mut self, top: &[Blob<f64>], propagate_down: &[bool], bottom: &[Blob<f64>]) -> Result<(), CoreError> {
        if propagate_down[0] {
            bottom[0].set_diff(&top[0].diff())?;
        }
        Ok(())
    }
}

fn random_blob(shape: &[usize], seed: u64) -> Result<Blob<f64>, CoreError> {
    let blob = Blob::new(shape);
    GaussianFiller { mean: 0.0, std: 1.0 }.fill(&blob, &mut seeded_rng(seed))?;
    Ok(blob)
}

fn check_layer(
    checker: &GradientChecker<f64>,
    layer: &mut dyn Layer<f64>,
    bottom_shapes: &[&[usize]],
) -> Result<(), GradCheckError> {
    let mut bottom = bottom_shapes
        .iter()
        .enumerate()
        .map(|(i, shape)| random_blob(shape, 100 + i as u64))
        .collect::<Result<Vec<_>, _>>()?;
    let mut top = vec![Blob::empty()];
    let report = checker.check_gradient_exhaustive(layer, &mut bottom, &mut top, None)?;
    println!(
        "{:<14} {:>5} compared, {:>3} in kink, {} violation(s)",
        layer.type_name(),
        report.features_checked,
        report.features_in_kink,
        report.violations.len()
    );
    Ok(())
}

fn main() -> Result<(), GradCheckError> {
    env_logger::init();

    let config = GradientCheckerConfig::new(1e-2, 1e-3).with_kink(0.0, 1e-2);
    let checker = GradientChecker::new(config)?;

    println!("--- Layers ---");
    check_layer(&checker, &mut ScaleLayer::<f64>::new(-1.5), &[&[2, 3]])?;
    check_layer(&checker, &mut PowerLayer::<f64>::new(2.0, 0.5, 0.1), &[&[2, 3]])?;
    check_layer(&checker, &mut ReLULayer::<f64>::leaky(0.01), &[&[2, 3]])?;
    check_layer(&checker, &mut InnerProductLayer::<f64>::new(4, true), &[&[2, 3]])?;
    check_layer(&checker, &mut DropoutLayer::<f64>::new(0.3)?, &[&[6]])?;
    check_layer(&checker, &mut EltwiseSumLayer::<f64>::new(vec![0.5, 2.0]), &[&[4], &[4]])?;

    println!("--- Net ---");
    let mut net = Net::<f64>::new("demo");
    net.add_input("data", &[2, 4])?;
    net.add_layer("ip1", Box::new(InnerProductLayer::<f64>::new(3, true)), &["data"], &["ip1"])?;
    net.add_layer("relu1", Box::new(ReLULayer::<f64>::new()), &["ip1"], &["relu1"])?;
    net.add_layer("ip2", Box::new(InnerProductLayer::<f64>::new(2, false)), &["relu1"], &["ip2"])?;
    let input = vec![random_blob(&[2, 4], 7)?];
    let net_report = checker.check_gradient_net(&mut net, &input)?;
    for (name, report) in &net_report.layers {
        println!("{:<14} {:>5} compared, {} violation(s)", name, report.features_checked, report.violations.len());
    }

    println!("--- Broken layer ---");
    let mut bottom = vec![random_blob(&[3], 8)?];
    let mut top = vec![Blob::empty()];
    let report = checker.check_gradient(&mut BrokenTriple, &mut bottom, &mut top, None)?;
    for violation in &report.violations {
        println!("{}", violation);
    }
    match report.into_result() {
        Ok(_) => println!("unexpectedly passed"),
        Err(err) => println!("{}", err),
    }
    Ok(())
}
