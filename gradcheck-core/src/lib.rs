//! Finite-difference gradient checking for neural-network layers.
//!
//! A [`Layer`] computes its outputs in `forward` and the gradient of a scalar
//! objective with respect to its inputs and parameters in `backward`. The
//! [`GradientChecker`] verifies those gradients numerically, and also probes the
//! promises a layer makes about in-place execution, gradient accumulation and
//! the data its backward pass reads.

pub mod blob;
pub mod error;
pub mod filler;
pub mod grad_check;
pub mod model;
pub mod nn;
pub mod numeric;

pub use blob::Blob;
pub use error::CoreError;
pub use filler::{seeded_rng, LayerRng};
pub use grad_check::{CheckReport, GradCheckError, GradientChecker, GradientCheckerConfig, NetCheckReport, ObjectiveTarget};
pub use model::Net;
pub use nn::Layer;
pub use numeric::Dtype;

// Re-export traits required by public functions/structs
pub use num_traits;
