// src/grad_check/mod.rs
// Finite-difference verification of layer gradients.

pub mod checked_set;
pub mod config;
pub mod corruption;
pub mod driver;
pub mod finite_diff;
pub mod in_place;
pub mod noise;
pub mod objective;
pub mod report;

// Re-export the checker's public surface
pub use config::{GradientCheckerConfig, DEFAULT_SEED};
pub use driver::GradientChecker;
pub use objective::ObjectiveTarget;
pub use report::{CheckReport, GradCheckError, NetCheckReport, Violation};
