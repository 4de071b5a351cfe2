// src/nn/mod.rs
// Layer trait and the layers shipped with the crate.

pub mod layer;
pub mod layers;

// Re-export common items
pub use layer::Layer;
pub use layers::{DropoutLayer, EltwiseSumLayer, InnerProductLayer, PowerLayer, ReLULayer, ScaleLayer};
