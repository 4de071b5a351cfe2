// src/nn/layers/mod.rs
// Layers exercised by the gradient checker.

pub mod dropout;
pub mod eltwise_sum;
pub mod inner_product;
pub mod power;
pub mod relu;
pub mod scale;

// Re-export key layer structs
pub use dropout::DropoutLayer;
pub use eltwise_sum::EltwiseSumLayer;
pub use inner_product::InnerProductLayer;
pub use power::PowerLayer;
pub use relu::ReLULayer;
pub use scale::ScaleLayer;
