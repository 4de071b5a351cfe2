use approx::AbsDiffEq;
use num_traits::{Float, NumAssignOps, NumCast};
use std::fmt::{Debug, Display};

use crate::error::CoreError;

/// Element type of blobs, layers and the gradient checker.
///
/// Restricted to floating-point types (`f32`, `f64`): finite differencing,
/// Gaussian noise and relative tolerances make no sense for integers.
pub trait Dtype:
    Float // Includes Num + Copy + NumCast + comparisons
    + NumAssignOps
    + AbsDiffEq<Epsilon = Self>
    + Debug
    + Display
    + Send
    + Sync
    + 'static
{
}

impl Dtype for f32 {}
impl Dtype for f64 {}

/// Converts an `f64` constant (filler parameters, noise mean, ...) into `T`.
pub fn cast<T: Dtype>(value: f64) -> Result<T, CoreError> {
    <T as NumCast>::from(value).ok_or(CoreError::NumericCast { value })
}

/// Widens a `T` into `f64` for reporting.
pub fn widen<T: Dtype>(value: T) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
