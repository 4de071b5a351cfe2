use crate::blob::Blob;
use crate::grad_check::report::GradCheckError;
use crate::numeric::Dtype;

/// Selects a single top element as the objective instead of the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectiveTarget {
    pub top_id: usize,
    pub top_data_id: usize,
}

/// Checks that `target` names an existing top element.
pub fn validate_target<T: Dtype>(top: &[Blob<T>], target: Option<ObjectiveTarget>) -> Result<(), GradCheckError> {
    let Some(target) = target else {
        return Ok(());
    };
    let blob = top.get(target.top_id).ok_or(GradCheckError::TopOutOfRange {
        top_id: target.top_id,
        num_top: top.len(),
    })?;
    if target.top_data_id >= blob.count() {
        return Err(GradCheckError::TopElementOutOfRange {
            top_id: target.top_id,
            top_data_id: target.top_data_id,
            count: blob.count(),
        });
    }
    Ok(())
}

/// Computes the synthetic objective from the current top values and writes its
/// gradient into the top diffs.
///
/// Without a target the objective is `½ Σ x²` over every top element and each
/// top diff becomes a copy of its data. With a target the objective is that one
/// element: every top diff is zeroed and the targeted slot is set to 1.
pub fn objective_and_gradient<T: Dtype>(top: &[Blob<T>], target: Option<ObjectiveTarget>) -> Result<T, GradCheckError> {
    validate_target(top, target)?;
    match target {
        None => {
            let mut loss = T::zero();
            for blob in top {
                let data = blob.data();
                for &x in &data {
                    loss += x * x;
                }
                blob.set_diff(&data)?;
            }
            Ok(loss / (T::one() + T::one()))
        }
        Some(target) => {
            for blob in top {
                blob.fill_diff(T::zero());
            }
            let blob = &top[target.top_id];
            blob.set_diff_at(target.top_data_id, T::one())?;
            Ok(blob.data_at(target.top_data_id)?)
        }
    }
}
