use crate::blob::Blob;
use crate::grad_check::report::GradCheckError;
use crate::nn::layer::Layer;
use crate::numeric::Dtype;

/// One blob whose diff is compared against finite differences.
#[derive(Debug)]
pub struct CheckedBlob<T: Dtype> {
    /// Alias of the layer parameter or bottom blob.
    pub blob: Blob<T>,
    /// Position in the bottom vector, `None` for parameter blobs.
    pub bottom_index: Option<usize>,
}

impl<T: Dtype> CheckedBlob<T> {
    /// Bottom diffs are accumulated into during the check, so they are
    /// pre-loaded with noise. Parameter diffs are overwritten.
    pub fn receives_noise(&self) -> bool {
        self.bottom_index.is_some()
    }
}

/// The blobs under test, in blob-id order: all parameter blobs, then the
/// selected bottoms.
#[derive(Debug)]
pub struct CheckedBlobSet<T: Dtype> {
    pub entries: Vec<CheckedBlob<T>>,
    pub propagate_down: Vec<bool>,
}

impl<T: Dtype> CheckedBlobSet<T> {
    /// Selects every parameter blob of `layer` and either every bottom
    /// (`check_bottom == None`) or only the one requested.
    pub fn select(layer: &dyn Layer<T>, bottom: &[Blob<T>], check_bottom: Option<usize>) -> Result<Self, GradCheckError> {
        if let Some(index) = check_bottom {
            if index >= bottom.len() {
                return Err(GradCheckError::CheckBottomOutOfRange {
                    check_bottom: index,
                    num_bottom: bottom.len(),
                });
            }
        }
        let mut entries: Vec<CheckedBlob<T>> = layer
            .blobs()
            .into_iter()
            .map(|blob| CheckedBlob { blob, bottom_index: None })
            .collect();
        let mut propagate_down = vec![check_bottom.is_none(); bottom.len()];
        for (i, blob) in bottom.iter().enumerate() {
            if is_selected(check_bottom, i) {
                entries.push(CheckedBlob {
                    blob: blob.alias(),
                    bottom_index: Some(i),
                });
                propagate_down[i] = true;
            }
        }
        Ok(CheckedBlobSet { entries, propagate_down })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Regroups per-entry gradients by bottom index.
    pub fn bottom_gradients(&self, gradients: &[Vec<T>], num_bottom: usize) -> Vec<Option<Vec<T>>> {
        let mut by_bottom: Vec<Option<Vec<T>>> = vec![None; num_bottom];
        for (entry, gradient) in self.entries.iter().zip(gradients) {
            if let Some(slot) = entry.bottom_index.and_then(|i| by_bottom.get_mut(i)) {
                *slot = Some(gradient.clone());
            }
        }
        by_bottom
    }
}

/// Whether bottom `index` is under test for the given `check_bottom` selection.
pub fn is_selected(check_bottom: Option<usize>, index: usize) -> bool {
    check_bottom.map_or(true, |selected| selected == index)
}
