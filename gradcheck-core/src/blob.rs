use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::CoreError;
use crate::numeric::Dtype;

type Shared<V> = Arc<RwLock<V>>;

fn read_lock<V>(lock: &RwLock<V>) -> RwLockReadGuard<'_, V> {
    lock.read().unwrap_or_else(|poisoned| {
        log::warn!("RwLock for blob storage was poisoned. Recovering read guard.");
        poisoned.into_inner()
    })
}

fn write_lock<V>(lock: &RwLock<V>) -> RwLockWriteGuard<'_, V> {
    lock.write().unwrap_or_else(|poisoned| {
        log::warn!("RwLock for blob storage was poisoned. Recovering write guard.");
        poisoned.into_inner()
    })
}

/// A value array ("data") paired with a gradient array ("diff") of the same shape.
///
/// Shape, data and diff live in reference-counted storage. [`Blob::alias`] returns a
/// second handle onto the *same* storage, and [`Blob::share_data`] /
/// [`Blob::share_diff`] rebind one of the arrays of this handle onto another blob's
/// storage. The handle that created the storage and its aliases are equals: writes
/// through any of them are visible through all of them, and nothing is ever copied
/// implicitly.
///
/// Every accessor takes its lock for the duration of the call only, so reading an
/// aliased bottom while writing the corresponding top never deadlocks.
pub struct Blob<T: Dtype> {
    shape: Shared<Vec<usize>>,
    data: Shared<Vec<T>>,
    diff: Shared<Vec<T>>,
}

impl<T: Dtype> Blob<T> {
    /// Creates a zero-filled blob (data and diff) with the given shape.
    pub fn new(shape: &[usize]) -> Self {
        let count: usize = shape.iter().product();
        Blob {
            shape: Arc::new(RwLock::new(shape.to_vec())),
            data: Arc::new(RwLock::new(vec![T::zero(); count])),
            diff: Arc::new(RwLock::new(vec![T::zero(); count])),
        }
    }

    /// Creates a blob holding `data` with a zero diff.
    ///
    /// # Errors
    /// Returns `CoreError::BlobCreationError` if the length of `data` does not match
    /// the number of elements described by `shape`.
    pub fn from_vec(data: Vec<T>, shape: &[usize]) -> Result<Self, CoreError> {
        let count: usize = shape.iter().product();
        if data.len() != count {
            return Err(CoreError::BlobCreationError {
                data_len: data.len(),
                shape: shape.to_vec(),
            });
        }
        Ok(Blob {
            shape: Arc::new(RwLock::new(shape.to_vec())),
            data: Arc::new(RwLock::new(data)),
            diff: Arc::new(RwLock::new(vec![T::zero(); count])),
        })
    }

    /// Creates a blob with no elements, to be shaped later by a layer's `setup`.
    pub fn empty() -> Self {
        Self::new(&[0])
    }

    pub fn shape(&self) -> Vec<usize> {
        read_lock(&self.shape).clone()
    }

    pub fn count(&self) -> usize {
        read_lock(&self.shape).iter().product()
    }

    /// Changes the shape, resizing data and diff in place.
    ///
    /// Existing values are kept where the storage already has them; new slots are
    /// zero. Aliases observe the new shape since the shape is shared too.
    pub fn reshape(&self, shape: &[usize]) {
        let count: usize = shape.iter().product();
        {
            let mut current = write_lock(&self.shape);
            if current.as_slice() == shape && read_lock(&self.data).len() == count {
                return;
            }
            *current = shape.to_vec();
        }
        write_lock(&self.data).resize(count, T::zero());
        write_lock(&self.diff).resize(count, T::zero());
    }

    pub fn reshape_like(&self, other: &Blob<T>) {
        self.reshape(&other.shape());
    }

    /// Snapshot of the value array.
    pub fn data(&self) -> Vec<T> {
        read_lock(&self.data).clone()
    }

    /// Snapshot of the gradient array.
    pub fn diff(&self) -> Vec<T> {
        read_lock(&self.diff).clone()
    }

    pub fn data_at(&self, index: usize) -> Result<T, CoreError> {
        let data = read_lock(&self.data);
        data.get(index).copied().ok_or(CoreError::IndexOutOfBounds {
            index,
            count: data.len(),
        })
    }

    pub fn diff_at(&self, index: usize) -> Result<T, CoreError> {
        let diff = read_lock(&self.diff);
        diff.get(index).copied().ok_or(CoreError::IndexOutOfBounds {
            index,
            count: diff.len(),
        })
    }

    /// Overwrites the whole value array.
    pub fn set_data(&self, values: &[T]) -> Result<(), CoreError> {
        Self::overwrite(&self.data, values, "set_data")
    }

    /// Overwrites the whole gradient array.
    pub fn set_diff(&self, values: &[T]) -> Result<(), CoreError> {
        Self::overwrite(&self.diff, values, "set_diff")
    }

    pub fn set_data_at(&self, index: usize, value: T) -> Result<(), CoreError> {
        Self::update_at(&self.data, index, |slot| *slot = value)
    }

    pub fn set_diff_at(&self, index: usize, value: T) -> Result<(), CoreError> {
        Self::update_at(&self.diff, index, |slot| *slot = value)
    }

    pub fn fill_data(&self, value: T) {
        write_lock(&self.data).fill(value);
    }

    pub fn fill_diff(&self, value: T) {
        write_lock(&self.diff).fill(value);
    }

    /// Runs `f` with mutable access to the value array.
    ///
    /// Do not touch any blob sharing this storage from inside `f`.
    pub fn with_data_mut<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> R {
        f(write_lock(&self.data).as_mut_slice())
    }

    /// Adds `delta` elementwise into the gradient array.
    pub fn accumulate_diff(&self, delta: &[T]) -> Result<(), CoreError> {
        let mut diff = write_lock(&self.diff);
        if diff.len() != delta.len() {
            return Err(CoreError::CountMismatch {
                expected: diff.len(),
                actual: delta.len(),
                operation: "accumulate_diff".to_string(),
            });
        }
        for (slot, &d) in diff.iter_mut().zip(delta) {
            *slot += d;
        }
        Ok(())
    }

    /// Copies values (and optionally diffs) from `source` into this blob's storage.
    ///
    /// With `reshape = false` the element counts must already match.
    pub fn copy_from(&self, source: &Blob<T>, copy_diff: bool, reshape: bool) -> Result<(), CoreError> {
        if source.count() != self.count() || source.shape() != self.shape() {
            if reshape {
                self.reshape_like(source);
            } else if source.count() != self.count() {
                return Err(CoreError::CountMismatch {
                    expected: self.count(),
                    actual: source.count(),
                    operation: "copy_from".to_string(),
                });
            }
        }
        // Snapshot first: source may share storage with self.
        let values = if copy_diff { source.diff() } else { source.data() };
        if copy_diff {
            self.set_diff(&values)
        } else {
            self.set_data(&values)
        }
    }

    /// Deep copy of shape and values into fresh storage, with a zero diff.
    pub fn duplicate(&self) -> Blob<T> {
        let copy = Blob::new(&self.shape());
        let values = self.data();
        copy.with_data_mut(|data| data.copy_from_slice(&values));
        copy
    }

    /// A second handle onto the same shape, data and diff storage.
    pub fn alias(&self) -> Blob<T> {
        Blob {
            shape: Arc::clone(&self.shape),
            data: Arc::clone(&self.data),
            diff: Arc::clone(&self.diff),
        }
    }

    /// Rebinds this handle's value array onto `other`'s value storage.
    pub fn share_data(&mut self, other: &Blob<T>) -> Result<(), CoreError> {
        self.check_same_count(other, "share_data")?;
        self.data = Arc::clone(&other.data);
        Ok(())
    }

    /// Rebinds this handle's gradient array onto `other`'s gradient storage.
    pub fn share_diff(&mut self, other: &Blob<T>) -> Result<(), CoreError> {
        self.check_same_count(other, "share_diff")?;
        self.diff = Arc::clone(&other.diff);
        Ok(())
    }

    pub fn shares_data_with(&self, other: &Blob<T>) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub fn shares_diff_with(&self, other: &Blob<T>) -> bool {
        Arc::ptr_eq(&self.diff, &other.diff)
    }

    fn check_same_count(&self, other: &Blob<T>, operation: &str) -> Result<(), CoreError> {
        if self.count() != other.count() {
            return Err(CoreError::CountMismatch {
                expected: self.count(),
                actual: other.count(),
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    fn overwrite(storage: &RwLock<Vec<T>>, values: &[T], operation: &str) -> Result<(), CoreError> {
        let mut slots = write_lock(storage);
        if slots.len() != values.len() {
            return Err(CoreError::CountMismatch {
                expected: slots.len(),
                actual: values.len(),
                operation: operation.to_string(),
            });
        }
        slots.copy_from_slice(values);
        Ok(())
    }

    fn update_at(storage: &RwLock<Vec<T>>, index: usize, f: impl FnOnce(&mut T)) -> Result<(), CoreError> {
        let mut slots = write_lock(storage);
        let count = slots.len();
        let slot = slots
            .get_mut(index)
            .ok_or(CoreError::IndexOutOfBounds { index, count })?;
        f(slot);
        Ok(())
    }
}

impl<T: Dtype> fmt::Debug for Blob<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("shape", &self.shape())
            .field("count", &self.count())
            .finish()
    }
}

#[cfg(test)]
#[path = "blob_test.rs"]
mod tests;
