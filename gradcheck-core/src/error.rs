use thiserror::Error;

/// Errors raised by blobs, fillers, layers and nets.
///
/// These are misuse errors of the collaborators the gradient checker drives. They
/// never describe a gradient mismatch; those are reported as
/// [`Violation`](crate::grad_check::Violation)s.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum CoreError {
    #[error("Blob creation error: data length {data_len} does not match shape {shape:?}")]
    BlobCreationError { data_len: usize, shape: Vec<usize> },

    #[error("Shape mismatch: expected {expected:?}, got {actual:?} during operation {operation}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
        operation: String,
    },

    #[error("Count mismatch: expected {expected} elements, got {actual} during operation {operation}")]
    CountMismatch {
        expected: usize,
        actual: usize,
        operation: String,
    },

    #[error("Index out of bounds: index {index} for blob of count {count}")]
    IndexOutOfBounds { index: usize, count: usize },

    #[error("Invalid filler parameters: {0}")]
    InvalidFiller(String),

    #[error("Value {value} cannot be represented in the blob element type")]
    NumericCast { value: f64 },

    #[error("Layer '{layer}' expects {expected} {kind} blob(s), got {actual}")]
    BlobArity {
        layer: String,
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Layer '{layer}': flag vector '{flags}' has length {actual}, expected {expected}")]
    FlagLengthMismatch {
        layer: String,
        flags: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid configuration for layer '{layer}': {reason}")]
    InvalidLayerConfig { layer: String, reason: String },

    #[error("Unknown blob '{0}'")]
    UnknownBlob(String),

    #[error("Blob '{0}' already exists")]
    DuplicateBlob(String),

    #[error("Layer '{0}' already exists")]
    DuplicateLayer(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}
