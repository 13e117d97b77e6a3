use thiserror::Error;
use paramap_core::MapError;

/// Component and simulation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError
{
    /// Error from a linear map layer.
    #[error("Map: {0}")]
    Map(#[from] MapError),
    /// A sub-model given to a simulator does not have the required capability.
    #[error("InvalidComponent: {arg} ({name}): {reason}")]
    InvalidComponent {
        arg: &'static str,
        name: String,
        reason: String,
    },
    /// A required input key of a component is absent from its data.
    #[error("MissingKey: {component} requires {key}")]
    MissingKey {
        component: String,
        key: String,
    },
    /// An expected output was not produced at a simulation step.
    #[error("MissingStep: {key} at step {step}")]
    MissingStep {
        key: String,
        step: usize,
    },
    /// Tensor shapes are incompatible for an operation.
    #[error("ShapeMismatch: {what} expects {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
    /// Sequence outputs to be aggregated do not share the same keys.
    #[error("KeyMismatch: {key}")]
    KeyMismatch {
        key: String,
    },
    /// A time window exceeds the length of a series.
    #[error("OutOfRange: {key}[{start}..{end}] of length {len}")]
    OutOfRange {
        key: String,
        start: usize,
        end: usize,
        len: usize,
    },
}
