use thiserror::Error;

/// Linear map errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapError
{
    /// Size of an operand does not match what the operation requires.
    #[error("SizeMismatch: {op} expects {expected} features, got {actual}")]
    SizeMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },
    /// A construction parameter is out of its valid range.
    #[error("InvalidParam: {0}")]
    InvalidParam(String),
    /// Unknown name given to [`crate::MapKind`] parsing.
    #[error("UnknownMapKind: {0}")]
    UnknownMapKind(String),
}

/// Checks a feature count, logging before failing.
pub(crate) fn check_features(op: &'static str, expected: usize, actual: usize) -> Result<(), MapError>
{
    if expected != actual {
        log::error!("{}: size mismatch {} expected, {} given", op, expected, actual);
        return Err(MapError::SizeMismatch {op, expected, actual});
    }
    Ok(())
}
