use thiserror::Error;

/// Failures reported by [`crate::Document`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("offset {offset} out of range for document of length {len}")]
    OutOfRange { offset: usize, len: usize },
    #[error("invalid anchor bias `{0}`")]
    InvalidBias(String),
}
