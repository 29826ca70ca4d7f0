use core_text::DocumentError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LayoutError {
    /// A run producer broke the creation protocol. Never retried.
    #[error("producer `{producer}` violated the run protocol at offset {offset}: {detail}")]
    ContractViolation {
        producer: &'static str,
        offset: usize,
        detail: String,
    },
    #[error("offset {offset} outside layout range {start}..{end}")]
    OutOfRange {
        offset: usize,
        start: usize,
        end: usize,
    },
    #[error("invalid bias `{0}`")]
    InvalidBias(String),
    #[error("layout tree integrity check failed: {0}")]
    Integrity(String),
    /// Generation was marked stale mid-pass. Consumed by the retry loop.
    #[error("run creation marked stale")]
    StaleCreation,
    /// The document changed and the tree has not caught up yet.
    #[error("layout at document version {tree} while document is at {document}")]
    ModificationPending { tree: u64, document: u64 },
    #[error("region delivery worker: {0}")]
    Worker(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
