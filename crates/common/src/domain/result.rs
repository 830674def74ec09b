use crate::domain::CodecError;
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unsupported value for field '{key}': {kind}")]
    UnsupportedType { key: String, kind: String },

    #[error("Decode error: {0}")]
    DecodeError(CodecError),

    #[error("Persistence session is already closed")]
    SessionClosed,

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
