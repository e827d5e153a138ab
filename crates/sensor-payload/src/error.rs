use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PayloadError {
    #[error("payload too short: expected at least {expected} bytes, got {actual}")]
    PayloadTooShort { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, PayloadError>;
