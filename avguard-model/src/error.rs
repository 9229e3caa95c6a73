use thiserror::Error;

/// Errors produced while decoding engine payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("malformed {payload} body: expected {expected} byte(s), got {actual}")]
    BodyLength {
        payload: &'static str,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, ModelError>;
