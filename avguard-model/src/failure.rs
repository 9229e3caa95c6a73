use std::fmt::{self, Display};

/// Failure reported by the engine for a single request.
///
/// Both fields are engine-defined and travel through this crate untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EngineFailure {
    pub description: String,
    pub error_code: i32,
}

impl EngineFailure {
    pub fn new(description: impl Into<String>, error_code: i32) -> Self {
        Self {
            description: description.into(),
            error_code,
        }
    }
}

impl Display for EngineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.description, self.error_code)
    }
}

impl std::error::Error for EngineFailure {}
