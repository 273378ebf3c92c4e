use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain error types
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed collaborator input. Signals an integration defect.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}

/// JSON body returned with every error response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub detail: String,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}
