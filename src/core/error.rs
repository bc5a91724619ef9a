use thiserror::Error;

/// Error type for record store and capability operations
#[derive(Debug, Error)]
pub enum RecordError {
    /// Missing or invalid field, unrecognized category
    #[error("Validation error: {0}")]
    Validation(String),
    /// Unknown record id
    #[error("Record not found: {0}")]
    NotFound(String),
    /// Persistence backend failure
    #[error("Storage error: {0}")]
    Storage(String),
    /// Capability has no configured implementation
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),
    /// Capability call failed or returned an unusable response
    #[error("Capability failed: {0}")]
    CapabilityFailed(String),
}

impl RecordError {
    /// Stable machine-readable code used in API error bodies and metrics
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::Validation(_) => "VALIDATION_ERROR",
            RecordError::NotFound(_) => "NOT_FOUND",
            RecordError::Storage(_) => "STORAGE_ERROR",
            RecordError::CapabilityUnavailable(_) => "CAPABILITY_UNAVAILABLE",
            RecordError::CapabilityFailed(_) => "CAPABILITY_FAILED",
        }
    }
}

impl From<rusqlite::Error> for RecordError {
    fn from(err: rusqlite::Error) -> Self {
        RecordError::Storage(err.to_string())
    }
}

/// Result alias for record operations
pub type Result<T> = std::result::Result<T, RecordError>;
