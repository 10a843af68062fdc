use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Raw event or argument failed validation.
    #[error("invalid input for {kind}: {reason}")]
    InvalidInput { kind: String, reason: String },

    /// Catalog id (or reward level) registered twice.
    #[error("duplicate {catalog} registration: {id}")]
    DuplicateRegistration { catalog: &'static str, id: String },

    /// Query issued before the first sample was collected.
    #[error("not initialized: {0}")]
    NotInitialized(&'static str),

    #[error(transparent)]
    Storage(#[from] rusqlite::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    pub fn invalid(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    pub fn missing_field(kind: &str, field: &str) -> Self {
        EngineError::InvalidInput {
            kind: kind.to_string(),
            reason: format!("missing required field `{}`", field),
        }
    }

    /// Short machine-readable code used in structured logs.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidInput { .. } => "invalid_input",
            EngineError::DuplicateRegistration { .. } => "duplicate_registration",
            EngineError::NotInitialized(_) => "not_initialized",
            EngineError::Storage(_) => "storage",
            EngineError::Serialization(_) => "serialization",
        }
    }
}
