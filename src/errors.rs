/// Error taxonomy for the quotation core.
///
/// Validation errors block the attempted action and never mutate state;
/// external-service errors surface as a dismissible message and leave the
/// prior in-memory state untouched. Data-integrity degradations (missing
/// foreign keys, orphaned raw lines) are tolerated silently and never appear
/// here.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("PDF export error: {0}")]
    PdfError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    /// True for synchronous guard failures ("select an item first" and
    /// friends) that block an action without touching state.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError(_))
    }

    /// Message suitable for the single visible error area per screen.
    /// Internal errors return generic text to avoid leaking detail.
    pub fn user_message(&self) -> String {
        match self {
            Self::SerializationError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal error".to_string()
            }
            Self::ConfigError(_) => "Configuration error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_status() {
            if err.status().map(|s| s.as_u16()) == Some(404) {
                return ServiceError::NotFound(err.to_string());
            }
            return ServiceError::ExternalServiceError(err.to_string());
        }
        ServiceError::ExternalServiceError(err.to_string())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl From<config::ConfigError> for ServiceError {
    fn from(err: config::ConfigError) -> Self {
        ServiceError::ConfigError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}
