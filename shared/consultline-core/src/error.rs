//! Error types for Consultline services

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsultlineError>;

#[derive(Error, Debug)]
pub enum ConsultlineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl ConsultlineError {
    /// Classify a non-success HTTP status returned by a collaborating service
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 | 422 => Self::Validation(message),
            404 => Self::NotFound(message),
            409 => Self::Conflict(message),
            408 | 504 => Self::Timeout(message),
            502 | 503 => Self::Unavailable(message),
            _ => Self::Internal(message),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Network(_) => "NETWORK_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Timeout(_) => "TIMEOUT",
        }
    }

    /// Whether a retry of the same operation could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Unavailable(_) | Self::Timeout(_) | Self::Database(_))
    }
}

impl From<std::io::Error> for ConsultlineError {
    fn from(err: std::io::Error) -> Self {
        ConsultlineError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ConsultlineError {
    fn from(err: serde_json::Error) -> Self {
        ConsultlineError::Internal(format!("serialization: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(ConsultlineError::from_status(404, "s1"), ConsultlineError::NotFound(_)));
        assert!(matches!(ConsultlineError::from_status(409, "done"), ConsultlineError::Conflict(_)));
        assert!(ConsultlineError::from_status(503, "down").is_transient());
        assert!(!ConsultlineError::from_status(500, "boom").is_transient());
        assert_eq!(ConsultlineError::from_status(504, "slow").error_code(), "TIMEOUT");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ConsultlineError::Network("reset".into()).is_transient());
        assert!(!ConsultlineError::Validation("bad".into()).is_transient());
        assert!(!ConsultlineError::NotFound("gone".into()).is_transient());
    }
}
