use thiserror::Error;

/// Errors surfaced by embedding providers.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SemanticError {
    /// Configuration is inconsistent (e.g. api mode without an endpoint).
    #[error("invalid semantic config: {0}")]
    InvalidConfig(String),
    /// The remote endpoint could not be reached or answered with a non-2xx status.
    #[error("embedding request failed: {0}")]
    Request(String),
    /// The provider answered but the payload could not be turned into vectors.
    #[error("inference failure: {0}")]
    Inference(String),
    /// The circuit breaker for this provider is open.
    #[error("provider '{0}' is temporarily unavailable (circuit open)")]
    CircuitOpen(String),
    /// The provider produced a vector of unexpected length.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_invalid_config() {
        let err = SemanticError::InvalidConfig("api_url is required".into());
        assert!(err.to_string().contains("invalid semantic config"));
        assert!(err.to_string().contains("api_url is required"));
    }

    #[test]
    fn error_request_carries_detail() {
        let err = SemanticError::Request("HTTP error 503".into());
        assert!(err.to_string().contains("embedding request failed"));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn error_circuit_open_names_provider() {
        let err = SemanticError::CircuitOpen("openai".into());
        assert!(err.to_string().contains("'openai'"));
    }

    #[test]
    fn error_dimension_mismatch() {
        let err = SemanticError::DimensionMismatch {
            expected: 384,
            got: 768,
        };
        assert_eq!(err.to_string(), "dimension mismatch: expected 384, got 768");
    }

    #[test]
    fn error_clone_preserves_message() {
        let err = SemanticError::Inference("bad payload".into());
        let cloned = err.clone();
        assert_eq!(err, cloned);
        assert_eq!(format!("{err}"), format!("{cloned}"));
    }
}
