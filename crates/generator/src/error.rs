use thiserror::Error;

/// Why an answer could not be generated.
///
/// The set is closed: every provider failure is mapped onto one of these at
/// the client boundary, and the chat layer only ever shows
/// [`advisory`](GenerationError::advisory) to users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("invalid or missing API credentials")]
    InvalidCredentials,
    #[error("API quota or billing exhausted")]
    QuotaExhausted,
    #[error("rate limited by the provider")]
    RateLimited,
    #[error("request timed out or the connection failed")]
    Timeout,
    #[error("generation failed: {0}")]
    Other(String),
}

impl GenerationError {
    /// Short user-facing message for this failure.
    pub fn advisory(&self) -> &'static str {
        match self {
            GenerationError::InvalidCredentials => {
                "⚠️ Invalid API key. Check that OPENAI_API_KEY is set correctly."
            }
            GenerationError::QuotaExhausted => {
                "⚠️ The OpenAI API quota/billing is exhausted. Add billing and try again."
            }
            GenerationError::RateLimited => {
                "⚠️ Rate limit reached: too many requests. Try again in 10-20 seconds."
            }
            GenerationError::Timeout => {
                "⚠️ Timeout/connection problem. Check the connection and try again."
            }
            GenerationError::Other(_) => {
                "⚠️ The answer service returned an error. Please try again shortly."
            }
        }
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationError::InvalidCredentials => "invalid_credentials",
            GenerationError::QuotaExhausted => "quota_exhausted",
            GenerationError::RateLimited => "rate_limited",
            GenerationError::Timeout => "timeout",
            GenerationError::Other(_) => "other",
        }
    }

    /// Categorize an HTTP error response from its status and the provider's
    /// structured `error.code` / `error.type` fields.
    pub fn from_response(status: u16, code: Option<&str>, kind: Option<&str>, message: &str) -> Self {
        let is = |needle: &str| code == Some(needle) || kind == Some(needle);

        if status == 401 || is("invalid_api_key") {
            GenerationError::InvalidCredentials
        } else if is("insufficient_quota") {
            GenerationError::QuotaExhausted
        } else if status == 429 {
            GenerationError::RateLimited
        } else if status == 408 || status == 504 {
            GenerationError::Timeout
        } else {
            GenerationError::Other(format!("HTTP {status}: {message}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_code_categorization() {
        assert_eq!(
            GenerationError::from_response(401, None, None, "bad key"),
            GenerationError::InvalidCredentials
        );
        assert_eq!(
            GenerationError::from_response(400, Some("invalid_api_key"), None, ""),
            GenerationError::InvalidCredentials
        );
        assert_eq!(
            GenerationError::from_response(429, Some("insufficient_quota"), None, ""),
            GenerationError::QuotaExhausted
        );
        assert_eq!(
            GenerationError::from_response(429, None, Some("insufficient_quota"), ""),
            GenerationError::QuotaExhausted
        );
        assert_eq!(
            GenerationError::from_response(429, Some("rate_limit_exceeded"), None, ""),
            GenerationError::RateLimited
        );
        assert_eq!(
            GenerationError::from_response(504, None, None, ""),
            GenerationError::Timeout
        );
        assert_eq!(
            GenerationError::from_response(500, None, None, "boom"),
            GenerationError::Other("HTTP 500: boom".into())
        );
    }

    #[test]
    fn advisories_are_distinct_and_hide_detail() {
        let all = [
            GenerationError::InvalidCredentials,
            GenerationError::QuotaExhausted,
            GenerationError::RateLimited,
            GenerationError::Timeout,
            GenerationError::Other("secret upstream detail".into()),
        ];
        let advisories: std::collections::HashSet<_> = all.iter().map(|e| e.advisory()).collect();
        assert_eq!(advisories.len(), all.len());
        assert!(!all[4].advisory().contains("secret"));
        assert!(GenerationError::QuotaExhausted.advisory().contains("quota"));
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(GenerationError::Timeout.kind(), "timeout");
        assert_eq!(GenerationError::Other(String::new()).kind(), "other");
    }
}
