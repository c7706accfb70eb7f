use axum::http::StatusCode;

use crate::llm::LlmError;

/// Failures surfaced to callers of the project, commit, and question
/// operations. Everything else (per-file, per-commit trouble) is logged and
/// absorbed at its own level.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The repository URL could not be decomposed into owner + repo.
    #[error("invalid repository reference: {0}")]
    InvalidRepositoryReference(String),

    /// Pre-flight credit check failed; no project row was created.
    #[error("insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: u64, available: u64 },

    /// The model provider kept rate-limiting us after the retry budget.
    #[error("model provider rate limit exceeded")]
    RateLimited,

    #[error("project not found")]
    ProjectNotFound,

    /// The project exists but its stored repository URL is unusable.
    #[error("project has no usable repository source")]
    CommitSourceMissing,

    /// A collaborator call needed to even start an operation failed.
    #[error(transparent)]
    ExternalService(#[from] anyhow::Error),
}

impl Error {
    /// Map to an HTTP status plus a categorical message without internal
    /// detail. `ExternalService` deliberately hides its cause from callers.
    pub fn into_http(self) -> (StatusCode, String) {
        match &self {
            Error::InvalidRepositoryReference(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Error::InsufficientCredits { .. } => (StatusCode::PAYMENT_REQUIRED, self.to_string()),
            Error::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            Error::ProjectNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Error::CommitSourceMissing => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            Error::ExternalService(e) => {
                tracing::error!("external service failure: {e:#}");
                (
                    StatusCode::BAD_GATEWAY,
                    "an upstream service failed; please try again".to_string(),
                )
            }
        }
    }
}

impl From<LlmError> for Error {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::RateLimited => Error::RateLimited,
            LlmError::Provider(e) => Error::ExternalService(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_credits_message_is_categorical() {
        let err = Error::InsufficientCredits {
            required: 42,
            available: 10,
        };
        let (status, msg) = err.into_http();
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
        assert!(msg.contains("insufficient credits"));
    }

    #[test]
    fn test_external_failure_hides_detail() {
        let err = Error::ExternalService(anyhow::anyhow!("connection refused to 10.0.0.1:443"));
        let (status, msg) = err.into_http();
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!msg.contains("10.0.0.1"));
    }

    #[test]
    fn test_rate_limited_llm_error_maps_to_rate_limited() {
        let err: Error = LlmError::RateLimited.into();
        assert!(matches!(err, Error::RateLimited));
    }
}
