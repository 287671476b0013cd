//! Error taxonomy for the forum engine and its judges.
//!
//! `ForumError` is what every engine operation returns to its caller.
//! `JudgeError` describes why a judge could not produce a verdict; it never
//! crosses the engine boundary directly and always surfaces as
//! `ForumError::EvaluationUnavailable`.

use thiserror::Error;

use crate::model::QuestionStatus;

/// Errors returned by forum engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForumError {
    /// An id did not resolve to a stored entity.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    /// A name did not resolve to a stored entity.
    #[error("{entity} '{name}' not found")]
    NameNotFound { entity: &'static str, name: String },

    /// The actor is not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A question status precondition did not hold.
    #[error("invalid transition for question {question_id}: {reason} (status is {status})")]
    InvalidTransition {
        question_id: u64,
        status: QuestionStatus,
        reason: String,
    },

    /// A required field was missing or malformed.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// The external judge failed, timed out, or returned an unusable verdict.
    #[error("evaluation unavailable: {0}")]
    EvaluationUnavailable(String),
}

/// Stable discriminant of a [`ForumError`], for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidTransition,
    ValidationFailed,
    EvaluationUnavailable,
}

impl ForumError {
    pub fn not_found(entity: &'static str, id: impl Into<u64>) -> Self {
        ForumError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn name_not_found(entity: &'static str, name: impl Into<String>) -> Self {
        ForumError::NameNotFound {
            entity,
            name: name.into(),
        }
    }

    pub fn invalid_transition(
        question_id: impl Into<u64>,
        status: QuestionStatus,
        reason: impl Into<String>,
    ) -> Self {
        ForumError::InvalidTransition {
            question_id: question_id.into(),
            status,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ForumError::NotFound { .. } | ForumError::NameNotFound { .. } => ErrorKind::NotFound,
            ForumError::Forbidden(_) => ErrorKind::Forbidden,
            ForumError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            ForumError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            ForumError::EvaluationUnavailable(_) => ErrorKind::EvaluationUnavailable,
        }
    }

    /// Returns `true` if resubmitting identical input may succeed.
    ///
    /// Only evaluation failures are transient; nothing is persisted when one
    /// occurs, so a resubmission is safe.
    pub fn is_transient(&self) -> bool {
        matches!(self, ForumError::EvaluationUnavailable(_))
    }
}

/// Errors that can occur when asking a judge for a verdict.
#[derive(Debug, Error)]
pub enum JudgeError {
    /// The API returned a 429 rate limit response.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication failed (invalid API key).
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The API returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The judge answered, but not with a usable verdict.
    #[error("malformed verdict: {0}")]
    MalformedVerdict(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_evaluation_failures_are_transient() {
        assert!(ForumError::EvaluationUnavailable("timeout".into()).is_transient());
        assert!(!ForumError::Forbidden("own question".into()).is_transient());
        assert!(!ForumError::not_found("question", 3u64).is_transient());
    }

    #[test]
    fn messages_carry_detail() {
        let err = ForumError::invalid_transition(7u64, QuestionStatus::Closed, "already closed");
        let msg = err.to_string();
        assert!(msg.contains("question 7"));
        assert!(msg.contains("already closed"));
        assert!(msg.contains("closed"));
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn unknown_ids_and_names_share_a_kind() {
        let by_id = ForumError::not_found("user", 42u64);
        let by_name = ForumError::name_not_found("user", "Nobody");
        assert_eq!(by_id.kind(), ErrorKind::NotFound);
        assert_eq!(by_name.kind(), ErrorKind::NotFound);
        assert_eq!(by_name.to_string(), "user 'Nobody' not found");
    }
}
