use thiserror::Error;

use crate::schemas::AttemptId;
use crate::services::quiz_api::QuizApiError;
use crate::services::view_mode::Mode;

/// Everything a quiz screen can report to the student.
///
/// Transport problems are retryable; domain refusals end the session; a
/// finalize failure after a successful submit is its own case so the shell can
/// offer "retry finalize" instead of a resubmission.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("network error: {message}")]
    Transport { message: String },
    #[error("request timed out")]
    Timeout,
    #[error("attempts exhausted: {detail}")]
    AttemptsExhausted { detail: String },
    #[error("quiz is not available")]
    QuizUnavailable,
    #[error("not found: {detail}")]
    NotFound { detail: String },
    #[error("answers for attempt {attempt_id} were saved but the attempt was not finalized")]
    SavedNotFinalized { attempt_id: AttemptId },
    #[error("another request for this action is already in flight")]
    Busy,
    #[error("{answered} of {total} questions answered")]
    Incomplete { answered: usize, total: usize },
    #[error("action not allowed in {} mode", .mode.as_str())]
    ActionNotAllowed { mode: Mode },
    #[error("invalid quiz data: {0}")]
    InvalidQuiz(String),
    #[error("invalid responses: {0}")]
    InvalidResponses(String),
}

impl SessionError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SessionError::Transport { .. } | SessionError::Timeout | SessionError::SavedNotFinalized { .. }
        )
    }

    pub fn user_message(&self) -> String {
        match self {
            SessionError::Transport { .. } | SessionError::Timeout => {
                "Could not reach the server. Please try again.".to_string()
            }
            SessionError::AttemptsExhausted { .. } => {
                "You have exhausted your attempts for this quiz.".to_string()
            }
            SessionError::QuizUnavailable => "This quiz is not available.".to_string(),
            SessionError::NotFound { .. } => "Quiz not found.".to_string(),
            SessionError::SavedNotFinalized { .. } => {
                "Your answers were saved but finalization failed. Please retry.".to_string()
            }
            SessionError::Busy => "Please wait for the current request to finish.".to_string(),
            SessionError::Incomplete { answered, total } => {
                format!("Answer every question before finishing ({answered}/{total}).")
            }
            SessionError::ActionNotAllowed { .. } => {
                "This action is not available right now.".to_string()
            }
            SessionError::InvalidQuiz(_) => "This quiz could not be loaded.".to_string(),
            SessionError::InvalidResponses(_) => {
                "Your answers could not be prepared for submission.".to_string()
            }
        }
    }
}

impl From<QuizApiError> for SessionError {
    fn from(err: QuizApiError) -> Self {
        match err {
            QuizApiError::AttemptsExhausted { detail } => SessionError::AttemptsExhausted { detail },
            QuizApiError::NotFound { detail } => SessionError::NotFound { detail },
            QuizApiError::Transport(err) if err.is_timeout() => SessionError::Timeout,
            other => SessionError::Transport { message: other.to_string() },
        }
    }
}
