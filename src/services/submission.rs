use std::time::Duration;

use serde::Serialize;
use validator::Validate;

use crate::core::metrics;
use crate::errors::SessionError;
use crate::schemas::attempt::{ResponseItem, SubmitResponses};
use crate::schemas::AttemptId;
use crate::services::quiz_api::{bounded, QuizApi};

/// Upper bound on a single wait between mark-completed retries.
pub const MAX_FINALIZE_BACKOFF: Duration = Duration::from_secs(30);

/// Progress of the two backend calls that finish an attempt.
///
/// `Submitted` is the recorded intermediate state: responses are stored but
/// the attempt is still `in_progress` server-side, so a retry resumes at
/// mark-completed instead of resubmitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizePhase {
    Idle,
    Submitting,
    Submitted,
    Finalizing,
    Finalized,
}

pub struct SubmissionCoordinator<'a> {
    api: &'a dyn QuizApi,
    request_timeout: Duration,
    finalize_max_retries: u32,
    finalize_retry_backoff: Duration,
}

impl<'a> SubmissionCoordinator<'a> {
    pub fn new(
        api: &'a dyn QuizApi,
        request_timeout: Duration,
        finalize_max_retries: u32,
        finalize_retry_backoff: Duration,
    ) -> Self {
        Self { api, request_timeout, finalize_max_retries, finalize_retry_backoff }
    }

    /// Sends responses and marks the attempt completed, reporting every phase
    /// change through `on_phase`. Starting from `Submitted` skips straight to
    /// mark-completed.
    pub async fn submit(
        &self,
        attempt_id: AttemptId,
        responses: Vec<ResponseItem>,
        from: FinalizePhase,
        on_phase: &(dyn Fn(FinalizePhase) + Send + Sync),
    ) -> Result<(), SessionError> {
        match from {
            FinalizePhase::Finalized => return Ok(()),
            FinalizePhase::Submitted | FinalizePhase::Finalizing => {
                return self.finalize(attempt_id, on_phase).await;
            }
            FinalizePhase::Idle | FinalizePhase::Submitting => {}
        }

        let payload = SubmitResponses { responses };
        payload.validate().map_err(|e| SessionError::InvalidResponses(e.to_string()))?;

        on_phase(FinalizePhase::Submitting);
        if let Err(err) =
            bounded(self.request_timeout, self.api.submit_responses(attempt_id, &payload)).await
        {
            on_phase(FinalizePhase::Idle);
            metrics::record_submission("failed");
            tracing::warn!(attempt_id, error = %err, "Failed to submit responses");
            return Err(err);
        }

        on_phase(FinalizePhase::Submitted);
        metrics::record_submission("saved");
        tracing::info!(attempt_id, responses = payload.responses.len(), "Responses submitted");

        self.finalize(attempt_id, on_phase).await
    }

    /// Marks the attempt completed, retrying with exponential backoff.
    pub async fn finalize(
        &self,
        attempt_id: AttemptId,
        on_phase: &(dyn Fn(FinalizePhase) + Send + Sync),
    ) -> Result<(), SessionError> {
        let mut last_error = None;

        for attempt in 0..=self.finalize_max_retries {
            on_phase(FinalizePhase::Finalizing);
            match bounded(self.request_timeout, self.api.complete_attempt(attempt_id)).await {
                Ok(()) => {
                    on_phase(FinalizePhase::Finalized);
                    metrics::record_submission("finalized");
                    tracing::info!(attempt_id, "Attempt marked completed");
                    return Ok(());
                }
                Err(err) => {
                    on_phase(FinalizePhase::Submitted);
                    tracing::warn!(attempt_id, attempt, error = %err, "Failed to mark attempt completed");
                    last_error = Some(err);
                }
            }

            if attempt < self.finalize_max_retries {
                metrics::record_finalize_retry();
                tokio::time::sleep(retry_backoff(self.finalize_retry_backoff, attempt)).await;
            }
        }

        metrics::record_submission("not_finalized");
        tracing::error!(
            attempt_id,
            error = ?last_error,
            "Responses saved but attempt not finalized"
        );
        Err(SessionError::SavedNotFinalized { attempt_id })
    }
}

/// `base * 2^attempt`, saturating and capped at [`MAX_FINALIZE_BACKOFF`].
fn retry_backoff(base: Duration, attempt: u32) -> Duration {
    let factor = 2_u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_FINALIZE_BACKOFF)
}
