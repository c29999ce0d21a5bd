use std::time::Duration;

use time::OffsetDateTime;

use crate::core::metrics;
use crate::core::time::format_timestamp;
use crate::errors::SessionError;
use crate::schemas::quiz::Question;
use crate::schemas::roster::RosterEntry;
use crate::schemas::{AttemptId, QuizId, SubjectId};
use crate::services::quiz_api::{bounded, QuizApi};
use crate::services::randomization::shuffle_for_attempt;

/// The quiz being opened and, for "continue" links, the attempt the route
/// pointed at.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileTarget {
    pub continue_attempt: Option<AttemptId>,
    pub quiz_id: QuizId,
    pub subject_id: Option<SubjectId>,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub attempt_id: AttemptId,
    pub questions: Vec<Question>,
    pub seed: u64,
    pub is_resumed: bool,
    pub started_at: Option<OffsetDateTime>,
}

pub struct AttemptReconciler<'a> {
    api: &'a dyn QuizApi,
    request_timeout: Duration,
}

impl<'a> AttemptReconciler<'a> {
    pub fn new(api: &'a dyn QuizApi, request_timeout: Duration) -> Self {
        Self { api, request_timeout }
    }

    /// Resumes the open attempt for the target if the roster shows one,
    /// otherwise starts a new attempt. Never starts a second attempt while one
    /// is in progress.
    pub async fn reconcile(
        &self,
        target: ReconcileTarget,
        roster: &[RosterEntry],
    ) -> Result<Reconciliation, SessionError> {
        if let Some((attempt_id, quiz_id)) = find_open_attempt(target, roster) {
            let quiz = bounded(self.request_timeout, self.api.quiz(quiz_id)).await?;
            let questions = require_questions(quiz.questions)?;
            let shuffled = shuffle_for_attempt(questions);

            metrics::record_attempt("resumed");
            tracing::info!(attempt_id, quiz_id, "Resuming attempt in progress");
            return Ok(Reconciliation {
                attempt_id,
                questions: shuffled.questions,
                seed: shuffled.seed,
                is_resumed: true,
                started_at: None,
            });
        }

        let entry = roster.iter().find(|entry| entry.quiz_id == target.quiz_id);
        if let Some(entry) = entry.filter(|entry| !entry.allows_new_attempt()) {
            metrics::record_attempt("exhausted");
            tracing::warn!(
                quiz_id = target.quiz_id,
                attempts_count = entry.attempts_count,
                max_attempts = entry.max_attempts,
                "No attempts left; start not requested"
            );
            return Err(SessionError::AttemptsExhausted {
                detail: format!("{} of {} attempts used", entry.attempts_count, entry.max_attempts),
            });
        }

        let subject_id = target
            .subject_id
            .or_else(|| entry.and_then(|entry| entry.subject_id))
            .ok_or_else(|| SessionError::InvalidQuiz("quiz has no subject".to_string()))?;

        let started = match bounded(
            self.request_timeout,
            self.api.start_attempt(subject_id, target.quiz_id),
        )
        .await
        {
            Ok(started) => started,
            Err(err @ SessionError::AttemptsExhausted { .. }) => {
                metrics::record_attempt("exhausted");
                tracing::warn!(quiz_id = target.quiz_id, "Backend refused to start attempt");
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let questions = require_questions(started.questions)?;
        let shuffled = shuffle_for_attempt(questions);

        metrics::record_attempt("started");
        tracing::info!(
            attempt_id = started.attempt_id,
            quiz_id = target.quiz_id,
            started_at = %format_timestamp(started.started_at),
            "Started attempt"
        );
        Ok(Reconciliation {
            attempt_id: started.attempt_id,
            questions: shuffled.questions,
            seed: shuffled.seed,
            is_resumed: false,
            started_at: started.started_at,
        })
    }
}

/// Deep-link match on the attempt id first, then the abandoned-attempt case
/// keyed by quiz id.
pub fn find_open_attempt(
    target: ReconcileTarget,
    roster: &[RosterEntry],
) -> Option<(AttemptId, QuizId)> {
    let by_attempt = target.continue_attempt.and_then(|wanted| {
        roster.iter().find_map(|entry| {
            entry
                .in_progress_attempt()
                .filter(|attempt_id| *attempt_id == wanted)
                .map(|attempt_id| (attempt_id, entry.quiz_id))
        })
    });

    by_attempt.or_else(|| {
        roster
            .iter()
            .filter(|entry| entry.quiz_id == target.quiz_id)
            .find_map(|entry| entry.in_progress_attempt().map(|id| (id, entry.quiz_id)))
    })
}

fn require_questions(questions: Vec<Question>) -> Result<Vec<Question>, SessionError> {
    if questions.is_empty() {
        return Err(SessionError::InvalidQuiz("quiz has no questions".to_string()));
    }
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::schemas::attempt::AttemptStatus;
    use crate::test_support::{self, ScriptedApi};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn target(quiz_id: QuizId) -> ReconcileTarget {
        ReconcileTarget { continue_attempt: None, quiz_id, subject_id: Some(1) }
    }

    #[tokio::test]
    async fn in_progress_attempt_is_resumed_without_start() {
        let api = ScriptedApi::new();
        api.put_quiz(test_support::public_quiz(7, 3));
        let roster = vec![test_support::roster_entry(7, AttemptStatus::InProgress, Some(42))];

        let reconciled = AttemptReconciler::new(&api, TIMEOUT)
            .reconcile(target(7), &roster)
            .await
            .expect("reconcile");

        assert_eq!(reconciled.attempt_id, 42);
        assert!(reconciled.is_resumed);
        assert_eq!(reconciled.questions.len(), 3);
        assert_eq!(api.calls().start, 0);
        assert_eq!(api.calls().quiz, 1);
    }

    #[tokio::test]
    async fn continue_link_matches_attempt_id() {
        let api = ScriptedApi::new();
        api.put_quiz(test_support::public_quiz(7, 2));
        let roster = vec![
            test_support::roster_entry(3, AttemptStatus::Completed, Some(7)),
            test_support::roster_entry(7, AttemptStatus::InProgress, Some(99)),
        ];
        let target = ReconcileTarget { continue_attempt: Some(99), quiz_id: 7, subject_id: None };

        let reconciled =
            AttemptReconciler::new(&api, TIMEOUT).reconcile(target, &roster).await.expect("resume");

        assert_eq!(reconciled.attempt_id, 99);
        assert!(reconciled.is_resumed);
        assert_eq!(api.calls().start, 0);
    }

    #[tokio::test]
    async fn exhausted_roster_entry_fails_without_start() {
        let api = ScriptedApi::new();
        let mut entry = test_support::roster_entry(9, AttemptStatus::Completed, Some(5));
        entry.can_start_new_attempt = Some(false);

        let err = AttemptReconciler::new(&api, TIMEOUT)
            .reconcile(target(9), &[entry])
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::AttemptsExhausted { .. }));
        assert_eq!(api.calls().start, 0);
    }

    #[tokio::test]
    async fn new_attempt_is_started_and_shuffled() {
        let api = ScriptedApi::new();
        api.set_start_response(77, test_support::questions(4, 3));
        let roster = vec![test_support::roster_entry(7, AttemptStatus::NotStarted, None)];

        let reconciled = AttemptReconciler::new(&api, TIMEOUT)
            .reconcile(target(7), &roster)
            .await
            .expect("start");

        assert_eq!(reconciled.attempt_id, 77);
        assert!(!reconciled.is_resumed);
        assert_eq!(api.calls().start, 1);
        let ids: BTreeSet<i64> = reconciled.questions.iter().map(|q| q.id).collect();
        let expected: BTreeSet<i64> = test_support::questions(4, 3).iter().map(|q| q.id).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn backend_refusal_is_exhaustion_not_transport() {
        let api = ScriptedApi::new();
        api.fail_start_exhausted();

        let err = AttemptReconciler::new(&api, TIMEOUT).reconcile(target(7), &[]).await.unwrap_err();

        assert!(matches!(err, SessionError::AttemptsExhausted { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn transport_failure_is_retryable() {
        let api = ScriptedApi::new();
        api.fail_start_transport();

        let err = AttemptReconciler::new(&api, TIMEOUT).reconcile(target(7), &[]).await.unwrap_err();

        assert!(matches!(err, SessionError::Transport { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn missing_subject_is_invalid_quiz() {
        let api = ScriptedApi::new();
        let target = ReconcileTarget { continue_attempt: None, quiz_id: 7, subject_id: None };

        let err = AttemptReconciler::new(&api, TIMEOUT).reconcile(target, &[]).await.unwrap_err();

        assert!(matches!(err, SessionError::InvalidQuiz(_)));
        assert_eq!(api.calls().start, 0);
    }

    #[test]
    fn completed_attempt_is_not_resumed() {
        let roster = vec![test_support::roster_entry(7, AttemptStatus::Completed, Some(42))];
        assert_eq!(find_open_attempt(target(7), &roster), None);

        let deep_link = ReconcileTarget { continue_attempt: Some(42), quiz_id: 7, subject_id: None };
        assert_eq!(find_open_attempt(deep_link, &roster), None);
    }
}
