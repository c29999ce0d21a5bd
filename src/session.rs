use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::errors::SessionError;
use crate::schemas::attempt::{AttemptResult, QuestionResult};
use crate::schemas::quiz::{Question, Quiz, Role, Visibility};
use crate::schemas::roster::RosterEntry;
use crate::schemas::view::QuestionView;
use crate::schemas::{AlternativeId, AttemptId, QuestionId, QuizId, SubjectId};
use crate::services::attempt_timing::{attempt_deadline, remaining_seconds};
use crate::services::quiz_api::{bounded, QuizApi};
use crate::services::reconciler::{AttemptReconciler, ReconcileTarget, Reconciliation};
use crate::services::responses::ResponseCollector;
use crate::services::submission::{FinalizePhase, SubmissionCoordinator};
use crate::services::view_mode::{resolve_mode, Mode, ModeResolution};

/// Receives the route the engine wants to show after finalization.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// Route parameter of a quiz screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizRoute {
    Quiz(QuizId),
    /// "Continue" link into an attempt that was already started.
    Attempt(AttemptId),
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub request_timeout: Duration,
    pub finalize_max_retries: u32,
    pub finalize_retry_backoff: Duration,
    pub result_route_prefix: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            finalize_max_retries: 2,
            finalize_retry_backoff: Duration::from_millis(500),
            result_route_prefix: "/result".to_string(),
        }
    }
}

impl SessionOptions {
    pub fn result_route(&self, attempt_id: AttemptId) -> String {
        format!("{}/{attempt_id}", self.result_route_prefix)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizInfo {
    pub id: QuizId,
    pub title: String,
    pub description: String,
    pub duration_minutes: Option<u32>,
    pub max_points: Option<f64>,
    pub max_attempts: u32,
    pub visibility: Visibility,
    pub subject_id: Option<SubjectId>,
}

impl From<&Quiz> for QuizInfo {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            duration_minutes: quiz.duration_minutes,
            max_points: quiz.max_points,
            max_attempts: quiz.max_attempts,
            visibility: quiz.visibility,
            subject_id: quiz.subject_id,
        }
    }
}

/// Presentation-safe copy of the session view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub quiz: QuizInfo,
    pub mode: Mode,
    pub locked: bool,
    pub reveal_correctness: bool,
    pub attempt_id: Option<AttemptId>,
    pub is_resumed: bool,
    pub shuffle_seed: Option<u64>,
    pub questions: Vec<QuestionView>,
    pub answered: usize,
    pub total: usize,
    pub can_finalize: bool,
    pub concluded: bool,
    pub phase: FinalizePhase,
    pub starting: bool,
    pub submitting: bool,
    pub time_remaining_seconds: Option<i64>,
}

#[derive(Debug)]
struct SessionState {
    resolution: ModeResolution,
    questions: Vec<Question>,
    responses: ResponseCollector,
    attempt_id: Option<AttemptId>,
    is_resumed: bool,
    seed: Option<u64>,
    started_at: Option<OffsetDateTime>,
    concluded: bool,
    phase: FinalizePhase,
    starting: bool,
    submitting: bool,
}

impl SessionState {
    fn new(resolution: ModeResolution, questions: Vec<Question>) -> Self {
        Self {
            resolution,
            questions,
            responses: ResponseCollector::new(),
            attempt_id: None,
            is_resumed: false,
            seed: None,
            started_at: None,
            concluded: false,
            phase: FinalizePhase::Idle,
            starting: false,
            submitting: false,
        }
    }

    fn can_finalize(&self) -> bool {
        self.attempt_id.is_some()
            && self.resolution.allows_responses()
            && self.phase == FinalizePhase::Idle
            && !self.submitting
            && self.responses.is_complete(self.questions.len())
    }
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Start,
    Submit,
}

/// Marks an action in flight; clearing happens on drop so an abandoned
/// (dropped) action future re-enables its trigger.
struct InFlight<'a> {
    state: &'a Mutex<SessionState>,
    action: Action,
}

impl<'a> InFlight<'a> {
    /// Runs `check` and sets the marker under one lock, so two triggers can
    /// never both pass the check.
    fn acquire<T>(
        state: &'a Mutex<SessionState>,
        action: Action,
        check: impl FnOnce(&SessionState) -> Result<T, SessionError>,
    ) -> Result<(Self, T), SessionError> {
        let mut guard = lock(state);
        let flag = match action {
            Action::Start => &mut guard.starting,
            Action::Submit => &mut guard.submitting,
        };
        if *flag {
            return Err(SessionError::Busy);
        }
        let value = check(&guard)?;
        match action {
            Action::Start => guard.starting = true,
            Action::Submit => guard.submitting = true,
        }
        Ok((Self { state, action }, value))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut guard = lock(self.state);
        match self.action {
            Action::Start => guard.starting = false,
            Action::Submit => guard.submitting = false,
        }
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One quiz screen. Created by [`QuizSession::open`], discarded when the
/// viewer navigates away.
pub struct QuizSession {
    id: Uuid,
    api: Arc<dyn QuizApi>,
    navigator: Arc<dyn Navigator>,
    options: SessionOptions,
    role: Role,
    quiz: QuizInfo,
    continue_attempt: Option<AttemptId>,
    state: Mutex<SessionState>,
}

impl QuizSession {
    pub async fn open(
        api: Arc<dyn QuizApi>,
        navigator: Arc<dyn Navigator>,
        options: SessionOptions,
        route: QuizRoute,
        role: Role,
    ) -> Result<Self, SessionError> {
        let id = Uuid::new_v4();
        let timeout = options.request_timeout;

        if role == Role::Teacher {
            let quiz_id = match route {
                QuizRoute::Quiz(quiz_id) => quiz_id,
                QuizRoute::Attempt(_) => {
                    return Err(SessionError::ActionNotAllowed { mode: Mode::Edit });
                }
            };
            let quiz = bounded(timeout, api.quiz(quiz_id)).await?;
            let resolution = resolve_mode(role, quiz.visibility, false, false);
            tracing::info!(session_id = %id, quiz_id, mode = resolution.mode.as_str(), "Opened quiz for inspection");

            let info = QuizInfo::from(&quiz);
            return Ok(Self {
                id,
                api,
                navigator,
                options,
                role,
                quiz: info,
                continue_attempt: None,
                state: Mutex::new(SessionState::new(resolution, quiz.questions)),
            });
        }

        let roster = bounded(timeout, api.roster()).await?;
        let (quiz_id, linked_attempt) = resolve_route(route, &roster)?;
        // Only a link to an attempt still in progress skips the "begin" step.
        let continue_attempt = linked_attempt.filter(|attempt_id| {
            roster.iter().any(|entry| entry.in_progress_attempt() == Some(*attempt_id))
        });
        if let (Some(attempt_id), None) = (linked_attempt, continue_attempt) {
            tracing::info!(session_id = %id, attempt_id, quiz_id, "Linked attempt is no longer open");
        }
        let quiz = bounded(timeout, api.quiz(quiz_id)).await?;
        let resolution = resolve_mode(role, quiz.visibility, false, false);

        // Restricted screens never hold question content.
        let questions = match resolution.mode {
            Mode::Result => quiz.questions.clone(),
            _ => Vec::new(),
        };

        tracing::info!(
            session_id = %id,
            quiz_id,
            continue_attempt = ?continue_attempt,
            mode = resolution.mode.as_str(),
            "Opened quiz session"
        );

        let session = Self {
            id,
            api,
            navigator,
            options,
            role,
            quiz: QuizInfo::from(&quiz),
            continue_attempt,
            state: Mutex::new(SessionState::new(resolution, questions)),
        };

        if continue_attempt.is_some() && resolution.mode == Mode::Start {
            let reconciliation = session.reconcile(&roster).await?;
            session.apply(reconciliation);
        }

        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn quiz(&self) -> &QuizInfo {
        &self.quiz
    }

    pub fn resolution(&self) -> ModeResolution {
        lock(&self.state).resolution
    }

    /// Handles the "begin" affordance: resumes an open attempt or starts one.
    pub async fn start(&self) -> Result<(), SessionError> {
        let (_in_flight, ()) =
            InFlight::acquire(&self.state, Action::Start, |state| match state.resolution.mode {
                Mode::Start => Ok(()),
                Mode::Restricted => Err(SessionError::QuizUnavailable),
                mode => Err(SessionError::ActionNotAllowed { mode }),
            })?;

        let roster = bounded(self.options.request_timeout, self.api.roster()).await?;
        let reconciliation = match self.reconcile(&roster).await {
            Ok(reconciliation) => reconciliation,
            Err(err) => {
                tracing::warn!(session_id = %self.id, quiz_id = self.quiz.id, error = %err, "Failed to start quiz");
                return Err(err);
            }
        };
        self.apply(reconciliation);
        Ok(())
    }

    /// Records an answer. Ignored outside active answering and once
    /// submission has begun.
    pub fn select(&self, question_id: QuestionId, alternative_id: AlternativeId) -> bool {
        let mut state = lock(&self.state);
        if state.phase != FinalizePhase::Idle || state.submitting {
            return false;
        }
        let SessionState { questions, responses, resolution, .. } = &mut *state;
        responses.set_response(questions, question_id, alternative_id, resolution)
    }

    pub fn can_finalize(&self) -> bool {
        lock(&self.state).can_finalize()
    }

    /// Submits the responses, marks the attempt completed and navigates to
    /// the result route. Returns the route on success.
    pub async fn finalize(&self) -> Result<String, SessionError> {
        let (in_flight, (attempt_id, responses, from)) =
            InFlight::acquire(&self.state, Action::Submit, |state| {
                let mode = state.resolution.mode;
                let attempt_id = state.attempt_id.ok_or(SessionError::ActionNotAllowed { mode })?;
                if state.phase == FinalizePhase::Idle {
                    if !state.resolution.allows_responses() {
                        return Err(SessionError::ActionNotAllowed { mode });
                    }
                    let total = state.questions.len();
                    if !state.responses.is_complete(total) {
                        return Err(SessionError::Incomplete {
                            answered: state.responses.answered(),
                            total,
                        });
                    }
                }
                Ok((attempt_id, state.responses.to_items(&state.questions), state.phase))
            })?;

        if from == FinalizePhase::Finalized {
            return Ok(self.options.result_route(attempt_id));
        }
        self.run_finalize(in_flight, attempt_id, responses, from).await
    }

    /// Re-runs only the mark-completed step after a `SavedNotFinalized` error.
    pub async fn retry_finalize(&self) -> Result<String, SessionError> {
        let (in_flight, attempt_id) = InFlight::acquire(&self.state, Action::Submit, |state| {
            let mode = state.resolution.mode;
            match state.attempt_id {
                Some(attempt_id) if state.phase == FinalizePhase::Submitted => Ok(attempt_id),
                _ => Err(SessionError::ActionNotAllowed { mode }),
            }
        })?;

        self.run_finalize(in_flight, attempt_id, Vec::new(), FinalizePhase::Submitted).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_at(OffsetDateTime::now_utc())
    }

    pub fn snapshot_at(&self, now: OffsetDateTime) -> SessionSnapshot {
        let state = lock(&self.state);
        let questions = state
            .questions
            .iter()
            .map(|question| {
                QuestionView::project(
                    question,
                    &state.resolution,
                    state.responses.selected(question.id),
                )
            })
            .collect();
        let time_remaining_seconds = attempt_deadline(state.started_at, self.quiz.duration_minutes)
            .filter(|_| !state.concluded)
            .map(|deadline| remaining_seconds(deadline, now));

        SessionSnapshot {
            session_id: self.id,
            quiz: self.quiz.clone(),
            mode: state.resolution.mode,
            locked: state.resolution.locked,
            reveal_correctness: state.resolution.reveal_correctness,
            attempt_id: state.attempt_id,
            is_resumed: state.is_resumed,
            shuffle_seed: state.seed,
            questions,
            answered: state.responses.answered(),
            total: state.questions.len(),
            can_finalize: state.can_finalize(),
            concluded: state.concluded,
            phase: state.phase,
            starting: state.starting,
            submitting: state.submitting,
            time_remaining_seconds,
        }
    }

    async fn reconcile(&self, roster: &[RosterEntry]) -> Result<Reconciliation, SessionError> {
        let target = ReconcileTarget {
            continue_attempt: self.continue_attempt,
            quiz_id: self.quiz.id,
            subject_id: self.quiz.subject_id,
        };
        AttemptReconciler::new(self.api.as_ref(), self.options.request_timeout)
            .reconcile(target, roster)
            .await
    }

    fn apply(&self, reconciliation: Reconciliation) {
        let mut state = lock(&self.state);
        state.attempt_id = Some(reconciliation.attempt_id);
        state.questions = reconciliation.questions;
        state.seed = Some(reconciliation.seed);
        state.is_resumed = reconciliation.is_resumed;
        state.started_at = reconciliation.started_at;
        state.responses = ResponseCollector::new();
        state.resolution = resolve_mode(self.role, self.quiz.visibility, false, true);
        tracing::info!(
            session_id = %self.id,
            attempt_id = reconciliation.attempt_id,
            is_resumed = reconciliation.is_resumed,
            questions = state.questions.len(),
            "Attempt loaded"
        );
    }

    async fn run_finalize(
        &self,
        _in_flight: InFlight<'_>,
        attempt_id: AttemptId,
        responses: Vec<crate::schemas::attempt::ResponseItem>,
        from: FinalizePhase,
    ) -> Result<String, SessionError> {

        let on_phase = |phase: FinalizePhase| lock(&self.state).phase = phase;
        SubmissionCoordinator::new(
            self.api.as_ref(),
            self.options.request_timeout,
            self.options.finalize_max_retries,
            self.options.finalize_retry_backoff,
        )
        .submit(attempt_id, responses, from, &on_phase)
        .await?;

        {
            let mut state = lock(&self.state);
            state.concluded = true;
            state.resolution = resolve_mode(self.role, self.quiz.visibility, true, true);
        }

        let route = self.options.result_route(attempt_id);
        tracing::info!(session_id = %self.id, attempt_id, route = %route, "Attempt finalized");
        self.navigator.navigate(&route);
        Ok(route)
    }
}

/// Maps the route parameter to the quiz it belongs to, plus the attempt id
/// for "continue" links.
fn resolve_route(
    route: QuizRoute,
    roster: &[RosterEntry],
) -> Result<(QuizId, Option<AttemptId>), SessionError> {
    match route {
        QuizRoute::Quiz(quiz_id) => Ok((quiz_id, None)),
        QuizRoute::Attempt(attempt_id) => roster
            .iter()
            .find(|entry| entry.attempt_id == Some(attempt_id))
            .map(|entry| (entry.quiz_id, Some(attempt_id)))
            .ok_or_else(|| SessionError::NotFound { detail: format!("attempt {attempt_id}") }),
    }
}

/// Read-only view backing the result route.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultView {
    pub attempt_id: AttemptId,
    pub quiz_id: Option<QuizId>,
    pub total_score: f64,
    pub max_points: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    pub correct: usize,
    pub total: usize,
    pub questions: Vec<QuestionResult>,
}

impl From<AttemptResult> for ResultView {
    fn from(result: AttemptResult) -> Self {
        let correct = result.correct_count();
        Self {
            attempt_id: result.attempt_id,
            quiz_id: result.quiz_id,
            total_score: result.total_score,
            max_points: result.max_points,
            started_at: result.started_at,
            finished_at: result.finished_at,
            correct,
            total: result.questions.len(),
            questions: result.questions,
        }
    }
}

pub async fn load_result(
    api: &dyn QuizApi,
    attempt_id: AttemptId,
    request_timeout: Duration,
) -> Result<ResultView, SessionError> {
    let result = bounded(request_timeout, api.attempt_result(attempt_id)).await?;
    Ok(ResultView::from(result))
}
