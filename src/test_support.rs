use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::schemas::attempt::{
    AttemptResult, AttemptStatus, QuestionResult, StartedAttempt, SubmitResponses,
};
use crate::schemas::quiz::{Alternative, Question, Quiz, Visibility};
use crate::schemas::roster::RosterEntry;
use crate::schemas::{AttemptId, QuestionId, QuizId, SubjectId};
use crate::services::quiz_api::{QuizApi, QuizApiError, ATTEMPTS_EXHAUSTED_CODE};
use crate::session::Navigator;

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<AsyncMutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(AsyncMutex::new(()))).clone();
    lock.lock_owned().await
}

pub(crate) fn set_test_env() {
    dotenvy::dotenv().ok();

    std::env::set_var("QUIZ_SESSION_ENV", "test");
    std::env::set_var("QUIZ_SESSION_STRICT_CONFIG", "0");
    std::env::remove_var("QUIZ_API_BASE_URL");
    std::env::remove_var("QUIZ_API_TOKEN");
    std::env::remove_var("QUIZ_API_TOKEN_FILE");
    std::env::remove_var("QUIZ_REQUEST_TIMEOUT_SECONDS");
    std::env::remove_var("QUIZ_CONNECT_TIMEOUT_SECONDS");
    std::env::remove_var("QUIZ_FINALIZE_MAX_RETRIES");
    std::env::remove_var("QUIZ_FINALIZE_RETRY_BACKOFF_MS");
    std::env::remove_var("QUIZ_RESULT_ROUTE_PREFIX");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
}

/// Question `id` with `alternatives` choices; the first one is correct.
pub(crate) fn question(id: QuestionId, alternatives: usize) -> Question {
    Question {
        id,
        statement: format!("Question {id}"),
        image: None,
        points: 1.0,
        alternatives: (0..alternatives)
            .map(|index| Alternative {
                id: id * 100 + index as i64,
                text: format!("Alternative {index} of {id}"),
                is_correct: index == 0,
            })
            .collect(),
    }
}

pub(crate) fn questions(count: usize, alternatives: usize) -> Vec<Question> {
    (1..=count as i64).map(|id| question(id, alternatives)).collect()
}

pub(crate) fn public_quiz(id: QuizId, question_count: usize) -> Quiz {
    Quiz {
        id,
        title: format!("Quiz {id}"),
        description: String::new(),
        duration_minutes: None,
        max_points: Some(question_count as f64),
        max_attempts: 1,
        visibility: Visibility::Public,
        subject_id: Some(1),
        questions: questions(question_count, 4),
    }
}

pub(crate) fn roster_entry(
    quiz_id: QuizId,
    status: AttemptStatus,
    attempt_id: Option<AttemptId>,
) -> RosterEntry {
    RosterEntry {
        quiz_id,
        title: format!("Quiz {quiz_id}"),
        status,
        attempt_id,
        max_attempts: 1,
        attempts_count: u32::from(attempt_id.is_some()),
        can_start_new_attempt: None,
        has_attempt_in_progress: false,
        subject_id: Some(1),
    }
}

pub(crate) fn attempt_result(attempt_id: AttemptId) -> AttemptResult {
    AttemptResult {
        attempt_id,
        quiz_id: Some(7),
        total_score: 1.0,
        max_points: Some(2.0),
        started_at: None,
        finished_at: None,
        questions: vec![
            QuestionResult {
                question_id: 1,
                statement: "Question 1".to_string(),
                points: 1.0,
                marked_alternative_id: Some(100),
                correct_alternative_id: Some(100),
                is_correct: true,
                awarded_points: 1.0,
            },
            QuestionResult {
                question_id: 2,
                statement: "Question 2".to_string(),
                points: 1.0,
                marked_alternative_id: Some(201),
                correct_alternative_id: Some(200),
                is_correct: false,
                awarded_points: 0.0,
            },
        ],
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallCounts {
    pub(crate) roster: usize,
    pub(crate) quiz: usize,
    pub(crate) start: usize,
    pub(crate) submit: usize,
    pub(crate) complete: usize,
    pub(crate) result: usize,
}

#[derive(Debug, Clone, Copy)]
enum StartFailure {
    Exhausted,
    Transport,
}

#[derive(Default)]
struct Script {
    roster: Vec<RosterEntry>,
    quizzes: HashMap<QuizId, Quiz>,
    start: Option<(AttemptId, Vec<Question>)>,
    start_time: Option<OffsetDateTime>,
    start_delay: Duration,
    start_failure: Option<StartFailure>,
    submit_fails: bool,
    submit_delay: Duration,
    complete_failures: usize,
    result: Option<AttemptResult>,
    calls: CallCounts,
    order: Vec<&'static str>,
    submitted: Vec<SubmitResponses>,
}

/// In-memory backend with scripted answers and call accounting.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    script: Mutex<Script>,
}

impl ScriptedApi {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("script lock")
    }

    fn record(&self, name: &'static str) -> std::sync::MutexGuard<'_, Script> {
        let mut script = self.script();
        match name {
            "roster" => script.calls.roster += 1,
            "quiz" => script.calls.quiz += 1,
            "start" => script.calls.start += 1,
            "submit" => script.calls.submit += 1,
            "complete" => script.calls.complete += 1,
            _ => script.calls.result += 1,
        }
        script.order.push(name);
        script
    }

    pub(crate) fn put_quiz(&self, quiz: Quiz) {
        self.script().quizzes.insert(quiz.id, quiz);
    }

    pub(crate) fn set_roster(&self, roster: Vec<RosterEntry>) {
        self.script().roster = roster;
    }

    pub(crate) fn set_start_response(&self, attempt_id: AttemptId, questions: Vec<Question>) {
        self.script().start = Some((attempt_id, questions));
    }

    pub(crate) fn set_start_time(&self, started_at: OffsetDateTime) {
        self.script().start_time = Some(started_at);
    }

    pub(crate) fn delay_start(&self, delay: Duration) {
        self.script().start_delay = delay;
    }

    pub(crate) fn fail_start_exhausted(&self) {
        self.script().start_failure = Some(StartFailure::Exhausted);
    }

    pub(crate) fn fail_start_transport(&self) {
        self.script().start_failure = Some(StartFailure::Transport);
    }

    pub(crate) fn delay_submit(&self, delay: Duration) {
        self.script().submit_delay = delay;
    }

    pub(crate) fn fail_submit(&self) {
        self.script().submit_fails = true;
    }

    pub(crate) fn fail_complete_times(&self, times: usize) {
        self.script().complete_failures = times;
    }

    pub(crate) fn set_result(&self, result: AttemptResult) {
        self.script().result = Some(result);
    }

    pub(crate) fn calls(&self) -> CallCounts {
        self.script().calls
    }

    pub(crate) fn call_order(&self) -> Vec<&'static str> {
        self.script().order.clone()
    }

    pub(crate) fn submitted_payloads(&self) -> Vec<SubmitResponses> {
        self.script().submitted.clone()
    }
}

fn unavailable(detail: &str) -> QuizApiError {
    QuizApiError::Status { status: 503, detail: detail.to_string() }
}

#[async_trait]
impl QuizApi for ScriptedApi {
    async fn roster(&self) -> Result<Vec<RosterEntry>, QuizApiError> {
        Ok(self.record("roster").roster.clone())
    }

    async fn quiz(&self, quiz_id: QuizId) -> Result<Quiz, QuizApiError> {
        self.record("quiz")
            .quizzes
            .get(&quiz_id)
            .cloned()
            .ok_or_else(|| QuizApiError::NotFound { detail: format!("quiz {quiz_id}") })
    }

    async fn start_attempt(
        &self,
        _subject_id: SubjectId,
        _quiz_id: QuizId,
    ) -> Result<StartedAttempt, QuizApiError> {
        let (delay, outcome) = {
            let script = self.record("start");
            let outcome = match script.start_failure {
                Some(StartFailure::Exhausted) => Err(QuizApiError::AttemptsExhausted {
                    detail: ATTEMPTS_EXHAUSTED_CODE.to_string(),
                }),
                Some(StartFailure::Transport) => Err(unavailable("start unavailable")),
                None => script
                    .start
                    .clone()
                    .map(|(attempt_id, questions)| StartedAttempt {
                        attempt_id,
                        questions,
                        max_attempts: Some(1),
                        started_at: script.start_time,
                    })
                    .ok_or_else(|| unavailable("no scripted attempt")),
            };
            (script.start_delay, outcome)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        outcome
    }

    async fn submit_responses(
        &self,
        _attempt_id: AttemptId,
        payload: &SubmitResponses,
    ) -> Result<(), QuizApiError> {
        let delay = {
            let mut script = self.record("submit");
            if script.submit_fails {
                return Err(unavailable("submit unavailable"));
            }
            script.submitted.push(payload.clone());
            script.submit_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    async fn complete_attempt(&self, _attempt_id: AttemptId) -> Result<(), QuizApiError> {
        let mut script = self.record("complete");
        if script.complete_failures > 0 {
            script.complete_failures -= 1;
            return Err(unavailable("complete unavailable"));
        }
        Ok(())
    }

    async fn attempt_result(&self, attempt_id: AttemptId) -> Result<AttemptResult, QuizApiError> {
        self.record("result")
            .result
            .clone()
            .filter(|result| result.attempt_id == attempt_id)
            .ok_or_else(|| QuizApiError::NotFound { detail: format!("attempt {attempt_id}") })
    }
}

#[derive(Debug, Default)]
pub(crate) struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub(crate) fn routes(&self) -> Vec<String> {
        self.routes.lock().expect("routes lock").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        self.routes.lock().expect("routes lock").push(route.to_string());
    }
}
