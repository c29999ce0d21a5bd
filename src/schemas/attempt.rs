use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use super::quiz::Question;
use super::{AlternativeId, AttemptId, QuestionId, QuizId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    NotStarted,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: AttemptId,
    #[serde(alias = "quiz_id")]
    pub quiz_id: QuizId,
    pub status: AttemptStatus,
    #[serde(default, alias = "started_at", with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, alias = "finished_at", with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    #[serde(default, alias = "total_score")]
    pub total_score: Option<f64>,
}

/// Response of the start endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedAttempt {
    #[serde(alias = "attempt_id")]
    pub attempt_id: AttemptId,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default, alias = "max_attempts")]
    pub max_attempts: Option<u32>,
    #[serde(default, alias = "started_at", with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseItem {
    #[serde(alias = "question_id")]
    pub question_id: QuestionId,
    #[serde(alias = "marked_alternative_id")]
    pub marked_alternative_id: AlternativeId,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitResponses {
    #[validate(length(min = 1, message = "responses must not be empty"))]
    pub responses: Vec<ResponseItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptStatusUpdate {
    pub status: AttemptStatus,
}

impl AttemptStatusUpdate {
    pub fn completed() -> Self {
        Self { status: AttemptStatus::Completed }
    }
}

/// Result detail from `GET /student/attempt/{id}/responses`. Scoring is the
/// backend's; these values are rendered as received.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    #[serde(alias = "attempt_id")]
    pub attempt_id: AttemptId,
    #[serde(default, alias = "quiz_id")]
    pub quiz_id: Option<QuizId>,
    #[serde(default, alias = "total_score")]
    pub total_score: f64,
    #[serde(default, alias = "max_points")]
    pub max_points: Option<f64>,
    #[serde(default, alias = "started_at", with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    #[serde(default, alias = "finished_at", with = "time::serde::rfc3339::option")]
    pub finished_at: Option<OffsetDateTime>,
    #[serde(default, alias = "responses")]
    pub questions: Vec<QuestionResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    #[serde(alias = "question_id")]
    pub question_id: QuestionId,
    #[serde(default)]
    pub statement: String,
    #[serde(default)]
    pub points: f64,
    #[serde(default, alias = "marked_alternative_id")]
    pub marked_alternative_id: Option<AlternativeId>,
    #[serde(default, alias = "correct_alternative_id")]
    pub correct_alternative_id: Option<AlternativeId>,
    #[serde(default, alias = "is_correct")]
    pub is_correct: bool,
    #[serde(default, alias = "awarded_points")]
    pub awarded_points: f64,
}

impl AttemptResult {
    pub fn correct_count(&self) -> usize {
        self.questions.iter().filter(|question| question.is_correct).count()
    }
}
