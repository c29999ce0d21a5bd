use serde::{Deserialize, Serialize};

use super::attempt::AttemptStatus;
use super::{AttemptId, QuizId, SubjectId};

/// One quiz in the student's list, as returned by `GET /student/quizzes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    #[serde(alias = "quiz_id")]
    pub quiz_id: QuizId,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_status")]
    pub status: AttemptStatus,
    #[serde(default, alias = "attempt_id")]
    pub attempt_id: Option<AttemptId>,
    #[serde(default = "default_max_attempts", alias = "max_attempts")]
    pub max_attempts: u32,
    #[serde(default, alias = "attempts_count")]
    pub attempts_count: u32,
    #[serde(default, alias = "can_start_new_attempt")]
    pub can_start_new_attempt: Option<bool>,
    #[serde(default, alias = "has_attempt_in_progress")]
    pub has_attempt_in_progress: bool,
    #[serde(default, alias = "subject_id")]
    pub subject_id: Option<SubjectId>,
}

impl RosterEntry {
    /// The attempt this entry points at, if it is still open.
    pub fn in_progress_attempt(&self) -> Option<AttemptId> {
        let open = self.status == AttemptStatus::InProgress || self.has_attempt_in_progress;
        if open {
            self.attempt_id
        } else {
            None
        }
    }

    pub fn allows_new_attempt(&self) -> bool {
        self.can_start_new_attempt.unwrap_or(self.attempts_count < self.max_attempts)
    }
}

/// The roster endpoint has been seen both as a bare list and wrapped in an object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RosterPayload {
    List(Vec<RosterEntry>),
    Wrapped { quizzes: Vec<RosterEntry> },
}

impl RosterPayload {
    pub(crate) fn into_entries(self) -> Vec<RosterEntry> {
        match self {
            RosterPayload::List(entries) => entries,
            RosterPayload::Wrapped { quizzes } => quizzes,
        }
    }
}

fn default_status() -> AttemptStatus {
    AttemptStatus::NotStarted
}

fn default_max_attempts() -> u32 {
    1
}
