use serde::{Deserialize, Serialize};

use super::{AlternativeId, QuestionId, QuizId, SubjectId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Draft,
    Public,
    Archived,
}

/// Viewer role, passed explicitly by the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: QuizId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "duration", alias = "duration_minutes")]
    pub duration_minutes: Option<u32>,
    #[serde(default, alias = "max_points")]
    pub max_points: Option<f64>,
    #[serde(default = "default_max_attempts", alias = "max_attempts")]
    pub max_attempts: u32,
    pub visibility: Visibility,
    #[serde(default, alias = "subject_id")]
    pub subject_id: Option<SubjectId>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    #[serde(alias = "text")]
    pub statement: String,
    #[serde(default, alias = "image_url", alias = "imageUrl")]
    pub image: Option<String>,
    #[serde(default)]
    pub points: f64,
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
}

/// Read-only exam content. `is_correct` is only surfaced through
/// [`crate::schemas::view::AlternativeView`] when the resolved mode allows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub id: AlternativeId,
    #[serde(alias = "response")]
    pub text: String,
    #[serde(default, alias = "is_correct", alias = "correct")]
    pub is_correct: bool,
}

impl Question {
    pub fn alternative(&self, alternative_id: AlternativeId) -> Option<&Alternative> {
        self.alternatives.iter().find(|alternative| alternative.id == alternative_id)
    }
}

fn default_max_attempts() -> u32 {
    1
}
