use serde::Serialize;

use super::quiz::{Alternative, Question};
use super::{AlternativeId, QuestionId};
use crate::services::view_mode::ModeResolution;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeView {
    pub id: AlternativeId,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: QuestionId,
    pub statement: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub points: f64,
    pub alternatives: Vec<AlternativeView>,
}

impl QuestionView {
    /// Builds the presentation view of a question. The correctness flag is
    /// copied only when `resolution.reveal_correctness` is set.
    pub fn project(
        question: &Question,
        resolution: &ModeResolution,
        selected: Option<AlternativeId>,
    ) -> Self {
        Self {
            id: question.id,
            statement: question.statement.clone(),
            image: question.image.clone(),
            points: question.points,
            alternatives: question
                .alternatives
                .iter()
                .map(|alternative| AlternativeView::project(alternative, resolution, selected))
                .collect(),
        }
    }
}

impl AlternativeView {
    fn project(
        alternative: &Alternative,
        resolution: &ModeResolution,
        selected: Option<AlternativeId>,
    ) -> Self {
        Self {
            id: alternative.id,
            text: alternative.text.clone(),
            is_correct: resolution.reveal_correctness.then_some(alternative.is_correct),
            selected: selected == Some(alternative.id),
        }
    }
}
