use std::collections::HashMap;

use crate::schemas::attempt::ResponseItem;
use crate::schemas::quiz::Question;
use crate::schemas::{AlternativeId, QuestionId};
use crate::services::view_mode::ModeResolution;

/// Draft answers for the presented question set. Memory only; nothing is
/// autosaved.
#[derive(Debug, Clone, Default)]
pub struct ResponseCollector {
    selected: HashMap<QuestionId, AlternativeId>,
}

impl ResponseCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a choice. Returns `false` and leaves state untouched unless the
    /// resolution allows responses and the pair belongs to `questions`.
    pub fn set_response(
        &mut self,
        questions: &[Question],
        question_id: QuestionId,
        alternative_id: AlternativeId,
        resolution: &ModeResolution,
    ) -> bool {
        if !resolution.allows_responses() {
            return false;
        }

        let known = questions
            .iter()
            .find(|question| question.id == question_id)
            .and_then(|question| question.alternative(alternative_id))
            .is_some();
        if !known {
            tracing::debug!(question_id, alternative_id, "Ignoring response for unknown pair");
            return false;
        }

        self.selected.insert(question_id, alternative_id);
        true
    }

    pub fn selected(&self, question_id: QuestionId) -> Option<AlternativeId> {
        self.selected.get(&question_id).copied()
    }

    pub fn answered(&self) -> usize {
        self.selected.len()
    }

    pub fn is_complete(&self, question_count: usize) -> bool {
        self.selected.len() == question_count
    }

    /// Responses in presentation order.
    pub fn to_items(&self, questions: &[Question]) -> Vec<ResponseItem> {
        questions
            .iter()
            .filter_map(|question| {
                self.selected(question.id).map(|marked_alternative_id| ResponseItem {
                    question_id: question.id,
                    marked_alternative_id,
                })
            })
            .collect()
    }
}
