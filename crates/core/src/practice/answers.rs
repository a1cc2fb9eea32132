use serde::Serialize;

use crate::model::{ChoiceId, QuestionId};

/// Outcome of checking one question. Written once per question per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerRecord {
    question_id: QuestionId,
    selected_choice_id: ChoiceId,
    is_correct: bool,
}

impl AnswerRecord {
    #[must_use]
    pub fn new(question_id: QuestionId, selected_choice_id: ChoiceId, is_correct: bool) -> Self {
        Self {
            question_id,
            selected_choice_id,
            is_correct,
        }
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn selected_choice_id(&self) -> &ChoiceId {
        &self.selected_choice_id
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }
}

/// Answers for a run, in answering order, at most one per question.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct AnswerSheet(Vec<AnswerRecord>);

impl AnswerSheet {
    #[must_use]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a record. Returns the rejected record if its question was already answered.
    pub(crate) fn insert(&mut self, record: AnswerRecord) -> Result<(), AnswerRecord> {
        if self.get(record.question_id()).is_some() {
            return Err(record);
        }
        self.0.push(record);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, question_id: &QuestionId) -> Option<&AnswerRecord> {
        self.0.iter().find(|r| r.question_id() == question_id)
    }

    #[must_use]
    pub fn last(&self) -> Option<&AnswerRecord> {
        self.0.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnswerRecord> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of correct answers, always derived from the records themselves.
    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.0.iter().filter(|r| r.is_correct()).count()
    }
}
