use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

use crate::model::ids::{ChoiceId, QuestionId};
use crate::model::topic::TopicKey;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question id cannot be empty")]
    EmptyId,
    #[error("question prompt cannot be empty")]
    EmptyPrompt,
    #[error("question has no choices")]
    NoChoices,
    #[error("choice id cannot be empty")]
    EmptyChoiceId,
    #[error("duplicate choice id: {0}")]
    DuplicateChoice(String),
    #[error("correct choice {0} is not one of the choices")]
    CorrectChoiceMissing(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionSetError {
    #[error("duplicate question id in section: {0}")]
    DuplicateQuestion(String),
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub id: ChoiceId,
    pub text: String,
}

impl Choice {
    #[must_use]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: ChoiceId::new(id),
            text: text.into(),
        }
    }
}

/// A single multiple-choice question. Immutable once validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    choices: Vec<Choice>,
    correct_choice_id: ChoiceId,
    explanation: String,
}

impl Question {
    /// Validate and build a question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` if the id or prompt is blank, there are no choices,
    /// choice ids repeat, or the correct choice is not among the choices.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        choices: Vec<Choice>,
        correct_choice_id: ChoiceId,
        explanation: impl Into<String>,
    ) -> Result<Self, QuestionError> {
        if id.as_str().trim().is_empty() {
            return Err(QuestionError::EmptyId);
        }
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if choices.is_empty() {
            return Err(QuestionError::NoChoices);
        }

        let mut seen = HashSet::with_capacity(choices.len());
        for choice in &choices {
            if choice.id.as_str().trim().is_empty() {
                return Err(QuestionError::EmptyChoiceId);
            }
            if !seen.insert(&choice.id) {
                return Err(QuestionError::DuplicateChoice(choice.id.to_string()));
            }
        }
        if !seen.contains(&correct_choice_id) {
            return Err(QuestionError::CorrectChoiceMissing(
                correct_choice_id.to_string(),
            ));
        }

        Ok(Self {
            id,
            prompt,
            choices,
            correct_choice_id,
            explanation: explanation.into(),
        })
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    #[must_use]
    pub fn correct_choice_id(&self) -> &ChoiceId {
        &self.correct_choice_id
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn has_choice(&self, choice_id: &ChoiceId) -> bool {
        self.choices.iter().any(|c| &c.id == choice_id)
    }

    #[must_use]
    pub fn is_correct(&self, choice_id: &ChoiceId) -> bool {
        &self.correct_choice_id == choice_id
    }
}

//
// ─── QUESTION SET ──────────────────────────────────────────────────────────────
//

/// Ordered snapshot of the questions for one section.
///
/// Clones share the same backing slice, so a running session keeps the set it
/// started with even if the bank is edited afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSet {
    topic: TopicKey,
    questions: Arc<[Question]>,
}

impl QuestionSet {
    /// # Errors
    ///
    /// Returns `QuestionSetError::DuplicateQuestion` if two questions share an id.
    pub fn new(topic: TopicKey, questions: Vec<Question>) -> Result<Self, QuestionSetError> {
        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id()) {
                return Err(QuestionSetError::DuplicateQuestion(
                    question.id().to_string(),
                ));
            }
        }
        Ok(Self {
            topic,
            questions: questions.into(),
        })
    }

    #[must_use]
    pub fn empty(topic: TopicKey) -> Self {
        Self {
            topic,
            questions: Arc::from(Vec::new()),
        }
    }

    #[must_use]
    pub fn topic(&self) -> &TopicKey {
        &self.topic
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}
