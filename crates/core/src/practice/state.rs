use serde::{Deserialize, Serialize};
use std::fmt;

use super::answers::{AnswerRecord, AnswerSheet};
use super::progress::PracticeProgress;
use crate::model::{ChoiceId, Question, QuestionSet, TopicKey};

/// Flat name of the current phase, for errors, logs and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Idle,
    Unanswered,
    Answered,
    Complete,
}

impl PhaseKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKind::Idle => "idle",
            PhaseKind::Unanswered => "unanswered",
            PhaseKind::Answered => "answered",
            PhaseKind::Complete => "complete",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the current question stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Not yet checked; the learner may still change the selection.
    Unanswered { selected: Option<ChoiceId> },
    /// Checked; the answer record for the current question exists and feedback is shown.
    Answered,
}

/// A run that has started but not finished.
///
/// Only the state machine can build one, so `answers.len()` is always
/// `current_index` plus one when the current question has been answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRun {
    pub(super) questions: QuestionSet,
    pub(super) current_index: usize,
    pub(super) step: Step,
    pub(super) answers: AnswerSheet,
}

impl ActiveRun {
    pub(super) fn begin(questions: QuestionSet) -> Self {
        Self {
            questions,
            current_index: 0,
            step: Step::Unanswered { selected: None },
            answers: AnswerSheet::new(),
        }
    }

    #[must_use]
    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn step(&self) -> &Step {
        &self.step
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    /// The question at `current_index`. A run is never started on an empty set.
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 >= self.questions.len()
    }
}

/// A run whose last question has been advanced past.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedRun {
    pub(super) questions: QuestionSet,
    pub(super) answers: AnswerSheet,
}

impl FinishedRun {
    #[must_use]
    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }
}

/// State of the practice engine for one learner and one section.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PracticeState {
    #[default]
    Idle,
    InProgress(ActiveRun),
    Complete(FinishedRun),
}

impl PracticeState {
    #[must_use]
    pub fn phase(&self) -> PhaseKind {
        match self {
            PracticeState::Idle => PhaseKind::Idle,
            PracticeState::InProgress(run) => match run.step {
                Step::Unanswered { .. } => PhaseKind::Unanswered,
                Step::Answered => PhaseKind::Answered,
            },
            PracticeState::Complete(_) => PhaseKind::Complete,
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, PracticeState::Complete(_))
    }

    #[must_use]
    pub fn questions(&self) -> Option<&QuestionSet> {
        match self {
            PracticeState::Idle => None,
            PracticeState::InProgress(run) => Some(&run.questions),
            PracticeState::Complete(run) => Some(&run.questions),
        }
    }

    #[must_use]
    pub fn topic(&self) -> Option<&TopicKey> {
        self.questions().map(QuestionSet::topic)
    }

    #[must_use]
    pub fn answers(&self) -> Option<&AnswerSheet> {
        match self {
            PracticeState::Idle => None,
            PracticeState::InProgress(run) => Some(&run.answers),
            PracticeState::Complete(run) => Some(&run.answers),
        }
    }

    /// Index of the question on screen. `None` when idle or complete.
    #[must_use]
    pub fn current_index(&self) -> Option<usize> {
        match self {
            PracticeState::InProgress(run) => Some(run.current_index),
            _ => None,
        }
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        match self {
            PracticeState::InProgress(run) => run.current_question(),
            _ => None,
        }
    }

    /// Selected choice for the current question, before or after checking.
    #[must_use]
    pub fn selected_choice(&self) -> Option<&ChoiceId> {
        match self {
            PracticeState::InProgress(run) => match &run.step {
                Step::Unanswered { selected } => selected.as_ref(),
                Step::Answered => self.current_answer().map(AnswerRecord::selected_choice_id),
            },
            _ => None,
        }
    }

    /// Answer record for the current question once feedback is revealed.
    #[must_use]
    pub fn current_answer(&self) -> Option<&AnswerRecord> {
        match self {
            PracticeState::InProgress(run) if run.step == Step::Answered => run
                .current_question()
                .and_then(|q| run.answers.get(q.id())),
            _ => None,
        }
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.answers().map_or(0, AnswerSheet::correct_count)
    }

    #[must_use]
    pub fn progress(&self) -> PracticeProgress {
        let total = self.questions().map_or(0, QuestionSet::len);
        let answered = self.answers().map_or(0, AnswerSheet::len);
        PracticeProgress {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            correct: self.correct_count(),
            is_complete: self.is_complete(),
        }
    }
}
