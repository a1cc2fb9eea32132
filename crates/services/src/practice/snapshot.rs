use serde::Serialize;

use learn_core::model::{AttemptScore, Choice, ChoiceId, MasteryRecord, QuestionId, TopicKey};
use learn_core::practice::{AnswerRecord, PhaseKind, PracticeProgress, PracticeState};

/// Outcome of persisting the current run to the mastery ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LedgerWrite {
    /// The run has not completed, so there is nothing to record.
    NotRequired,
    /// The write started but has not reported back. Left behind if the caller
    /// drops `advance` mid-write; `retry_record` picks it up.
    Pending { score: AttemptScore },
    Recorded { record: MasteryRecord },
    /// The write failed. The run still counts as complete for the learner.
    Failed { score: AttemptScore, reason: String },
}

impl LedgerWrite {
    /// Score still owed to the ledger, if any.
    #[must_use]
    pub fn unrecorded_score(&self) -> Option<AttemptScore> {
        match self {
            LedgerWrite::Pending { score } | LedgerWrite::Failed { score, .. } => Some(*score),
            LedgerWrite::NotRequired | LedgerWrite::Recorded { .. } => None,
        }
    }
}

/// The question on screen, without its answer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub prompt: String,
    pub choices: Vec<Choice>,
}

/// Revealed after checking an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feedback {
    pub answer: AnswerRecord,
    pub correct_choice_id: ChoiceId,
    pub explanation: String,
}

/// Presentation-agnostic, owned copy of the practice state.
///
/// This is intentionally **not** a UI view-model: no pre-formatted strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PracticeSnapshot {
    pub phase: PhaseKind,
    pub topic: Option<TopicKey>,
    pub current_index: Option<usize>,
    pub question: Option<QuestionView>,
    pub selected_choice: Option<ChoiceId>,
    pub feedback: Option<Feedback>,
    pub progress: PracticeProgress,
    /// Final score, present once the run is complete.
    pub score: Option<AttemptScore>,
    pub ledger: LedgerWrite,
}

impl PracticeSnapshot {
    #[must_use]
    pub fn capture(state: &PracticeState, ledger: &LedgerWrite) -> Self {
        let question = state.current_question();
        let feedback = state.current_answer().and_then(|answer| {
            question.map(|q| Feedback {
                answer: answer.clone(),
                correct_choice_id: q.correct_choice_id().clone(),
                explanation: q.explanation().to_string(),
            })
        });
        let progress = state.progress();
        let score = if progress.is_complete {
            u32::try_from(progress.correct)
                .ok()
                .zip(u32::try_from(progress.total).ok())
                .and_then(|(correct, total)| AttemptScore::new(correct, total).ok())
        } else {
            None
        };

        Self {
            phase: state.phase(),
            topic: state.topic().cloned(),
            current_index: state.current_index(),
            question: question.map(|q| QuestionView {
                id: q.id().clone(),
                prompt: q.prompt().to_string(),
                choices: q.choices().to_vec(),
            }),
            selected_choice: state.selected_choice().cloned(),
            feedback,
            progress,
            score,
            ledger: ledger.clone(),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == PhaseKind::Complete
    }
}
