use thiserror::Error;

use super::answers::AnswerRecord;
use super::state::{ActiveRun, FinishedRun, PhaseKind, PracticeState, Step};
use crate::model::{AttemptError, AttemptScore, ChoiceId, QuestionSet, TopicKey};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("cannot {operation} while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: PhaseKind,
    },

    #[error("no practice questions available")]
    EmptyQuestionSet,

    #[error("choice {0} is not an option for the current question")]
    UnknownChoice(ChoiceId),

    #[error("too many questions for a single session: {len}")]
    TooManyQuestions { len: usize },

    #[error(transparent)]
    Score(#[from] AttemptError),
}

//
// ─── INTENTS AND EFFECTS ───────────────────────────────────────────────────────
//

/// Everything a learner (or the rendering layer on their behalf) can ask for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PracticeIntent {
    Start(QuestionSet),
    Select(ChoiceId),
    Check,
    Advance,
    Restart,
    Exit,
}

impl PracticeIntent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PracticeIntent::Start(_) => "start",
            PracticeIntent::Select(_) => "select a choice",
            PracticeIntent::Check => "check the answer",
            PracticeIntent::Advance => "advance",
            PracticeIntent::Restart => "restart",
            PracticeIntent::Exit => "exit",
        }
    }
}

/// Side effect the caller must perform after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PracticeEffect {
    /// The run just reached `Complete`. Emitted once per run.
    Completed { topic: TopicKey, score: AttemptScore },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: PracticeState,
    pub effect: Option<PracticeEffect>,
}

impl Transition {
    fn to(next: PracticeState) -> Self {
        Self { next, effect: None }
    }
}

//
// ─── REDUCER ───────────────────────────────────────────────────────────────────
//

/// Apply an intent to a state.
///
/// Pure: the input state is never modified. A rejected intent leaves the caller
/// holding exactly the state it had.
///
/// # Errors
///
/// Returns `PracticeError::InvalidState` when the intent is not allowed in the
/// current phase, `EmptyQuestionSet` when starting without questions, and
/// `UnknownChoice` when selecting a choice the current question does not offer.
pub fn transition(
    state: &PracticeState,
    intent: PracticeIntent,
) -> Result<Transition, PracticeError> {
    let invalid = |intent: &PracticeIntent| PracticeError::InvalidState {
        operation: intent.name(),
        phase: state.phase(),
    };

    match (state, intent) {
        (_, PracticeIntent::Start(questions)) => begin(questions),

        (_, PracticeIntent::Exit) => Ok(Transition::to(PracticeState::Idle)),

        (PracticeState::Idle, intent @ PracticeIntent::Restart) => Err(invalid(&intent)),
        (PracticeState::InProgress(ActiveRun { questions, .. }), PracticeIntent::Restart)
        | (PracticeState::Complete(FinishedRun { questions, .. }), PracticeIntent::Restart) => {
            begin(questions.clone())
        }

        (PracticeState::InProgress(run), PracticeIntent::Select(choice)) => match &run.step {
            // Checked answers are final; selecting again changes nothing.
            Step::Answered => Ok(Transition::to(state.clone())),
            Step::Unanswered { .. } => {
                let offered = run
                    .current_question()
                    .is_some_and(|q| q.has_choice(&choice));
                if !offered {
                    return Err(PracticeError::UnknownChoice(choice));
                }
                let mut next = run.clone();
                next.step = Step::Unanswered {
                    selected: Some(choice),
                };
                Ok(Transition::to(PracticeState::InProgress(next)))
            }
        },

        (PracticeState::InProgress(run), intent @ PracticeIntent::Check) => {
            let Step::Unanswered {
                selected: Some(choice),
            } = &run.step
            else {
                return Err(invalid(&intent));
            };
            let question = run.current_question().ok_or_else(|| invalid(&intent))?;
            let record = AnswerRecord::new(
                question.id().clone(),
                choice.clone(),
                question.is_correct(choice),
            );

            let mut next = run.clone();
            next.answers.insert(record).map_err(|_| invalid(&intent))?;
            next.step = Step::Answered;
            Ok(Transition::to(PracticeState::InProgress(next)))
        }

        (PracticeState::InProgress(run), intent @ PracticeIntent::Advance) => {
            if run.step != Step::Answered {
                return Err(invalid(&intent));
            }
            if !run.is_last_question() {
                let mut next = run.clone();
                next.current_index += 1;
                next.step = Step::Unanswered { selected: None };
                return Ok(Transition::to(PracticeState::InProgress(next)));
            }

            let finished = FinishedRun {
                questions: run.questions.clone(),
                answers: run.answers.clone(),
            };
            let score = score_of(&finished)?;
            Ok(Transition {
                effect: Some(PracticeEffect::Completed {
                    topic: finished.questions.topic().clone(),
                    score,
                }),
                next: PracticeState::Complete(finished),
            })
        }

        // Already finished: nothing to do, and the completion effect is not re-fired.
        (PracticeState::Complete(_), PracticeIntent::Advance) => {
            Ok(Transition::to(state.clone()))
        }

        (_, intent) => Err(invalid(&intent)),
    }
}

fn begin(questions: QuestionSet) -> Result<Transition, PracticeError> {
    if questions.is_empty() {
        return Err(PracticeError::EmptyQuestionSet);
    }
    if u32::try_from(questions.len()).is_err() {
        return Err(PracticeError::TooManyQuestions {
            len: questions.len(),
        });
    }
    Ok(Transition::to(PracticeState::InProgress(ActiveRun::begin(
        questions,
    ))))
}

fn score_of(run: &FinishedRun) -> Result<AttemptScore, PracticeError> {
    let len = run.questions.len();
    let out_of = u32::try_from(len).map_err(|_| PracticeError::TooManyQuestions { len })?;
    let correct = u32::try_from(run.answers.correct_count())
        .map_err(|_| PracticeError::TooManyQuestions { len })?;
    Ok(AttemptScore::new(correct, out_of)?)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
