//! Practice session state machine.
//!
//! A run through one section's questions is a `PracticeState` value. User intents
//! are applied with the pure `transition` function, which either returns the next
//! state (plus an optional effect for the caller to perform) or rejects the intent
//! without touching the current state.

mod answers;
mod progress;
mod state;
mod transition;

pub use answers::{AnswerRecord, AnswerSheet};
pub use progress::PracticeProgress;
pub use state::{ActiveRun, FinishedRun, PhaseKind, PracticeState, Step};
pub use transition::{PracticeEffect, PracticeError, PracticeIntent, Transition, transition};
